use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::ids::FileId;
use crate::media_kind::MediaKind;

/// The stable `(volume id, file id)` pair a [`File`] is keyed on: two
/// entries with the same key are the same on-disk file regardless of how
/// many hardlinks currently point at it.
pub type IdentityKey = (u64, u128);

/// Filesystem identity triple used to recognize the same file across
/// renames and moves. Equality and hashing are scoped to the
/// `(volume_id, file_id)` pair per the uniqueness invariant; `link_count`
/// is carried as observed data, not part of the key, so a hardlink count
/// changing alone never breaks identity lookups.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdentityTriple {
    pub volume_id: u64,
    pub file_id: u128,
    pub link_count: u64,
}

impl IdentityTriple {
    pub fn key(&self) -> IdentityKey {
        (self.volume_id, self.file_id)
    }
}

impl PartialEq for IdentityTriple {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for IdentityTriple {}

impl std::hash::Hash for IdentityTriple {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// An opaque, access-layer-issued handle standing in for a resolvable path.
///
/// The scanner receives roots that are already access-validated; this token
/// is whatever the collaborator's access layer produced for that root, and
/// is carried through unopened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessToken(pub String);

/// One on-disk asset tracked by the engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct File {
    pub id: FileId,
    pub path: PathBuf,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub access_token: Option<AccessToken>,
    pub media_kind: MediaKind,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub volume_id: i64,
    pub file_ref: i64,
    pub link_count: i64,
    pub checksum: Option<Vec<u8>>,
    pub trashed: bool,
    pub last_scanned_at: DateTime<Utc>,
    pub needs_metadata_refresh: bool,
    pub needs_signature_refresh: bool,
}

impl File {
    /// Builds a fresh `File` row for a just-discovered path. Both refresh
    /// flags start set: nothing has been extracted for it yet.
    pub fn discovered(
        path: PathBuf,
        media_kind: MediaKind,
        size: u64,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        identity: IdentityTriple,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: FileId::new(),
            path,
            access_token: None,
            media_kind,
            size,
            created_at,
            modified_at,
            volume_id: identity.volume_id as i64,
            file_ref: identity.file_id as i64,
            link_count: identity.link_count as i64,
            checksum: None,
            trashed: false,
            last_scanned_at: now,
            needs_metadata_refresh: true,
            needs_signature_refresh: true,
        }
    }

    pub fn identity(&self) -> IdentityTriple {
        IdentityTriple {
            volume_id: self.volume_id as u64,
            file_id: self.file_ref as u128,
            link_count: self.link_count as u64,
        }
    }

    /// Applies a newly observed (size, mtime) pair, returning whether the
    /// file actually changed. On a size or mtime change both refresh flags
    /// are set, invalidating downstream signatures.
    pub fn observe_change(&mut self, size: u64, modified_at: DateTime<Utc>) -> bool {
        let changed = size != self.size || modified_at != self.modified_at;
        if changed {
            self.size = size;
            self.modified_at = modified_at;
            self.checksum = None;
            self.needs_metadata_refresh = true;
            self.needs_signature_refresh = true;
        }
        self.last_scanned_at = Utc::now();
        changed
    }
}
