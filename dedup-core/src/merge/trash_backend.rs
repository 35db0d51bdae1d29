//! Recycle-bin integration. Abstracted
//! behind a small trait so the executor's tests never need a desktop
//! trash implementation available in CI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DedupError, Result};

/// An opaque handle a [`TrashBackend`] hands back after trashing a file,
/// carrying whatever that backend needs to restore it later. Persisted
/// verbatim in the undo log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleToken(pub String);

pub trait TrashBackend: Send + Sync {
    /// Moves `path` to the recycle bin, returning a token that can later
    /// restore it to `path`.
    fn trash(&self, path: &Path) -> Result<RecycleToken>;

    /// Restores a previously trashed file to `original_path`. Fails if
    /// the backend no longer has a record of the token (e.g. the user
    /// emptied the trash out-of-band).
    fn restore(&self, token: &RecycleToken, original_path: &Path) -> Result<()>;

    /// Permanently deletes a trashed entry, used when a staged-but-never
    /// -committed transaction is reaped.
    fn purge(&self, token: &RecycleToken) -> Result<()>;
}

/// Minimal record of a platform trash entry, enough to re-find it on
/// restore via `trash::os_limited::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrashRecord {
    id: String,
    original_parent: PathBuf,
    name: String,
}

/// Production backend using the OS-supplied tokenized trash API via the
/// `trash` crate.
#[derive(Debug, Default)]
pub struct OsTrashBackend;

impl OsTrashBackend {
    pub fn new() -> Self {
        Self
    }
}

impl TrashBackend for OsTrashBackend {
    fn trash(&self, path: &Path) -> Result<RecycleToken> {
        let name = path
            .file_name()
            .ok_or_else(|| DedupError::InvalidFile(path.display().to_string()))?
            .to_string_lossy()
            .to_string();
        let parent = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();

        trash::delete(path).map_err(|e| DedupError::Trash(e.to_string()))?;

        let items = trash::os_limited::list().map_err(|e| DedupError::Trash(e.to_string()))?;
        let matched = items
            .into_iter()
            .filter(|item| item.name == name && item.original_parent == parent)
            .max_by_key(|item| item.time_deleted)
            .ok_or_else(|| DedupError::Trash(format!("could not locate trashed item for {}", path.display())))?;

        let record = TrashRecord {
            id: matched.id.to_string(),
            original_parent: parent,
            name: matched.name.clone(),
        };
        let encoded = serde_json::to_string(&record)?;
        Ok(RecycleToken(encoded))
    }

    fn restore(&self, token: &RecycleToken, _original_path: &Path) -> Result<()> {
        let record: TrashRecord = serde_json::from_str(&token.0)?;
        let items = trash::os_limited::list().map_err(|e| DedupError::Trash(e.to_string()))?;
        let matched = items
            .into_iter()
            .find(|item| item.id.to_string() == record.id)
            .ok_or_else(|| DedupError::Trash(format!("trash entry {} no longer present", record.id)))?;
        trash::os_limited::restore_all(vec![matched])
            .map_err(|e| DedupError::Trash(format!("restore failed: {e}")))
    }

    fn purge(&self, token: &RecycleToken) -> Result<()> {
        let record: TrashRecord = serde_json::from_str(&token.0)?;
        let items = trash::os_limited::list().map_err(|e| DedupError::Trash(e.to_string()))?;
        let matched = items.into_iter().find(|item| item.id.to_string() == record.id);
        if let Some(item) = matched {
            trash::os_limited::purge_all(vec![item]).map_err(|e| DedupError::Trash(format!("purge failed: {e}")))?;
        }
        Ok(())
    }
}

/// In-memory fake used by executor/undo tests, so CI never needs a real
/// desktop trash implementation.
#[derive(Debug, Default)]
pub struct InMemoryTrash {
    entries: std::sync::Mutex<std::collections::HashMap<String, PathBuf>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl InMemoryTrash {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn contains(&self, token: &RecycleToken) -> bool {
        self.entries.lock().unwrap().contains_key(&token.0)
    }
}

impl TrashBackend for InMemoryTrash {
    fn trash(&self, path: &Path) -> Result<RecycleToken> {
        std::fs::remove_file(path)?;
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let token = RecycleToken(format!("mem-{id}"));
        self.entries.lock().unwrap().insert(token.0.clone(), path.to_path_buf());
        Ok(token)
    }

    fn restore(&self, token: &RecycleToken, original_path: &Path) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(&token.0).is_none() {
            return Err(DedupError::NotFound(format!("trash token {} not present", token.0)));
        }
        drop(entries);
        std::fs::File::create(original_path)?;
        Ok(())
    }

    fn purge(&self, token: &RecycleToken) -> Result<()> {
        self.entries.lock().unwrap().remove(&token.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn in_memory_trash_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"hello").unwrap();

        let trash = InMemoryTrash::new();
        let token = trash.trash(&path).unwrap();
        assert!(!path.exists());
        assert!(trash.contains(&token));

        trash.restore(&token, &path).unwrap();
        assert!(path.exists());
        assert!(!trash.contains(&token));
    }

    #[test]
    fn restoring_unknown_token_fails() {
        let trash = InMemoryTrash::new();
        let result = trash.restore(&RecycleToken("missing".to_string()), Path::new("/tmp/x"));
        assert!(result.is_err());
    }
}
