use std::path::PathBuf;

use async_trait::async_trait;

use dedup_model::{File, FileId};

use crate::error::Result;

/// Caller-supplied knobs for a single scan invocation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanOptions {
    pub roots: Vec<PathBuf>,
    /// When true, only files whose mtime/size changed since the last scan
    /// (or which are new) are walked; unreachable previously-known files
    /// are marked missing rather than deleted outright.
    pub incremental: bool,
    /// Glob-style patterns layered on top of the built-in default excludes.
    pub extra_excludes: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            incremental: true,
            extra_excludes: Vec::new(),
            follow_symlinks: false,
        }
    }
}

/// A unit of progress emitted while a scan runs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanEvent {
    Discovered(File),
    Updated(File),
    Unchanged(FileId),
    MissingSinceLastScan(FileId),
    DirectoryError { path: PathBuf, message: String },
    /// An entry that is listed but not materialized locally (e.g. an
    /// undownloaded cloud-sync placeholder). Never queued for signature
    /// work.
    CloudPlaceholder { path: PathBuf },
    Completed(ScanSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanSummary {
    pub discovered: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub missing: u64,
    pub errors: u64,
    pub cloud_placeholders: u64,
    /// Entries skipped because their filesystem identity was already
    /// observed this scan: a hardlink to an already-walked file, or a
    /// symlink whose resolved identity would reintroduce a cycle.
    pub duplicate_identities: u64,
}

/// The boundary between the engine's orchestration layer and whatever
/// walks the filesystem. A caller drives a scan to completion
/// by consuming the event stream returned from `scan`.
#[async_trait]
pub trait ScanDriver: Send + Sync {
    type EventStream: futures::Stream<Item = ScanEvent> + Send + Unpin;

    async fn scan(&self, options: ScanOptions) -> Result<Self::EventStream>;
}
