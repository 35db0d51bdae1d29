use crate::ids::FileId;
use crate::media_kind::MediaKind;

/// Stats attached to a [`CandidateBucket`] describing how much comparison
/// work it represents and whether any of it was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketStats {
    pub size: usize,
    pub skipped_by_policy: usize,
    pub estimated_comparisons: u64,
}

/// A transient set of files sharing a coarse signature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidateBucket {
    pub media_kind: MediaKind,
    pub key: String,
    pub heuristic_tag: String,
    /// Sorted ascending by id; bucket construction is deterministic.
    pub file_ids: Vec<FileId>,
    pub stats: BucketStats,
    pub incomplete: bool,
}

impl CandidateBucket {
    pub fn new(media_kind: MediaKind, key: String, heuristic_tag: impl Into<String>) -> Self {
        Self {
            media_kind,
            key,
            heuristic_tag: heuristic_tag.into(),
            file_ids: Vec::new(),
            stats: BucketStats::default(),
            incomplete: false,
        }
    }

    pub fn push(&mut self, file_id: FileId) {
        self.file_ids.push(file_id);
        self.stats.size = self.file_ids.len();
    }

    /// `n * (n - 1) / 2`, the naive pairwise comparison count this bucket
    /// would require before any bounding is applied.
    pub fn estimate_comparisons(&self) -> u64 {
        let n = self.file_ids.len() as u64;
        n.saturating_mul(n.saturating_sub(1)) / 2
    }
}
