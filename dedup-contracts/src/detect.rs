use async_trait::async_trait;

use dedup_model::{CandidateBucket, DuplicateGroup, FileId, GroupMember, MediaKind};

use crate::error::Result;

/// Options controlling a single detection pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectionOptions {
    pub media_kinds: Vec<MediaKind>,
    /// Upper bound on comparisons performed within a single bucket before
    /// the bucket is marked incomplete and detection moves on.
    pub max_comparisons_per_bucket: u64,
    /// Soft wall-clock budget for the whole pass; groups formed before the
    /// deadline are kept, remaining buckets are marked incomplete.
    pub time_budget_seconds: Option<u64>,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            media_kinds: vec![MediaKind::Photo, MediaKind::Video, MediaKind::Audio],
            max_comparisons_per_bucket: 50_000,
            time_budget_seconds: None,
        }
    }
}

/// Full evidence for one group, assembled for explanation/debugging
/// surfaces.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupRationale {
    pub group: DuplicateGroup,
    pub members: Vec<GroupMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectionSummary {
    pub buckets_built: u64,
    pub buckets_incomplete: u64,
    pub groups_formed: u64,
    pub comparisons_performed: u64,
}

/// The boundary for candidate bucketing and duplicate detection.
#[async_trait]
pub trait DetectionApi: Send + Sync {
    /// Builds candidate buckets for the requested media kinds from
    /// whatever signatures are currently available.
    async fn build_buckets(&self, options: &DetectionOptions) -> Result<Vec<CandidateBucket>>;

    /// Runs pairwise comparison within the given buckets and emits
    /// duplicate groups, persisting them as open groups.
    async fn detect(
        &self,
        buckets: &[CandidateBucket],
        options: &DetectionOptions,
    ) -> Result<DetectionSummary>;

    /// Read-only projection of a group's evidence, for UIs/debugging.
    async fn explain(&self, group_id: dedup_model::GroupId) -> Result<GroupRationale>;

    /// Records that two files must never be grouped together, regardless
    /// of future signal strength.
    async fn ignore_pair(&self, a: FileId, b: FileId) -> Result<()>;
}
