use chrono::{DateTime, Utc};

use crate::ids::{FileId, GroupId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text"))]
pub enum GroupStatus {
    Open,
    Resolved,
    Ignored,
}

/// A signal's raw score, weight, and contribution to a pair's aggregate
/// confidence, persisted for the evidence view.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalContribution {
    pub key: String,
    pub weight: f64,
    pub raw_score: f64,
    pub contribution: f64,
    pub rationale: String,
}

/// A penalty applied against a pair's aggregate score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Penalty {
    pub key: String,
    pub amount: f64,
    pub rationale: String,
}

/// One member of a [`DuplicateGroup`], carrying its evidence against the
/// group's suggested keeper.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupMember {
    pub group_id: GroupId,
    pub file_id: FileId,
    pub keeper_suggestion: bool,
    pub hamming_distance_to_keeper: Option<u32>,
    pub name_similarity_to_keeper: Option<f64>,
    pub signal_contributions: Vec<SignalContribution>,
    pub penalties: Vec<Penalty>,
}

impl GroupMember {
    pub fn new(group_id: GroupId, file_id: FileId) -> Self {
        Self {
            group_id,
            file_id,
            keeper_suggestion: false,
            hamming_distance_to_keeper: None,
            name_similarity_to_keeper: None,
            signal_contributions: Vec::new(),
            penalties: Vec::new(),
        }
    }
}

/// A connected component of related files emitted by the detection engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DuplicateGroup {
    pub id: GroupId,
    pub created_at: DateTime<Utc>,
    pub status: GroupStatus,
    pub confidence: f64,
    pub incomplete: bool,
    /// Opaque serialized record of which policy collapses (RAW+JPEG,
    /// Live Photo, sidecar) contributed edges to this group, kept for
    /// the evidence view.
    pub policy_decisions: Vec<u8>,
}

impl DuplicateGroup {
    pub fn new(member_ids: &[FileId]) -> Self {
        debug_assert!(member_ids.len() >= 2, "a group must have >= 2 members");
        Self {
            id: GroupId::new(),
            created_at: Utc::now(),
            status: GroupStatus::Open,
            confidence: 0.0,
            incomplete: false,
            policy_decisions: Vec::new(),
        }
    }
}

/// Classification label assigned once a pair's aggregate score is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLabel {
    Duplicate,
    SimilarNotDuplicate,
}
