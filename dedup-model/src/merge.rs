use chrono::{DateTime, Utc};

use crate::ids::{FileId, GroupId, TransactionId};

/// A single field carried over from a trashed duplicate into the keeper
/// during a merge.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldChange {
    pub field: String,
    pub from_file_id: FileId,
    pub previous_value: Option<String>,
    pub new_value: String,
}

/// The proposed outcome of resolving a [`crate::group::DuplicateGroup`]:
/// which file survives, which are discarded, and what fields the keeper
/// gains from them. Produced by the merge planner, not yet executed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergePlan {
    pub group_id: GroupId,
    pub keeper_id: FileId,
    /// All non-keeper members of the group, in the order they will be
    /// trashed.
    pub discard_ids: Vec<FileId>,
    pub field_changes: Vec<FieldChange>,
    pub keeper_rationale: String,
}

impl MergePlan {
    pub fn new(group_id: GroupId, keeper_id: FileId, discard_ids: Vec<FileId>) -> Self {
        Self {
            group_id,
            keeper_id,
            discard_ids,
            field_changes: Vec::new(),
            keeper_rationale: String::new(),
        }
    }
}

/// Lifecycle state of a [`MergeTransaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text"))]
pub enum TransactionStatus {
    Staged,
    Committed,
    RolledBack,
    Finalized,
    Reaped,
}

/// The durable, undoable record of an executed (or in-flight) merge.
/// Carries everything the executor needs to roll a commit back before
/// the trash is emptied.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MergeTransaction {
    pub id: TransactionId,
    pub group_id: GroupId,
    pub keeper_id: FileId,
    pub status: TransactionStatus,
    pub staged_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
    /// Original paths of every discarded file, in trash order, so undo can
    /// restore them even if the trash backend's own record is gone.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub original_paths: Vec<String>,
    /// Backend-specific handles (e.g. a per-OS trash item id) needed to
    /// restore each discarded file, 1:1 with `original_paths`.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub trash_handles: Vec<String>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub field_changes: Vec<FieldChange>,
}

impl MergeTransaction {
    pub fn staged(plan: &MergePlan) -> Self {
        Self {
            id: TransactionId::new(),
            group_id: plan.group_id,
            keeper_id: plan.keeper_id,
            status: TransactionStatus::Staged,
            staged_at: Utc::now(),
            committed_at: None,
            original_paths: Vec::new(),
            trash_handles: Vec::new(),
            field_changes: plan.field_changes.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, staged_ttl_seconds: i64) -> bool {
        self.status == TransactionStatus::Staged
            && (now - self.staged_at).num_seconds() >= staged_ttl_seconds
    }
}
