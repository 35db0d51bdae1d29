use async_trait::async_trait;

use dedup_model::{FieldChange, GroupId, MergePlan, TransactionId};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeResult {
    pub transaction_id: TransactionId,
    pub keeper_id: dedup_model::FileId,
    pub trashed_count: usize,
    pub field_changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UndoResult {
    pub transaction_id: TransactionId,
    pub restored_count: usize,
}

/// The boundary for planning and executing merges.
///
/// `commit` is the only operation that touches the filesystem or trash;
/// `plan` is pure and safe to call repeatedly for preview purposes.
#[async_trait]
pub trait MergeApi: Send + Sync {
    /// Builds (but does not execute) a merge plan for an open group.
    async fn plan(&self, group_id: GroupId) -> Result<MergePlan>;

    /// Stages and commits a merge: trashes discarded files, applies field
    /// changes to the keeper, and records an undoable transaction.
    async fn commit(&self, plan: MergePlan) -> Result<MergeResult>;

    /// Reverses a committed transaction, restoring trashed files and
    /// field changes, provided the transaction has not been finalized.
    async fn undo(&self, transaction_id: TransactionId) -> Result<UndoResult>;

    /// Permanently forgets the undo record for a transaction, typically
    /// invoked once the recycle bin has actually been emptied.
    async fn finalize(&self, transaction_id: TransactionId) -> Result<()>;

    /// Deletes staged-but-never-committed transactions older than the
    /// configured TTL. Plain caller-invoked maintenance, not a background
    /// daemon.
    async fn reap_expired_transactions(&self) -> Result<u64>;
}
