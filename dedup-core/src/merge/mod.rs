pub mod executor;
pub mod planner;
pub mod trash_backend;

use std::sync::Arc;

use async_trait::async_trait;

use dedup_contracts::error::{ContractError, Result};
use dedup_contracts::merge::{MergeApi, MergeResult, UndoResult};
use dedup_contracts::store::{StoreReadPort, StoreWritePort};

use dedup_model::{GroupId, MergePlan, TransactionId};

use crate::config::EngineConfig;

use self::planner::Candidate;
use self::trash_backend::TrashBackend;

/// Default [`MergeApi`] implementation: `plan` is pure,
/// `commit`/`undo`/`finalize`/`reap_expired_transactions` are the
/// transactional executor, delegated to [`executor`].
pub struct MergeEngine {
    reader: Arc<dyn StoreReadPort>,
    writer: Arc<dyn StoreWritePort>,
    trash: Arc<dyn TrashBackend>,
    config: EngineConfig,
}

impl MergeEngine {
    pub fn new(
        reader: Arc<dyn StoreReadPort>,
        writer: Arc<dyn StoreWritePort>,
        trash: Arc<dyn TrashBackend>,
        config: EngineConfig,
    ) -> Self {
        Self { reader, writer, trash, config }
    }

    async fn candidates_for(&self, group_id: GroupId) -> Result<Vec<Candidate>> {
        let members = self.reader.get_group_members(group_id).await?;
        let mut candidates = Vec::with_capacity(members.len());
        for member in members {
            let Some(file) = self.reader.get_file(member.file_id).await? else {
                continue;
            };
            let metadata = self.reader.get_metadata(member.file_id).await?;
            candidates.push(Candidate { file, metadata });
        }
        Ok(candidates)
    }
}

#[async_trait]
impl MergeApi for MergeEngine {
    async fn plan(&self, group_id: GroupId) -> Result<MergePlan> {
        let group = self
            .reader
            .get_group(group_id)
            .await?
            .ok_or_else(|| ContractError::NotFound(group_id.to_string()))?;

        let candidates = self.candidates_for(group_id).await?;
        if candidates.is_empty() {
            return Err(ContractError::NotFound(format!("group {group_id} has no resolvable members")));
        }

        let user_override = self
            .reader
            .get_preference(&format!("group.{group_id}.keeper_override"))
            .await?
            .and_then(|pref| uuid::Uuid::parse_str(&pref.value).ok())
            .map(dedup_model::FileId::from);

        let (keeper_id, rationale) = planner::select_keeper(&candidates, user_override);

        let mut discards: Vec<Candidate> =
            candidates.iter().filter(|c| c.file.id != keeper_id).cloned().collect();
        planner::rank_discards(&mut discards);

        let keeper = candidates
            .iter()
            .find(|c| c.file.id == keeper_id)
            .expect("keeper_id came from candidates")
            .clone();
        let field_changes = planner::union_fields(&keeper, &discards);
        let discard_ids = discards.iter().map(|c| c.file.id).collect();

        let mut plan = MergePlan::new(group.id, keeper_id, discard_ids);
        plan.field_changes = field_changes;
        plan.keeper_rationale = rationale;
        Ok(plan)
    }

    async fn commit(&self, plan: MergePlan) -> Result<MergeResult> {
        executor::commit(self.reader.as_ref(), self.writer.as_ref(), self.trash.as_ref(), plan).await
    }

    async fn undo(&self, transaction_id: TransactionId) -> Result<UndoResult> {
        executor::undo(self.reader.as_ref(), self.writer.as_ref(), self.trash.as_ref(), transaction_id).await
    }

    async fn finalize(&self, transaction_id: TransactionId) -> Result<()> {
        executor::finalize(self.reader.as_ref(), self.writer.as_ref(), transaction_id).await
    }

    async fn reap_expired_transactions(&self) -> Result<u64> {
        executor::reap_expired_transactions(self.reader.as_ref(), self.writer.as_ref(), &self.config).await
    }
}
