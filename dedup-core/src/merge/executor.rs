//! Transactional executor. `commit` is the only function in
//! this module that touches the filesystem or the recycle bin; everything
//! else operates on already-staged state.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use dedup_contracts::error::{ContractError, Result};
use dedup_contracts::merge::{MergeResult, UndoResult};
use dedup_contracts::store::{StoreReadPort, StoreWritePort};

use dedup_model::{
    FieldChange, GroupStatus, MediaMetadata, MergePlan, MergeTransaction, TransactionId,
    TransactionStatus,
};

use crate::config::EngineConfig;
use crate::error::DedupError;

use super::trash_backend::{RecycleToken, TrashBackend};

fn sidecar_path(original: &Path) -> PathBuf {
    let mut name = original.as_os_str().to_os_string();
    name.push(".xmp");
    PathBuf::from(name)
}

fn sidecar_contents(field_changes: &[FieldChange]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<dedup:fields>\n");
    for change in field_changes {
        out.push_str(&format!(
            "  <field name=\"{}\" from=\"{}\">{}</field>\n",
            change.field, change.from_file_id, change.new_value
        ));
    }
    out.push_str("</dedup:fields>\n");
    out
}

/// Merges one [`FieldChange`] into a [`MediaMetadata`] row, returning the
/// previous value so undo can restore it verbatim.
fn apply_field_change(meta: &mut MediaMetadata, change: &FieldChange) -> Option<String> {
    match change.field.as_str() {
        "camera_model" => std::mem::replace(&mut meta.camera_model, Some(change.new_value.clone())),
        "codec_tag" => std::mem::replace(&mut meta.codec_tag, Some(change.new_value.clone())),
        "content_type_tag" => std::mem::replace(&mut meta.content_type_tag, Some(change.new_value.clone())),
        "capture_time" => {
            let previous = meta.capture_time.map(|t| t.to_rfc3339());
            meta.capture_time = change.new_value.parse().ok();
            previous
        }
        "dimensions" => {
            let previous = match (meta.width, meta.height) {
                (Some(w), Some(h)) => Some(format!("{w}x{h}")),
                _ => None,
            };
            if let Some((w, h)) = change.new_value.split_once('x') {
                meta.width = w.parse().ok();
                meta.height = h.parse().ok();
            }
            previous
        }
        "gps" => {
            let previous = meta.gps().map(|g| format!("{},{}", g.lat, g.lon));
            if let Some((lat, lon)) = change.new_value.split_once(',') {
                if let (Ok(lat), Ok(lon)) = (lat.parse(), lon.parse()) {
                    meta.set_gps(Some(dedup_model::GpsCoordinate { lat, lon }));
                }
            }
            previous
        }
        "keywords" => {
            if !meta.keywords.contains(&change.new_value) {
                meta.keywords.push(change.new_value.clone());
            }
            None
        }
        other => {
            warn!(field = other, "unrecognized field change, ignoring");
            None
        }
    }
}

/// Reverses one already-applied [`FieldChange`], using the previous value
/// captured at commit time.
fn revert_field_change(meta: &mut MediaMetadata, change: &FieldChange) {
    match change.field.as_str() {
        "camera_model" => meta.camera_model = change.previous_value.clone(),
        "codec_tag" => meta.codec_tag = change.previous_value.clone(),
        "content_type_tag" => meta.content_type_tag = change.previous_value.clone(),
        "capture_time" => meta.capture_time = change.previous_value.as_ref().and_then(|v| v.parse().ok()),
        "dimensions" => {
            if let Some(prev) = &change.previous_value {
                if let Some((w, h)) = prev.split_once('x') {
                    meta.width = w.parse().ok();
                    meta.height = h.parse().ok();
                }
            } else {
                meta.width = None;
                meta.height = None;
            }
        }
        "gps" => {
            if let Some(prev) = &change.previous_value {
                if let Some((lat, lon)) = prev.split_once(',') {
                    if let (Ok(lat), Ok(lon)) = (lat.parse(), lon.parse()) {
                        meta.set_gps(Some(dedup_model::GpsCoordinate { lat, lon }));
                        return;
                    }
                }
            }
            meta.set_gps(None);
        }
        "keywords" => meta.keywords.retain(|kw| kw != &change.new_value),
        _ => {}
    }
}

pub async fn commit(
    reader: &dyn StoreReadPort,
    writer: &dyn StoreWritePort,
    trash: &dyn TrashBackend,
    plan: MergePlan,
) -> Result<MergeResult> {
    let keeper = reader
        .get_file(plan.keeper_id)
        .await?
        .ok_or_else(|| ContractError::NotFound(plan.keeper_id.to_string()))?;

    let mut discards = Vec::with_capacity(plan.discard_ids.len());
    for &id in &plan.discard_ids {
        let file = reader.get_file(id).await?.ok_or_else(|| ContractError::NotFound(id.to_string()))?;
        if file.id == keeper.id {
            return Err(DedupError::InvalidFile(format!("keeper {} also listed as a discard", keeper.id)).into());
        }
        if !file.path.exists() {
            return Err(DedupError::InvalidFile(format!("{} is no longer on disk", file.path.display())).into());
        }
        discards.push(file);
    }
    if !keeper.path.exists() {
        return Err(DedupError::InvalidFile(format!("keeper {} is no longer on disk", keeper.path.display())).into());
    }

    let mut keeper_meta = reader.get_metadata(keeper.id).await?.unwrap_or_else(|| MediaMetadata::empty(keeper.id));
    let mut field_changes = plan.field_changes.clone();
    for change in &mut field_changes {
        let previous = apply_field_change(&mut keeper_meta, change);
        change.previous_value = previous;
    }

    // Stage: write a sidecar in the keeper's directory via a same-filesystem
    // temp file, so the final move is a plain rename.
    // RAW originals are never rewritten in place; everything here already
    // targets a sidecar, matching the RAW branch of the protocol.
    let staged_sidecar = if field_changes.is_empty() {
        None
    } else {
        let dir = keeper.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::Builder::new()
            .prefix(".dedup-merge-")
            .suffix(".xmp.tmp")
            .tempfile_in(dir)
            .map_err(DedupError::Io)?;
        use std::io::Write;
        temp.write_all(sidecar_contents(&field_changes).as_bytes()).map_err(DedupError::Io)?;
        Some(temp.into_temp_path())
    };

    let mut transaction = MergeTransaction::staged(&plan);
    transaction.field_changes = field_changes.clone();
    writer.put_transaction(&transaction).await?;

    let sidecar_target = sidecar_path(&keeper.path);
    if let Some(temp) = staged_sidecar {
        if let Err(err) = temp.persist(&sidecar_target) {
            return Err(DedupError::Io(err.error).into());
        }
    }

    let mut trashed_count = 0usize;
    for (index, file) in discards.iter().enumerate() {
        match trash.trash(&file.path) {
            Ok(token) => {
                transaction.original_paths.push(file.path.display().to_string());
                transaction.trash_handles.push(token.0);
                trashed_count += 1;
            }
            Err(err) => {
                // Roll back everything already trashed in this commit and
                // the sidecar, leaving no externally visible change.
                for (path, handle) in
                    transaction.original_paths.iter().zip(transaction.trash_handles.iter())
                {
                    let _ = trash.restore(&RecycleToken(handle.clone()), Path::new(path));
                }
                if !field_changes.is_empty() {
                    let _ = std::fs::remove_file(&sidecar_target);
                }
                writer.delete_transaction(transaction.id).await.ok();
                return Err(
                    DedupError::Internal(format!("failed trashing discard #{index} ({}): {err}", file.path.display())).into(),
                );
            }
        }
        let mut trashed_file = file.clone();
        trashed_file.trashed = true;
        writer.upsert_file(&trashed_file).await?;
    }

    writer.upsert_metadata(&keeper_meta).await?;

    if let Some(mut group) = reader.get_group(plan.group_id).await? {
        group.status = GroupStatus::Resolved;
        let members = reader.get_group_members(plan.group_id).await?;
        writer.put_group(&group, &members).await?;
    }

    transaction.status = TransactionStatus::Committed;
    transaction.committed_at = Some(Utc::now());
    writer.put_transaction(&transaction).await?;

    info!(transaction_id = %transaction.id, keeper = %keeper.id, trashed_count, "merge committed");

    Ok(MergeResult {
        transaction_id: transaction.id,
        keeper_id: keeper.id,
        trashed_count,
        field_changes,
    })
}

pub async fn undo(
    reader: &dyn StoreReadPort,
    writer: &dyn StoreWritePort,
    trash: &dyn TrashBackend,
    transaction_id: TransactionId,
) -> Result<UndoResult> {
    let transaction = reader
        .get_transaction(transaction_id)
        .await?
        .ok_or_else(|| ContractError::NotFound(transaction_id.to_string()))?;

    if transaction.status != TransactionStatus::Committed {
        return Err(DedupError::TransactionNotCommitted(transaction_id.to_string()).into());
    }

    let mut restored_count = 0usize;
    for (path, handle) in transaction.original_paths.iter().zip(transaction.trash_handles.iter()) {
        match trash.restore(&RecycleToken(handle.clone()), Path::new(path)) {
            Ok(()) => restored_count += 1,
            Err(err) => warn!(%path, %err, "could not restore trashed file during undo"),
        }
    }

    if !transaction.field_changes.is_empty() {
        if let Some(keeper_file) = reader.get_file(transaction.keeper_id).await? {
            let _ = std::fs::remove_file(sidecar_path(&keeper_file.path));
        }
    }

    if let Some(mut keeper_meta) = reader.get_metadata(transaction.keeper_id).await? {
        for change in transaction.field_changes.iter().rev() {
            revert_field_change(&mut keeper_meta, change);
        }
        writer.upsert_metadata(&keeper_meta).await?;
    }

    for path in &transaction.original_paths {
        if let Some(file) = reader
            .list_files(None)
            .await?
            .into_iter()
            .find(|f| f.path.display().to_string() == *path)
        {
            let mut restored_file = file;
            restored_file.trashed = false;
            writer.upsert_file(&restored_file).await?;
        }
    }

    if let Some(mut group) = reader.get_group(transaction.group_id).await? {
        group.status = GroupStatus::Open;
        let members = reader.get_group_members(transaction.group_id).await?;
        writer.put_group(&group, &members).await?;
    }

    let mut updated = transaction;
    updated.status = TransactionStatus::RolledBack;
    writer.put_transaction(&updated).await?;

    Ok(UndoResult { transaction_id, restored_count })
}

pub async fn finalize(
    reader: &dyn StoreReadPort,
    writer: &dyn StoreWritePort,
    transaction_id: TransactionId,
) -> Result<()> {
    let mut transaction = reader
        .get_transaction(transaction_id)
        .await?
        .ok_or_else(|| ContractError::NotFound(transaction_id.to_string()))?;

    match transaction.status {
        TransactionStatus::Finalized => Ok(()),
        TransactionStatus::Committed => {
            transaction.status = TransactionStatus::Finalized;
            writer.put_transaction(&transaction).await?;
            Ok(())
        }
        _ => Err(DedupError::TransactionNotCommitted(transaction_id.to_string()).into()),
    }
}

pub async fn reap_expired_transactions(
    reader: &dyn StoreReadPort,
    writer: &dyn StoreWritePort,
    config: &EngineConfig,
) -> Result<u64> {
    let now = Utc::now();
    let staged = reader.list_staged_transactions().await?;
    let mut reaped = 0u64;
    for transaction in staged {
        if transaction.is_expired(now, config.staged_transaction_ttl_seconds) {
            writer.delete_transaction(transaction.id).await?;
            reaped += 1;
        }
    }
    Ok(reaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dedup_model::FileId;

    #[test]
    fn sidecar_path_appends_xmp() {
        let path = sidecar_path(Path::new("/lib/img.jpg"));
        assert_eq!(path, PathBuf::from("/lib/img.jpg.xmp"));
    }

    #[test]
    fn apply_then_revert_camera_model_round_trips() {
        let mut meta = MediaMetadata::empty(FileId::new());
        let mut change = FieldChange {
            field: "camera_model".to_string(),
            from_file_id: FileId::new(),
            previous_value: None,
            new_value: "Pixel 8".to_string(),
        };
        change.previous_value = apply_field_change(&mut meta, &change.clone());
        assert_eq!(meta.camera_model.as_deref(), Some("Pixel 8"));

        revert_field_change(&mut meta, &change);
        assert_eq!(meta.camera_model, None);
    }

    #[test]
    fn keyword_revert_removes_only_that_keyword() {
        let mut meta = MediaMetadata::empty(FileId::new());
        meta.keywords.push("vacation".to_string());
        let change = FieldChange {
            field: "keywords".to_string(),
            from_file_id: FileId::new(),
            previous_value: None,
            new_value: "beach".to_string(),
        };
        apply_field_change(&mut meta, &change);
        assert_eq!(meta.keywords, vec!["vacation".to_string(), "beach".to_string()]);
        revert_field_change(&mut meta, &change);
        assert_eq!(meta.keywords, vec!["vacation".to_string()]);
    }
}
