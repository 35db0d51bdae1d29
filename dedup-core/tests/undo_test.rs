mod support;

use std::sync::Arc;

use chrono::Utc;

use dedup_contracts::merge::MergeApi;
use dedup_contracts::store::{StoreReadPort, StoreWritePort};
use dedup_core::config::EngineConfig;
use dedup_core::merge::trash_backend::InMemoryTrash;
use dedup_core::merge::MergeEngine;
use dedup_model::{DuplicateGroup, File, GroupMember, GroupStatus, IdentityTriple, MediaKind, MediaMetadata, TransactionStatus};

struct Seeded {
    transaction_id: dedup_model::TransactionId,
    keeper_id: dedup_model::FileId,
    discard_id: dedup_model::FileId,
    group_id: dedup_model::GroupId,
}

async fn commit_a_merge(
    dir: &tempfile::TempDir,
    reader: Arc<dyn StoreReadPort>,
    writer: Arc<dyn StoreWritePort>,
    trash: Arc<InMemoryTrash>,
) -> Seeded {
    let small_path = dir.path().join("small.jpg");
    let large_path = dir.path().join("large.jpg");
    std::fs::write(&small_path, b"small contents").unwrap();
    std::fs::write(&large_path, b"much larger file contents here").unwrap();

    let now = Utc::now();
    let small = File::discovered(
        small_path,
        MediaKind::Photo,
        14,
        now,
        now,
        IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
    );
    let large = File::discovered(
        large_path,
        MediaKind::Photo,
        30,
        now,
        now,
        IdentityTriple { volume_id: 1, file_id: 2, link_count: 1 },
    );

    let mut small_meta = MediaMetadata::empty(small.id);
    small_meta.width = Some(100);
    small_meta.height = Some(100);
    let mut large_meta = MediaMetadata::empty(large.id);
    large_meta.width = Some(4000);
    large_meta.height = Some(3000);
    large_meta.camera_model = Some("Pixel 8".to_string());

    writer.upsert_file(&small).await.unwrap();
    writer.upsert_file(&large).await.unwrap();
    writer.upsert_metadata(&small_meta).await.unwrap();
    writer.upsert_metadata(&large_meta).await.unwrap();

    let group = DuplicateGroup::new(&[small.id, large.id]);
    let members = vec![GroupMember::new(group.id, small.id), GroupMember::new(group.id, large.id)];
    writer.put_group(&group, &members).await.unwrap();

    let engine = MergeEngine::new(reader.clone(), writer.clone(), trash, EngineConfig::default());
    let plan = engine.plan(group.id).await.unwrap();
    let result = engine.commit(plan).await.unwrap();

    Seeded { transaction_id: result.transaction_id, keeper_id: large.id, discard_id: small.id, group_id: group.id }
}

#[tokio::test]
async fn undo_restores_trashed_file_and_reverts_keeper_metadata() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let trash = Arc::new(InMemoryTrash::new());

    let seeded = commit_a_merge(&dir, reader.clone(), writer.clone(), trash.clone()).await;

    let engine = MergeEngine::new(reader.clone(), writer.clone(), trash, EngineConfig::default());
    let undo_result = engine.undo(seeded.transaction_id).await.unwrap();
    assert_eq!(undo_result.restored_count, 1);

    let discard_path = reader.get_file(seeded.discard_id).await.unwrap().unwrap().path;
    assert!(discard_path.exists(), "undo should restore the discard to its original path");

    let discard_file = reader.get_file(seeded.discard_id).await.unwrap().unwrap();
    assert!(!discard_file.trashed);

    let keeper_meta = reader.get_metadata(seeded.keeper_id).await.unwrap().unwrap();
    assert_eq!(keeper_meta.camera_model, None, "camera_model pulled in from the discard should be reverted");

    let group = reader.get_group(seeded.group_id).await.unwrap().unwrap();
    assert_eq!(group.status, GroupStatus::Open);

    let transaction = reader.get_transaction(seeded.transaction_id).await.unwrap().unwrap();
    assert_eq!(transaction.status, TransactionStatus::RolledBack);
}

#[tokio::test]
async fn finalize_forgets_the_transaction_and_blocks_future_undo() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let trash = Arc::new(InMemoryTrash::new());

    let seeded = commit_a_merge(&dir, reader.clone(), writer.clone(), trash.clone()).await;

    let engine = MergeEngine::new(reader.clone(), writer.clone(), trash, EngineConfig::default());
    engine.finalize(seeded.transaction_id).await.unwrap();

    let transaction = reader.get_transaction(seeded.transaction_id).await.unwrap().unwrap();
    assert_eq!(transaction.status, TransactionStatus::Finalized);

    let undo_result = engine.undo(seeded.transaction_id).await;
    assert!(undo_result.is_err(), "a finalized transaction must no longer be undoable");
}

#[tokio::test]
async fn reap_expired_transactions_only_removes_staged_transactions_past_ttl() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let trash = Arc::new(InMemoryTrash::new());

    let mut config = EngineConfig::default();
    config.staged_transaction_ttl_seconds = 0;

    let seeded = commit_a_merge(&dir, reader.clone(), writer.clone(), trash.clone()).await;
    let engine = MergeEngine::new(reader.clone(), writer.clone(), trash, config);

    let reaped = engine.reap_expired_transactions().await.unwrap();
    assert_eq!(reaped, 0, "a committed transaction is not staged, so reaping must leave it alone");

    let transaction = reader.get_transaction(seeded.transaction_id).await.unwrap().unwrap();
    assert_eq!(transaction.status, TransactionStatus::Committed);
}
