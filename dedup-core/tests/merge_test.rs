mod support;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use dedup_contracts::merge::MergeApi;
use dedup_contracts::store::{StoreReadPort, StoreWritePort};
use dedup_core::config::EngineConfig;
use dedup_core::merge::trash_backend::InMemoryTrash;
use dedup_core::merge::MergeEngine;
use dedup_model::{DuplicateGroup, File, GroupMember, IdentityTriple, MediaKind, MediaMetadata};

async fn seed_group(
    dir: &tempfile::TempDir,
    writer: &dyn StoreWritePort,
    small_name: &str,
    large_name: &str,
) -> (dedup_model::FileId, dedup_model::FileId, dedup_model::GroupId) {
    let small_path = dir.path().join(small_name);
    let large_path = dir.path().join(large_name);
    std::fs::write(&small_path, b"small contents").unwrap();
    std::fs::write(&large_path, b"much larger file contents here").unwrap();

    let now = Utc::now();
    let mut small = File::discovered(
        small_path,
        MediaKind::Photo,
        14,
        now,
        now,
        IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
    );
    let mut large = File::discovered(
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

    small.needs_metadata_refresh = false;
    large.needs_metadata_refresh = false;

    writer.upsert_file(&small).await.unwrap();
    writer.upsert_file(&large).await.unwrap();
    writer.upsert_metadata(&small_meta).await.unwrap();
    writer.upsert_metadata(&large_meta).await.unwrap();

    let group = DuplicateGroup::new(&[small.id, large.id]);
    let members = vec![GroupMember::new(group.id, small.id), GroupMember::new(group.id, large.id)];
    writer.put_group(&group, &members).await.unwrap();

    (small.id, large.id, group.id)
}

#[tokio::test]
async fn plan_picks_the_higher_resolution_file_as_keeper() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let (small_id, large_id, group_id) = seed_group(&dir, writer.as_ref(), "small.jpg", "large.jpg").await;

    let trash = Arc::new(InMemoryTrash::new());
    let engine = MergeEngine::new(reader.clone(), writer.clone(), trash, EngineConfig::default());

    let plan = engine.plan(group_id).await.unwrap();
    assert_eq!(plan.keeper_id, large_id);
    assert_eq!(plan.discard_ids, vec![small_id]);
    assert!(plan.field_changes.iter().any(|c| c.field == "camera_model"));
}

#[tokio::test]
async fn commit_trashes_discards_and_merges_keeper_metadata() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let (small_id, large_id, group_id) = seed_group(&dir, writer.as_ref(), "small.jpg", "large.jpg").await;

    let trash = Arc::new(InMemoryTrash::new());
    let engine = MergeEngine::new(reader.clone(), writer.clone(), trash.clone(), EngineConfig::default());

    let plan = engine.plan(group_id).await.unwrap();
    let small_path = reader.get_file(small_id).await.unwrap().unwrap().path;
    let result = engine.commit(plan).await.unwrap();

    assert_eq!(result.keeper_id, large_id);
    assert_eq!(result.trashed_count, 1);
    assert!(!small_path.exists(), "discard should have been moved out by the trash backend");

    let keeper_meta = reader.get_metadata(large_id).await.unwrap().unwrap();
    assert_eq!(keeper_meta.camera_model.as_deref(), Some("Pixel 8"));

    let discard_file = reader.get_file(small_id).await.unwrap().unwrap();
    assert!(discard_file.trashed);

    let group = reader.get_group(group_id).await.unwrap().unwrap();
    assert_eq!(group.status, dedup_model::GroupStatus::Resolved);
}

#[tokio::test]
async fn commit_fails_and_leaves_no_trace_when_keeper_is_missing_from_disk() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let (_small_id, large_id, group_id) = seed_group(&dir, writer.as_ref(), "small.jpg", "large.jpg").await;

    let trash = Arc::new(InMemoryTrash::new());
    let engine = MergeEngine::new(reader.clone(), writer.clone(), trash, EngineConfig::default());
    let plan = engine.plan(group_id).await.unwrap();

    let keeper_path = reader.get_file(large_id).await.unwrap().unwrap().path;
    std::fs::remove_file(&keeper_path).unwrap();

    let result = engine.commit(plan).await;
    assert!(result.is_err());
}
