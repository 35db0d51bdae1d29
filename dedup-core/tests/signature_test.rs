mod support;

use chrono::Utc;
use image::{Rgb, RgbImage};

use dedup_contracts::signature::SignatureApi;
use dedup_contracts::store::{StoreReadPort, StoreWritePort};
use dedup_core::config::EngineConfig;
use dedup_core::signature::SignatureEngine;
use dedup_model::{File, IdentityTriple, MediaKind};

fn write_test_png(path: &std::path::Path) {
    let mut img = RgbImage::new(32, 32);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let shade = ((x + y) % 256) as u8;
        *pixel = Rgb([shade, shade, shade]);
    }
    img.save(path).unwrap();
}

#[tokio::test]
async fn hash_image_persists_dhash_and_clears_the_refresh_flag() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.png");
    write_test_png(&path);

    let now = Utc::now();
    let file = File::discovered(
        path,
        MediaKind::Photo,
        1024,
        now,
        now,
        IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
    );
    let file_id = file.id;
    writer.upsert_file(&file).await.unwrap();

    let engine = SignatureEngine::new(reader.clone(), writer.clone(), EngineConfig::default());
    let signatures = engine.hash_image(file_id).await.unwrap();

    assert!(signatures.iter().any(|s| s.algorithm == dedup_model::ImageHashAlgorithm::DHash));
    assert!(signatures.iter().any(|s| s.algorithm == dedup_model::ImageHashAlgorithm::PHash));

    let refreshed = reader.get_file(file_id).await.unwrap().unwrap();
    assert!(!refreshed.needs_signature_refresh);

    let stored = reader.get_image_signatures(file_id).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn hash_image_is_cached_once_the_refresh_flag_is_clear() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.png");
    write_test_png(&path);

    let now = Utc::now();
    let file = File::discovered(
        path.clone(),
        MediaKind::Photo,
        1024,
        now,
        now,
        IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
    );
    let file_id = file.id;
    writer.upsert_file(&file).await.unwrap();

    let engine = SignatureEngine::new(reader.clone(), writer.clone(), EngineConfig::default());
    let first = engine.hash_image(file_id).await.unwrap();

    std::fs::remove_file(&path).unwrap();
    let second = engine.hash_image(file_id).await.unwrap();
    assert_eq!(first, second, "cached signatures must be returned without touching the now-deleted file");
}

#[tokio::test]
async fn compute_checksum_persists_sha256_and_is_cached_until_the_file_changes() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.png");
    write_test_png(&path);

    let now = Utc::now();
    let file = File::discovered(
        path.clone(),
        MediaKind::Photo,
        1024,
        now,
        now,
        IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
    );
    let file_id = file.id;
    writer.upsert_file(&file).await.unwrap();

    let engine = SignatureEngine::new(reader.clone(), writer.clone(), EngineConfig::default());
    let checksum = engine.compute_checksum(file_id).await.unwrap();
    assert_eq!(checksum.len(), 32);

    let refreshed = reader.get_file(file_id).await.unwrap().unwrap();
    assert_eq!(refreshed.checksum, Some(checksum.clone()));

    std::fs::remove_file(&path).unwrap();
    let cached = engine.compute_checksum(file_id).await.unwrap();
    assert_eq!(cached, checksum, "cached checksum must be returned without touching the now-deleted file");
}

#[tokio::test]
async fn extract_metadata_falls_back_to_pixel_dimensions_without_exif() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.png");
    write_test_png(&path);

    let now = Utc::now();
    let file = File::discovered(
        path,
        MediaKind::Photo,
        1024,
        now,
        now,
        IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
    );
    let file_id = file.id;
    writer.upsert_file(&file).await.unwrap();

    let engine = SignatureEngine::new(reader.clone(), writer.clone(), EngineConfig::default());
    let meta = engine.extract_metadata(file_id).await.unwrap();

    assert_eq!(meta.width, Some(32));
    assert_eq!(meta.height, Some(32));

    let refreshed = reader.get_file(file_id).await.unwrap().unwrap();
    assert!(!refreshed.needs_metadata_refresh);
}
