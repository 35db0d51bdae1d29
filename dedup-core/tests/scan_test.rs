mod support;

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;

use dedup_contracts::scan::{ScanDriver, ScanEvent, ScanOptions};
use dedup_contracts::store::StoreWritePort;
use dedup_core::fs::InMemoryFs;
use dedup_core::scanner::Scanner;

async fn drive_scan(
    scanner: &Scanner<InMemoryFs>,
    writer: &Arc<dyn StoreWritePort>,
    options: ScanOptions,
) -> dedup_contracts::scan::ScanSummary {
    let mut stream = scanner.scan(options).await.unwrap();
    let mut summary = None;
    while let Some(event) = stream.next().await {
        match event {
            ScanEvent::Discovered(file) | ScanEvent::Updated(file) => {
                writer.upsert_file(&file).await.unwrap();
            }
            ScanEvent::MissingSinceLastScan(id) => {
                writer.mark_missing(id).await.unwrap();
            }
            ScanEvent::Completed(s) => summary = Some(s),
            ScanEvent::Unchanged(_) | ScanEvent::DirectoryError { .. } | ScanEvent::CloudPlaceholder { .. } => {}
        }
    }
    summary.expect("scan always emits a Completed event")
}

#[tokio::test]
async fn first_scan_discovers_every_media_file() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);

    let mut fs = InMemoryFs::new();
    fs.add_dir("/library");
    fs.add_file("/library/a.jpg", 100);
    fs.add_file("/library/b.mp4", 200);
    fs.add_file("/library/notes.txt", 10);

    let scanner = Scanner::new(Arc::new(fs), reader);
    let summary = drive_scan(&scanner, &writer, ScanOptions {
        roots: vec![PathBuf::from("/library")],
        ..Default::default()
    })
    .await;

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn rescanning_unchanged_files_reports_unchanged_not_discovered() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);

    let mut fs = InMemoryFs::new();
    fs.add_dir("/library");
    fs.add_file("/library/a.jpg", 100);
    let fs = Arc::new(fs);

    let scanner = Scanner::new(fs.clone(), reader.clone());
    let options = ScanOptions { roots: vec![PathBuf::from("/library")], ..Default::default() };
    drive_scan(&scanner, &writer, options.clone()).await;

    let second = drive_scan(&scanner, &writer, options).await;
    assert_eq!(second.discovered, 0);
    assert_eq!(second.unchanged, 1);
}

#[tokio::test]
async fn file_removed_from_disk_is_reported_missing_on_incremental_rescan() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);

    let mut fs = InMemoryFs::new();
    fs.add_dir("/library");
    fs.add_file("/library/a.jpg", 100);
    fs.add_file("/library/b.jpg", 100);
    let fs = Arc::new(fs);

    let scanner = Scanner::new(fs.clone(), reader.clone());
    let options = ScanOptions { roots: vec![PathBuf::from("/library")], ..Default::default() };
    drive_scan(&scanner, &writer, options.clone()).await;

    let mut fs_after = InMemoryFs::new();
    fs_after.add_dir("/library");
    fs_after.add_file("/library/a.jpg", 100);
    let scanner_after = Scanner::new(Arc::new(fs_after), reader.clone());
    let summary = drive_scan(&scanner_after, &writer, options).await;

    assert_eq!(summary.missing, 1);

    let all_files = reader.list_files(None).await.unwrap();
    assert_eq!(all_files.len(), 1, "the missing file should be excluded from default listings");
}

#[tokio::test]
async fn hardlinked_file_is_counted_once() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);

    let mut fs = InMemoryFs::new();
    fs.add_dir("/library");
    fs.add_file("/library/a.jpg", 100);
    fs.add_hardlink(std::path::Path::new("/library/a.jpg"), "/library/a_link.jpg");

    let scanner = Scanner::new(Arc::new(fs), reader);
    let summary = drive_scan(&scanner, &writer, ScanOptions {
        roots: vec![PathBuf::from("/library")],
        ..Default::default()
    })
    .await;

    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.duplicate_identities, 1);
}

#[tokio::test]
async fn symlinked_directory_is_not_descended_by_default() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);

    let mut fs = InMemoryFs::new();
    fs.add_dir("/library");
    fs.add_file("/library/a.jpg", 100);
    fs.add_symlink("/library/loop", "/library");

    let scanner = Scanner::new(Arc::new(fs), reader);
    let summary = drive_scan(&scanner, &writer, ScanOptions {
        roots: vec![PathBuf::from("/library")],
        follow_symlinks: false,
        ..Default::default()
    })
    .await;

    assert_eq!(summary.discovered, 1);
}

#[tokio::test]
async fn followed_symlink_cycle_is_not_reentered() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);

    let mut fs = InMemoryFs::new();
    fs.add_dir("/library");
    fs.add_file("/library/a.jpg", 100);
    fs.add_symlink("/library/loop", "/library");

    let scanner = Scanner::new(Arc::new(fs), reader);
    let summary = drive_scan(&scanner, &writer, ScanOptions {
        roots: vec![PathBuf::from("/library")],
        follow_symlinks: true,
        ..Default::default()
    })
    .await;

    assert_eq!(summary.discovered, 1);
    assert!(summary.duplicate_identities >= 1, "the symlink loop back to /library must be caught");
}

#[tokio::test]
async fn cloud_placeholder_is_reported_and_not_discovered() {
    let store = support::open_store().await;
    let (reader, writer) = support::as_ports(&store);

    let mut fs = InMemoryFs::new();
    fs.add_dir("/library");
    fs.add_file("/library/a.jpg", 100);
    fs.add_file("/library/b.jpg", 200);
    fs.add_cloud_placeholder(PathBuf::from("/library/b.jpg"));

    let scanner = Scanner::new(Arc::new(fs), reader);
    let mut stream = scanner
        .scan(ScanOptions { roots: vec![PathBuf::from("/library")], ..Default::default() })
        .await
        .unwrap();

    let mut placeholders = 0;
    let mut summary = None;
    while let Some(event) = stream.next().await {
        match event {
            ScanEvent::Discovered(file) => {
                writer.upsert_file(&file).await.unwrap();
            }
            ScanEvent::CloudPlaceholder { .. } => placeholders += 1,
            ScanEvent::Completed(s) => summary = Some(s),
            _ => {}
        }
    }

    assert_eq!(placeholders, 1);
    let summary = summary.unwrap();
    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.cloud_placeholders, 1);
}
