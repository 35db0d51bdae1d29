use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dedup_contracts::scan::{ScanEvent, ScanOptions, ScanSummary};
use dedup_contracts::store::StoreReadPort;
use dedup_model::{File, MediaKind};

use crate::error::shorten_path;
use crate::fs::FileSystem;

use super::excludes::ExcludeSet;

/// Walks the configured roots and emits [`ScanEvent`]s over a bounded
/// channel, applying incremental short-circuiting and cancellation at
/// directory and item boundaries. Back-pressure comes for free from the
/// bounded channel: a slow consumer simply stalls the walker.
pub struct Walker<F: FileSystem> {
    fs: Arc<F>,
    store: Arc<dyn StoreReadPort>,
    cancel: CancellationToken,
}

const CHANNEL_CAPACITY: usize = 256;

impl<F: FileSystem + 'static> Walker<F> {
    pub fn new(fs: Arc<F>, store: Arc<dyn StoreReadPort>, cancel: CancellationToken) -> Self {
        Self { fs, store, cancel }
    }

    pub async fn scan(&self, options: ScanOptions) -> ReceiverStream<ScanEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let fs = self.fs.clone();
        let store = self.store.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let excludes = ExcludeSet::new(&options.extra_excludes);
            let mut summary = ScanSummary::default();

            let known: std::collections::HashMap<dedup_model::IdentityTriple, File> = match store
                .list_files(None)
                .await
            {
                Ok(files) => files.into_iter().map(|f| (f.identity(), f)).collect(),
                Err(e) => {
                    warn!(error = %e, "failed to preload known files, treating scan as fresh");
                    std::collections::HashMap::new()
                }
            };
            let mut seen_ids = std::collections::HashSet::new();
            // Identities already walked this pass: guards against both a
            // symlink cycle re-entering an ancestor directory and the same
            // hardlinked file being counted twice under different paths.
            let mut visited_identities = std::collections::HashSet::new();

            'roots: for root in options.roots.iter().cloned() {
                if cancel.is_cancelled() {
                    break;
                }
                if excludes.excludes_dir(&root) {
                    continue;
                }

                // Depth-first, lexicographically sorted traversal: `stack`
                // holds, for each directory currently being descended into,
                // its still-unvisited children in sorted order. A
                // subdirectory's frame is pushed on top and fully drained
                // before control returns to its parent's remaining
                // siblings, so the whole root's event stream is stable
                // across runs and platforms regardless of the order the
                // filesystem itself hands back directory entries.
                let mut stack: Vec<VecDeque<PathBuf>> = Vec::new();
                match read_sorted_dir(fs.as_ref(), &root).await {
                    Ok(entries) => stack.push(entries),
                    Err(message) => {
                        warn!(path = %shorten_path(&root, 4), %message, "failed to read directory");
                        summary.errors += 1;
                        let _ = tx
                            .send(ScanEvent::DirectoryError {
                                path: root.clone(),
                                message,
                            })
                            .await;
                        continue;
                    }
                }

                while let Some(frame) = stack.last_mut() {
                    if cancel.is_cancelled() {
                        break 'roots;
                    }
                    let Some(entry) = frame.pop_front() else {
                        stack.pop();
                        continue;
                    };

                    let meta = match fs.metadata(&entry).await {
                        Ok(m) => m,
                        Err(message) => {
                            debug!(path = %shorten_path(&entry, 4), %message, "skipping unreadable entry");
                            summary.errors += 1;
                            continue;
                        }
                    };

                    if meta.is_symlink && !options.follow_symlinks {
                        continue;
                    }

                    // Every directory and file, symlinked or not, is
                    // deduplicated by its resolved identity: a followed
                    // symlink back to an already-walked directory is a
                    // cycle, and a hardlinked file reachable from two paths
                    // is the same file observed twice.
                    let identity = match fs.identity(&entry).await {
                        Ok(identity) => {
                            if !visited_identities.insert(identity) {
                                summary.duplicate_identities += 1;
                                continue;
                            }
                            identity
                        }
                        Err(message) => {
                            debug!(path = %shorten_path(&entry, 4), %message, "skipping entry with unresolvable identity");
                            summary.errors += 1;
                            continue;
                        }
                    };

                    if meta.is_dir {
                        if excludes.excludes_dir(&entry) {
                            continue;
                        }
                        match read_sorted_dir(fs.as_ref(), &entry).await {
                            Ok(entries) => stack.push(entries),
                            Err(message) => {
                                warn!(path = %shorten_path(&entry, 4), %message, "failed to read directory");
                                summary.errors += 1;
                                let _ = tx
                                    .send(ScanEvent::DirectoryError {
                                        path: entry.clone(),
                                        message,
                                    })
                                    .await;
                            }
                        }
                        continue;
                    }

                    if !meta.is_file || excludes.excludes_file(&entry) {
                        continue;
                    }

                    if meta.is_cloud_placeholder {
                        summary.cloud_placeholders += 1;
                        let _ = tx.send(ScanEvent::CloudPlaceholder { path: entry.clone() }).await;
                        continue;
                    }

                    let media_kind = entry
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(MediaKind::from_extension)
                        .unwrap_or(MediaKind::Other);
                    if media_kind == MediaKind::Other {
                        continue;
                    }

                    match process_entry(&known, &entry, meta, identity, media_kind, options.incremental) {
                        Classified::New(file) => {
                            seen_ids.insert(file.id);
                            summary.discovered += 1;
                            let _ = tx.send(ScanEvent::Discovered(file)).await;
                        }
                        Classified::Changed(file) => {
                            seen_ids.insert(file.id);
                            summary.updated += 1;
                            let _ = tx.send(ScanEvent::Updated(file)).await;
                        }
                        Classified::Unchanged(id) => {
                            seen_ids.insert(id);
                            summary.unchanged += 1;
                            let _ = tx.send(ScanEvent::Unchanged(id)).await;
                        }
                    }
                }
            }

            if options.incremental {
                for file in known.values() {
                    if !seen_ids.contains(&file.id) {
                        summary.missing += 1;
                        let _ = tx.send(ScanEvent::MissingSinceLastScan(file.id)).await;
                    }
                }
            }

            let _ = tx.send(ScanEvent::Completed(summary)).await;
        });

        ReceiverStream::new(rx)
    }
}

/// Reads every entry of `dir` and returns them sorted lexicographically by
/// path, so callers never have to rely on the filesystem's own (platform-
/// and implementation-dependent) directory-listing order.
async fn read_sorted_dir<F: FileSystem>(fs: &F, dir: &Path) -> Result<VecDeque<PathBuf>, String> {
    let mut read_dir = fs.read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry);
    }
    entries.sort();
    Ok(entries.into())
}

enum Classified {
    New(File),
    Changed(File),
    Unchanged(dedup_model::FileId),
}

fn process_entry(
    known: &std::collections::HashMap<dedup_model::IdentityTriple, File>,
    path: &Path,
    meta: crate::fs::FsMetadata,
    identity: dedup_model::IdentityTriple,
    media_kind: MediaKind,
    incremental: bool,
) -> Classified {
    let modified_at: DateTime<Utc> = meta.modified.map(DateTime::from).unwrap_or_else(Utc::now);
    let created_at: DateTime<Utc> = meta.created.map(DateTime::from).unwrap_or(modified_at);

    let existing = known.get(&identity).cloned();

    match existing {
        Some(mut file) => {
            if incremental && file.path == path {
                let changed = file.observe_change(meta.len, modified_at);
                if !changed {
                    return Classified::Unchanged(file.id);
                }
            } else {
                file.path = path.to_path_buf();
                file.observe_change(meta.len, modified_at);
            }
            Classified::Changed(file)
        }
        None => {
            let file = File::discovered(
                path.to_path_buf(),
                media_kind,
                meta.len,
                created_at,
                modified_at,
                identity,
            );
            Classified::New(file)
        }
    }
}
