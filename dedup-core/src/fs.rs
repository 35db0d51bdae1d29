use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

use dedup_model::IdentityTriple;

/// Minimal, async-capable filesystem abstraction used by the scanner.
/// Swappable for tests; production code runs against [`RealFs`].
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn path_exists(&self, path: &Path) -> bool;

    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, String>;

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String>;

    /// Stable (volume, file, link-count) identity for the path, used to
    /// recognize the same file across renames.
    async fn identity(&self, path: &Path) -> Result<IdentityTriple, String>;
}

#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    /// True for an entry that is listed but not materialized locally
    /// (e.g. an undownloaded cloud-sync placeholder). Detected on a
    /// best-effort basis; see `RealFs::metadata`.
    pub is_cloud_placeholder: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
}

#[async_trait]
pub trait ReadDirStream {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, String>;
}

/// Real filesystem implementation backed by tokio::fs and the `file-id`
/// crate for stable cross-rename identity.
#[derive(Debug, Default)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, String> {
        let rd = tokio::fs::read_dir(path)
            .await
            .map_err(|e| format!("read_dir failed for {:?}: {}", path, e))?;
        Ok(Box::new(RealReadDir { inner: rd }))
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String> {
        let symlink_md = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| format!("metadata failed for {:?}: {}", path, e))?;
        let is_symlink = symlink_md.file_type().is_symlink();

        let md = if is_symlink {
            // Resolve through the link for size/dir/file classification;
            // callers decide whether to follow based on `ScanOptions`.
            match tokio::fs::metadata(path).await {
                Ok(md) => md,
                Err(e) => {
                    return Err(format!("metadata failed for symlink {:?}: {}", path, e));
                }
            }
        } else {
            symlink_md
        };

        Ok(FsMetadata {
            is_dir: md.is_dir(),
            is_file: md.is_file(),
            is_symlink,
            is_cloud_placeholder: is_cloud_placeholder_name(path),
            len: md.len(),
            modified: md.modified().ok(),
            created: md.created().ok(),
        })
    }

    async fn identity(&self, path: &Path) -> Result<IdentityTriple, String> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let id = file_id::get_file_id(&path)
                .map_err(|e| format!("file_id failed for {:?}: {}", path, e))?;
            Ok(identity_from_file_id(id))
        })
        .await
        .map_err(|e| format!("identity task panicked: {}", e))?
    }
}

/// Recognizes the iCloud Drive / file-provider placeholder naming
/// convention (`.name.ext.icloud`) as the one portable, name-based signal
/// for an entry that's listed but not materialized locally.
fn is_cloud_placeholder_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with('.') && name.ends_with(".icloud")
}

fn identity_from_file_id(id: file_id::FileId) -> IdentityTriple {
    match id {
        file_id::FileId::Inode {
            device_id,
            inode_number,
        } => IdentityTriple {
            volume_id: device_id,
            file_id: inode_number as u128,
            link_count: 0,
        },
        file_id::FileId::LowRes {
            volume_serial_number,
            file_index,
        } => IdentityTriple {
            volume_id: volume_serial_number as u64,
            file_id: file_index as u128,
            link_count: 0,
        },
        file_id::FileId::HighRes {
            volume_serial_number,
            file_id,
        } => IdentityTriple {
            volume_id: volume_serial_number,
            file_id,
            link_count: 0,
        },
        _ => IdentityTriple {
            volume_id: 0,
            file_id: 0,
            link_count: 0,
        },
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, String> {
        match self.inner.next_entry().await {
            Ok(Some(entry)) => Ok(Some(entry.path())),
            Ok(None) => Ok(None),
            Err(e) => Err(format!("next_entry failed: {}", e)),
        }
    }
}

/// In-memory filesystem for tests. Paths are treated literally; callers
/// should use consistent absolute or relative paths.
#[derive(Default, Clone)]
pub struct InMemoryFs {
    nodes: HashMap<PathBuf, Node>,
    identities: HashMap<PathBuf, IdentityTriple>,
    placeholders: std::collections::HashSet<PathBuf>,
    next_file_id: u128,
}

#[derive(Clone)]
enum Node {
    Dir { children: Vec<PathBuf> },
    File { len: u64 },
    Symlink { target: PathBuf },
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            identities: HashMap::new(),
            placeholders: std::collections::HashSet::new(),
            next_file_id: 1,
        }
    }

    fn next_identity(&mut self) -> IdentityTriple {
        let file_id = self.next_file_id;
        self.next_file_id += 1;
        IdentityTriple { volume_id: 1, file_id, link_count: 1 }
    }

    pub fn add_dir<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        if self.nodes.contains_key(&path) {
            return;
        }
        self.ensure_parent_link(&path);
        let identity = self.next_identity();
        self.identities.insert(path.clone(), identity);
        self.nodes.insert(
            path,
            Node::Dir {
                children: Vec::new(),
            },
        );
    }

    pub fn add_file<P: Into<PathBuf>>(&mut self, path: P, len: u64) {
        let path = path.into();
        self.ensure_parent_link(&path);
        let identity = self.next_identity();
        self.identities.insert(path.clone(), identity);
        self.nodes.insert(path, Node::File { len });
    }

    /// Adds a second path sharing an already-tracked file's identity
    /// triple, simulating a hardlink.
    pub fn add_hardlink<P: Into<PathBuf>>(&mut self, existing: &Path, link_path: P) {
        let link_path = link_path.into();
        let Some(identity) = self.identities.get(existing).copied() else {
            return;
        };
        let len = match self.nodes.get(existing) {
            Some(Node::File { len }) => *len,
            _ => 0,
        };
        self.ensure_parent_link(&link_path);
        self.identities.insert(
            link_path.clone(),
            IdentityTriple { link_count: identity.link_count + 1, ..identity },
        );
        self.nodes.insert(link_path, Node::File { len });
    }

    /// Adds a symlink entry pointing at `target`, which need not exist.
    pub fn add_symlink<P: Into<PathBuf>>(&mut self, path: P, target: P) {
        let path = path.into();
        self.ensure_parent_link(&path);
        self.nodes.insert(path, Node::Symlink { target: target.into() });
    }

    /// Marks `path` (already added via `add_file`) as an undownloaded
    /// cloud-sync placeholder.
    pub fn add_cloud_placeholder<P: Into<PathBuf>>(&mut self, path: P) {
        self.placeholders.insert(path.into());
    }

    /// Renames a tracked path while preserving its identity triple, so
    /// tests can exercise rename-survival without touching a real disk.
    pub fn rename_file<P: Into<PathBuf>>(&mut self, from: &Path, to: P) {
        let to = to.into();
        if let Some(Node::File { len }) = self.nodes.remove(from) {
            if let Some(identity) = self.identities.remove(from) {
                self.identities.insert(to.clone(), identity);
            }
            self.ensure_parent_link(&to);
            self.nodes.insert(to, Node::File { len });
        }
    }

    fn ensure_parent_link(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !self.nodes.contains_key(parent) {
                let identity = self.next_identity();
                self.identities.insert(parent.to_path_buf(), identity);
                self.nodes.insert(
                    parent.to_path_buf(),
                    Node::Dir {
                        children: Vec::new(),
                    },
                );
                self.ensure_parent_link(parent);
            }
            if let Some(Node::Dir { children }) = self.nodes.get_mut(parent) {
                if !children.iter().any(|p| p.as_path() == path) {
                    children.push(path.to_path_buf());
                }
            }
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn path_exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, String> {
        match self.nodes.get(path) {
            Some(Node::Dir { children }) => Ok(Box::new(InMemReadDir {
                queue: children.clone().into(),
            })),
            Some(Node::File { .. }) => Err(format!("read_dir on file: {:?}", path)),
            Some(Node::Symlink { target }) => self.read_dir(&target.clone()).await,
            None => Err(format!("read_dir on missing path: {:?}", path)),
        }
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, String> {
        let is_cloud_placeholder = self.placeholders.contains(path) || is_cloud_placeholder_name(path);
        match self.nodes.get(path) {
            Some(Node::Dir { .. }) => Ok(FsMetadata {
                is_dir: true,
                is_file: false,
                is_symlink: false,
                is_cloud_placeholder,
                len: 0,
                modified: None,
                created: None,
            }),
            Some(Node::File { len }) => Ok(FsMetadata {
                is_dir: false,
                is_file: true,
                is_symlink: false,
                is_cloud_placeholder,
                len: *len,
                modified: None,
                created: None,
            }),
            Some(Node::Symlink { target }) => {
                let resolved = self.metadata(&target.clone()).await?;
                Ok(FsMetadata { is_symlink: true, is_cloud_placeholder, ..resolved })
            }
            None => Err(format!("metadata on missing path: {:?}", path)),
        }
    }

    async fn identity(&self, path: &Path) -> Result<IdentityTriple, String> {
        if let Some(identity) = self.identities.get(path).copied() {
            return Ok(identity);
        }
        if let Some(Node::Symlink { target }) = self.nodes.get(path) {
            let target = target.clone();
            return self.identity(&target).await;
        }
        Err(format!("identity on missing path: {:?}", path))
    }
}

struct InMemReadDir {
    queue: VecDeque<PathBuf>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, String> {
        Ok(self.queue.pop_front())
    }
}
