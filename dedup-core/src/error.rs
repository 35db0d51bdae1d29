use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DedupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("exif decode error: {0}")]
    Exif(#[from] exif::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("trash backend error: {0}")]
    Trash(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("scan root is not accessible: {0}")]
    InaccessibleRoot(String),

    #[error("transaction {0} is not in a committed state")]
    TransactionNotCommitted(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DedupError>;

impl From<DedupError> for dedup_contracts::error::ContractError {
    fn from(err: DedupError) -> Self {
        match err {
            DedupError::NotFound(what) => dedup_contracts::error::ContractError::NotFound(what),
            DedupError::Cancelled => dedup_contracts::error::ContractError::Cancelled,
            other => dedup_contracts::error::ContractError::Backend(other.to_string()),
        }
    }
}

/// Shortens a path for error messages and logs, keeping only the last
/// `components` path segments so logs stay readable for deeply nested
/// library trees.
pub fn shorten_path(path: &Path, components: usize) -> String {
    let parts: Vec<_> = path.components().collect();
    if parts.len() <= components {
        return path.display().to_string();
    }
    let tail: std::path::PathBuf = parts[parts.len() - components..].iter().collect();
    format!(".../{}", tail.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn shortens_long_paths_but_keeps_short_ones_intact() {
        let long = PathBuf::from("/a/b/c/d/e/f.jpg");
        assert_eq!(shorten_path(&long, 2), ".../e/f.jpg");

        let short = PathBuf::from("/a/b.jpg");
        assert_eq!(shorten_path(&short, 4), "/a/b.jpg");
    }
}
