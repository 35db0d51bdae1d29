use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::Result;

const CHUNK_SIZE: usize = 64 * 1024;

/// Streams the file's content through SHA-256 in fixed-size chunks rather
/// than reading it whole, so a multi-gigabyte video doesn't have to be
/// resident in memory just to be checksummed.
pub async fn sha256_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_content_hashes_equal() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        tokio::fs::write(&a, b"the quick brown fox").await.unwrap();
        tokio::fs::write(&b, b"the quick brown fox").await.unwrap();

        let ha = sha256_file(&a).await.unwrap();
        let hb = sha256_file(&b).await.unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha.len(), 32);
    }

    #[tokio::test]
    async fn different_content_hashes_differ() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        tokio::fs::write(&a, b"one").await.unwrap();
        tokio::fs::write(&b, b"two").await.unwrap();

        let ha = sha256_file(&a).await.unwrap();
        let hb = sha256_file(&b).await.unwrap();
        assert_ne!(ha, hb);
    }

    #[tokio::test]
    async fn content_spanning_multiple_chunks_still_hashes_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content = vec![0x5au8; CHUNK_SIZE * 3 + 17];
        tokio::fs::write(&path, &content).await.unwrap();

        let streamed = sha256_file(&path).await.unwrap();

        let mut hasher = Sha256::new();
        hasher.update(&content);
        let whole = hasher.finalize().to_vec();

        assert_eq!(streamed, whole);
    }
}
