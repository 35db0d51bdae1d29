use async_trait::async_trait;

use dedup_model::{FileId, ImageSignature, MediaMetadata, VideoSignature};

use crate::error::Result;

/// The boundary for metadata extraction and perceptual hashing. Implementations decide whether to batch, parallelize, or cache;
/// callers only see the per-file outcome.
#[async_trait]
pub trait SignatureApi: Send + Sync {
    /// Extracts container/EXIF metadata for a file without a full pixel
    /// decode. Re-runs are idempotent: metadata already present and still
    /// valid is left untouched.
    async fn extract_metadata(&self, file_id: FileId) -> Result<MediaMetadata>;

    /// Computes dHash (and pHash, where configured) for an image file.
    /// dHash is always present in the returned list; pHash is appended
    /// only when the engine is configured to compute it.
    async fn hash_image(&self, file_id: FileId) -> Result<Vec<ImageSignature>>;

    /// Samples frames and computes a [`VideoSignature`] for a video file.
    async fn hash_video(&self, file_id: FileId) -> Result<VideoSignature>;

    /// Computes the file's SHA-256 content checksum, streaming its bytes
    /// rather than loading them whole. Re-runs are idempotent: a checksum
    /// already present and still valid is left untouched.
    async fn compute_checksum(&self, file_id: FileId) -> Result<Vec<u8>>;
}
