pub mod audio_sig;
pub mod checksum;
pub mod hamming;
pub mod image_hash;
pub mod video_hash;

use chrono::Utc;

use dedup_model::{FileId, ImageHashAlgorithm, ImageSignature};

use crate::error::Result;

/// Computes dHash unconditionally and pHash only when `with_phash` is
/// set, returning both rows ready to persist.
pub fn hash_image(
    path: &std::path::Path,
    file_id: FileId,
    width: u32,
    height: u32,
    with_phash: bool,
) -> Result<Vec<ImageSignature>> {
    let mut out = Vec::with_capacity(2);
    let dhash = image_hash::dhash(path)?;
    out.push(ImageSignature {
        file_id,
        algorithm: ImageHashAlgorithm::DHash,
        hash: dhash as i64,
        width,
        height,
        computed_at: Utc::now(),
    });

    if with_phash {
        let phash = image_hash::phash(path)?;
        out.push(ImageSignature {
            file_id,
            algorithm: ImageHashAlgorithm::PHash,
            hash: phash as i64,
            width,
            height,
            computed_at: Utc::now(),
        });
    }

    Ok(out)
}
