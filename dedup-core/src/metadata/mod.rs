pub mod container_meta;
pub mod image_meta;

use dedup_model::{File, MediaKind, MediaMetadata};

use crate::error::Result;

/// Dispatches to the right extractor for a file's media kind and
/// normalizes the result against its filesystem timestamps.
pub fn extract(file: &File) -> Result<MediaMetadata> {
    let raw = match file.media_kind {
        MediaKind::Photo => image_meta::extract_image_metadata(&file.path, file.id)?,
        MediaKind::Video | MediaKind::Audio => {
            container_meta::probe_container(&file.path, file.id)?
        }
        MediaKind::Other => MediaMetadata::empty(file.id),
    };
    Ok(raw.normalize(file.created_at, file.modified_at))
}
