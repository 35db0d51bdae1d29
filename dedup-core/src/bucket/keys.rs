use dedup_model::{File, MediaKind, MediaMetadata, ResolutionTier};

use crate::hashing::audio_sig::AudioSignature;

const SIZE_BAND_FRACTION: f64 = 0.01;
const DURATION_BAND_FRACTION_VIDEO: f64 = 0.02;
const DIMENSION_SNAP_PX: u32 = 16;

fn size_band(size: u64) -> i64 {
    if size == 0 {
        return 0;
    }
    let width = ((size as f64) * SIZE_BAND_FRACTION).max(1.0);
    (size as f64 / width).floor() as i64
}

fn duration_band(duration_seconds: f64, fraction: f64) -> i64 {
    if duration_seconds <= 0.0 {
        return 0;
    }
    let width = (duration_seconds * fraction).max(0.1);
    (duration_seconds / width).floor() as i64
}

fn snap_dimension(value: u32) -> u32 {
    (value / DIMENSION_SNAP_PX) * DIMENSION_SNAP_PX
}

fn stem_prefix(file: &File, alnum_chars: usize) -> String {
    file.path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(alnum_chars)
        .collect::<String>()
        .to_lowercase()
}

/// Builds the composite bucket key for a file, per media kind. Returns
/// `None` for media kinds that are never bucketed (`MediaKind::Other`).
pub fn bucket_key(file: &File, metadata: Option<&MediaMetadata>) -> Option<(String, String)> {
    match file.media_kind {
        MediaKind::Photo => {
            let (w, h) = metadata
                .map(|m| (m.width.unwrap_or(0), m.height.unwrap_or(0)))
                .unwrap_or((0, 0));
            let key = format!(
                "photo:{}:{}x{}:{}",
                size_band(file.size),
                snap_dimension(w),
                snap_dimension(h),
                stem_prefix(file, 4),
            );
            Some((key, "photo-size-dims-stem".to_string()))
        }
        MediaKind::Video => {
            let duration = metadata.and_then(|m| m.duration_seconds).unwrap_or(0.0);
            let tier = metadata
                .map(|m| ResolutionTier::from_dimensions(m.width.unwrap_or(0), m.height.unwrap_or(0)))
                .unwrap_or(ResolutionTier::Sd);
            let key = format!(
                "video:{}:{:?}",
                duration_band(duration, DURATION_BAND_FRACTION_VIDEO),
                tier
            );
            Some((key, "video-duration-resolution".to_string()))
        }
        MediaKind::Audio => {
            let meta = metadata.cloned().unwrap_or_else(|| MediaMetadata::empty(file.id));
            let sig = AudioSignature::derive(file, &meta);
            let key = format!(
                "audio:{}:{}:{}",
                sig.duration_band.unwrap_or(0),
                sig.size_band,
                sig.stem_prefix
            );
            Some((key, "audio-duration-size-stem".to_string()))
        }
        MediaKind::Other => None,
    }
}

/// The cross-kind exact-checksum bucket key, used once a `File`'s SHA-256
/// has been computed.
pub fn checksum_bucket_key(checksum: &[u8]) -> String {
    format!("checksum:{}", hex_encode(checksum))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dedup_model::IdentityTriple;
    use std::path::PathBuf;

    fn make_file(kind: MediaKind, name: &str, size: u64) -> File {
        let now = Utc::now();
        File::discovered(
            PathBuf::from(format!("/lib/{name}")),
            kind,
            size,
            now,
            now,
            IdentityTriple {
                volume_id: 1,
                file_id: 1,
                link_count: 1,
            },
        )
    }

    #[test]
    fn photo_key_ignores_non_alnum_in_stem() {
        let file = make_file(MediaKind::Photo, "IMG_0231 (1).jpg", 1_000_000);
        let (key, _) = bucket_key(&file, None).unwrap();
        assert!(key.ends_with(":img0"));
    }

    #[test]
    fn other_media_has_no_bucket_key() {
        let file = make_file(MediaKind::Other, "notes.txt", 10);
        assert!(bucket_key(&file, None).is_none());
    }
}
