use dedup_model::{File, MediaMetadata};

/// Derived, non-persisted audio signature used only to narrow the
/// candidate space: not a perceptual
/// hash, just the triple a bucket key is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignature {
    pub duration_band: Option<i64>,
    pub size_band: i64,
    pub stem_prefix: String,
}

/// One-percent relative bands for duration and size; falling into the
/// same band is what makes two audio files bucket-adjacent.
fn relative_band(value: f64, fraction: f64) -> i64 {
    if value <= 0.0 {
        return 0;
    }
    let bucket_width = (value * fraction).max(1.0);
    (value / bucket_width).floor() as i64
}

impl AudioSignature {
    pub fn derive(file: &File, metadata: &MediaMetadata) -> Self {
        let duration_band = metadata
            .duration_seconds
            .map(|d| relative_band(d, 0.01));
        let size_band = relative_band(file.size as f64, 0.01);
        let stem_prefix = file
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        Self {
            duration_band,
            size_band,
            stem_prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dedup_model::{IdentityTriple, MediaKind};
    use std::path::PathBuf;

    #[test]
    fn stem_prefix_is_case_insensitive() {
        let now = Utc::now();
        let file = File::discovered(
            PathBuf::from("/music/Track-Intro.mp3"),
            MediaKind::Audio,
            1000,
            now,
            now,
            IdentityTriple {
                volume_id: 1,
                file_id: 1,
                link_count: 1,
            },
        );
        let meta = MediaMetadata::empty(file.id);
        let sig = AudioSignature::derive(&file, &meta);
        assert_eq!(sig.stem_prefix, "track-intro");
    }
}
