use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DedupError, Result};

fn default_dhash_threshold() -> u32 {
    8
}

fn default_phash_threshold() -> u32 {
    10
}

fn default_video_mean_distance_threshold() -> u32 {
    12
}

fn default_name_similarity_threshold() -> f64 {
    0.82
}

fn default_max_comparisons_per_bucket() -> u64 {
    50_000
}

fn default_staged_transaction_ttl_seconds() -> i64 {
    7 * 24 * 3600
}

fn default_confidence_duplicate() -> f64 {
    0.85
}

fn default_confidence_similar() -> f64 {
    0.60
}

fn default_weight_checksum() -> f64 {
    0.40
}

fn default_weight_hash() -> f64 {
    0.30
}

fn default_weight_metadata() -> f64 {
    0.15
}

fn default_weight_name() -> f64 {
    0.10
}

fn default_weight_capture_time() -> f64 {
    0.05
}

fn default_image_distance_threshold() -> u32 {
    5
}

fn default_capture_time_max_seconds() -> f64 {
    120.0
}

fn default_raw_jpeg_bonus() -> f64 {
    0.05
}

fn default_live_photo_bonus() -> f64 {
    0.03
}

fn default_sidecar_bonus() -> f64 {
    0.02
}

fn default_missing_signature_penalty() -> f64 {
    0.10
}

fn default_video_duration_mismatch_penalty() -> f64 {
    0.20
}

fn default_compute_phash() -> bool {
    true
}

/// Thresholds and knobs the detection engine is tuned with. Loaded from TOML; every field has a default so a missing file
/// falls back to sane behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum Hamming distance between two dHash values still considered
    /// a plausible near-duplicate.
    #[serde(default = "default_dhash_threshold")]
    pub dhash_threshold: u32,
    /// Maximum Hamming distance between two pHash values, used only when
    /// the dHash signal is ambiguous.
    #[serde(default = "default_phash_threshold")]
    pub phash_threshold: u32,
    /// Maximum mean per-frame Hamming distance for two videos to be
    /// considered related.
    #[serde(default = "default_video_mean_distance_threshold")]
    pub video_mean_distance_threshold: u32,
    /// Minimum Jaro-Winkler similarity between filename stems for the
    /// name signal to contribute positively.
    #[serde(default = "default_name_similarity_threshold")]
    pub name_similarity_threshold: f64,
    /// Per-bucket comparison cap before a bucket is marked incomplete.
    #[serde(default = "default_max_comparisons_per_bucket")]
    pub max_comparisons_per_bucket: u64,
    /// How long a staged-but-uncommitted merge transaction survives
    /// before `reap_expired_transactions` removes it.
    #[serde(default = "default_staged_transaction_ttl_seconds")]
    pub staged_transaction_ttl_seconds: i64,
    /// Extra exclude globs layered on top of the engine's built-in
    /// default excludes.
    #[serde(default)]
    pub extra_excludes: Vec<String>,

    /// Aggregate score at or above which a pair is labeled `duplicate`.
    #[serde(default = "default_confidence_duplicate")]
    pub confidence_duplicate: f64,
    /// Aggregate score at or above which a pair is labeled
    /// `similar-not-duplicate`.
    #[serde(default = "default_confidence_similar")]
    pub confidence_similar: f64,

    #[serde(default = "default_weight_checksum")]
    pub weight_checksum: f64,
    #[serde(default = "default_weight_hash")]
    pub weight_hash: f64,
    #[serde(default = "default_weight_metadata")]
    pub weight_metadata: f64,
    #[serde(default = "default_weight_name")]
    pub weight_name: f64,
    #[serde(default = "default_weight_capture_time")]
    pub weight_capture_time: f64,

    /// `D` in the hash-signal normalization `1 - min(d, D) / D`.
    #[serde(default = "default_image_distance_threshold")]
    pub image_distance_threshold: u32,
    /// `T_max` in the captureTime signal normalization.
    #[serde(default = "default_capture_time_max_seconds")]
    pub capture_time_max_seconds: f64,

    #[serde(default = "default_raw_jpeg_bonus")]
    pub raw_jpeg_bonus: f64,
    #[serde(default = "default_live_photo_bonus")]
    pub live_photo_bonus: f64,
    #[serde(default = "default_sidecar_bonus")]
    pub sidecar_bonus: f64,

    #[serde(default = "default_missing_signature_penalty")]
    pub missing_signature_penalty: f64,
    #[serde(default = "default_video_duration_mismatch_penalty")]
    pub video_duration_mismatch_penalty: f64,

    /// Whether `hash_image` also computes the optional pHash row, not
    /// just the required dHash.
    #[serde(default = "default_compute_phash")]
    pub compute_phash: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dhash_threshold: default_dhash_threshold(),
            phash_threshold: default_phash_threshold(),
            video_mean_distance_threshold: default_video_mean_distance_threshold(),
            name_similarity_threshold: default_name_similarity_threshold(),
            max_comparisons_per_bucket: default_max_comparisons_per_bucket(),
            staged_transaction_ttl_seconds: default_staged_transaction_ttl_seconds(),
            extra_excludes: Vec::new(),
            confidence_duplicate: default_confidence_duplicate(),
            confidence_similar: default_confidence_similar(),
            weight_checksum: default_weight_checksum(),
            weight_hash: default_weight_hash(),
            weight_metadata: default_weight_metadata(),
            weight_name: default_weight_name(),
            weight_capture_time: default_weight_capture_time(),
            image_distance_threshold: default_image_distance_threshold(),
            capture_time_max_seconds: default_capture_time_max_seconds(),
            raw_jpeg_bonus: default_raw_jpeg_bonus(),
            live_photo_bonus: default_live_photo_bonus(),
            sidecar_bonus: default_sidecar_bonus(),
            missing_signature_penalty: default_missing_signature_penalty(),
            video_duration_mismatch_penalty: default_video_duration_mismatch_penalty(),
            compute_phash: default_compute_phash(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file. Any field the file omits
    /// keeps its default value.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(DedupError::Config)
    }
}
