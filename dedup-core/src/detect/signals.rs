//! Per-pair signal scoring: checksum, hash, metadata, name,
//! and captureTime signals combined into a weighted aggregate confidence.

use dedup_model::{File, GroupMember, ImageSignature, MediaMetadata, Penalty, SignalContribution, VideoSignature};

use crate::config::EngineConfig;

/// Everything the scoring pipeline needs about one candidate file, bundled
/// so `score_pair` never has to reach back into the store mid-comparison.
#[derive(Debug, Clone)]
pub struct PairContext<'a> {
    pub file: &'a File,
    pub metadata: Option<&'a MediaMetadata>,
    pub image_signatures: &'a [ImageSignature],
    pub video_signature: Option<&'a VideoSignature>,
}

impl<'a> PairContext<'a> {
    pub fn dhash(&self) -> Option<u64> {
        self.image_signatures
            .iter()
            .find(|s| matches!(s.algorithm, dedup_model::ImageHashAlgorithm::DHash))
            .map(|s| s.hash_u64())
    }
}

/// Full evidence and aggregate score for one compared pair.
#[derive(Debug, Clone)]
pub struct PairScore {
    pub contributions: Vec<SignalContribution>,
    pub penalties: Vec<Penalty>,
    pub aggregate: f64,
}

impl PairScore {
    fn push(&mut self, key: &str, weight: f64, raw: f64, rationale: impl Into<String>) {
        self.contributions.push(SignalContribution {
            key: key.to_string(),
            weight,
            raw_score: raw,
            contribution: weight * raw,
            rationale: rationale.into(),
        });
    }

    fn penalize(&mut self, key: &str, amount: f64, rationale: impl Into<String>) {
        self.penalties.push(Penalty {
            key: key.to_string(),
            amount,
            rationale: rationale.into(),
        });
    }

    fn finalize(mut self) -> Self {
        let weighted: f64 = self.contributions.iter().map(|c| c.contribution).sum();
        let penalized: f64 = self.penalties.iter().map(|p| p.amount).sum();
        self.aggregate = (weighted - penalized).clamp(0.0, 1.0);
        self
    }
}

/// Scores one candidate pair against the weighted-signal model: checksum,
/// hash distance, metadata similarity, name similarity, capture-time
/// closeness. Does not apply policy-collapse bonuses; callers add those
/// separately once a base score is known.
pub fn score_pair(a: &PairContext, b: &PairContext, cfg: &EngineConfig) -> PairScore {
    let mut score = PairScore {
        contributions: Vec::new(),
        penalties: Vec::new(),
        aggregate: 0.0,
    };

    score_checksum(a, b, cfg, &mut score);
    score_hash(a, b, cfg, &mut score);
    score_metadata(a, b, cfg, &mut score);
    score_name(a, b, cfg, &mut score);
    score_capture_time(a, b, cfg, &mut score);
    apply_penalties(a, b, cfg, &mut score);

    score.finalize()
}

fn score_checksum(a: &PairContext, b: &PairContext, cfg: &EngineConfig, score: &mut PairScore) {
    let equal = match (&a.file.checksum, &b.file.checksum) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    };
    let raw = if equal { 1.0 } else { 0.0 };
    score.push(
        "checksum",
        cfg.weight_checksum,
        raw,
        if equal { "sha-256 match" } else { "sha-256 differs or unknown" },
    );
}

fn score_hash(a: &PairContext, b: &PairContext, cfg: &EngineConfig, score: &mut PairScore) {
    let (raw, rationale) = match (a.file.media_kind, a.dhash(), b.dhash()) {
        (dedup_model::MediaKind::Photo, Some(ha), Some(hb)) => {
            let d = crate::hashing::hamming::distance(ha, hb) as f64;
            let normalized = 1.0 - (d.min(cfg.image_distance_threshold as f64) / cfg.image_distance_threshold as f64);
            (normalized, format!("dHash distance {d}"))
        }
        _ => match (a.video_signature, b.video_signature) {
            (Some(va), Some(vb)) => match va.mean_distance_to(vb) {
                Some(d) => {
                    let d = d as f64;
                    let threshold = cfg.video_mean_distance_threshold as f64;
                    (1.0 - (d.min(threshold) / threshold), format!("mean frame distance {d}"))
                }
                None => (0.0, "no overlapping frame samples".to_string()),
            },
            _ => (0.0, "no comparable signature".to_string()),
        },
    };
    score.push("hash", cfg.weight_hash, raw.max(0.0), rationale);
}

fn score_metadata(a: &PairContext, b: &PairContext, cfg: &EngineConfig, score: &mut PairScore) {
    let ma = a.metadata;
    let mb = b.metadata;

    let dims = match (ma.and_then(|m| m.width.zip(m.height)), mb.and_then(|m| m.width.zip(m.height))) {
        (Some((wa, ha)), Some((wb, hb))) if wa == wb && ha == hb => 1.0,
        (Some((wa, ha)), Some((wb, hb))) => {
            let ratio_w = (wa as f64 - wb as f64).abs() / wa.max(wb) as f64;
            let ratio_h = (ha as f64 - hb as f64).abs() / ha.max(hb) as f64;
            if ratio_w <= 0.05 && ratio_h <= 0.05 {
                0.6
            } else {
                0.0
            }
        }
        _ => 0.5,
    };

    let capture = match (ma.and_then(|m| m.capture_time), mb.and_then(|m| m.capture_time)) {
        (Some(ta), Some(tb)) => {
            let delta = (ta - tb).num_seconds().unsigned_abs();
            if delta <= 30 {
                1.0
            } else if delta <= 120 {
                0.6
            } else {
                0.0
            }
        }
        _ => 0.5,
    };

    let gps = match (ma.and_then(|m| m.gps()), mb.and_then(|m| m.gps())) {
        (Some(ga), Some(gb)) => {
            let meters = haversine_meters(ga.lat, ga.lon, gb.lat, gb.lon);
            if meters <= 5.0 {
                1.0
            } else if meters <= 50.0 {
                0.6
            } else {
                0.0
            }
        }
        _ => 0.5,
    };

    let camera = match (ma.and_then(|m| m.camera_model.as_deref()), mb.and_then(|m| m.camera_model.as_deref())) {
        (Some(x), Some(y)) if x == y => 1.0,
        (Some(_), Some(_)) => 0.0,
        _ => 0.5,
    };

    let raw = (dims + capture + gps + camera) / 4.0;
    score.push(
        "metadata",
        cfg.weight_metadata,
        raw,
        format!("dims={dims:.2} capture={capture:.2} gps={gps:.2} camera={camera:.2}"),
    );
}

fn score_name(a: &PairContext, b: &PairContext, cfg: &EngineConfig, score: &mut PairScore) {
    let stem_a = stem_of(a.file);
    let stem_b = stem_of(b.file);
    let raw = strsim::jaro_winkler(&stem_a, &stem_b);
    score.push("name", cfg.weight_name, raw, format!("jaro-winkler({stem_a:?}, {stem_b:?})"));
}

fn score_capture_time(a: &PairContext, b: &PairContext, cfg: &EngineConfig, score: &mut PairScore) {
    let raw = match (a.metadata.and_then(|m| m.capture_time), b.metadata.and_then(|m| m.capture_time)) {
        (Some(ta), Some(tb)) => {
            let delta = (ta - tb).num_milliseconds().unsigned_abs() as f64 / 1000.0;
            (1.0 - delta / cfg.capture_time_max_seconds).max(0.0)
        }
        _ => 0.0,
    };
    score.push("captureTime", cfg.weight_capture_time, raw, "1 - |dt| / T_max".to_string());
}

fn apply_penalties(a: &PairContext, b: &PairContext, cfg: &EngineConfig, score: &mut PairScore) {
    let missing_signature = match a.file.media_kind {
        dedup_model::MediaKind::Photo => a.dhash().is_none() || b.dhash().is_none(),
        dedup_model::MediaKind::Video => {
            a.video_signature.map(|v| v.frame_hashes.is_empty()).unwrap_or(true)
                || b.video_signature.map(|v| v.frame_hashes.is_empty()).unwrap_or(true)
        }
        _ => false,
    };
    if missing_signature {
        score.penalize("missing_signature", cfg.missing_signature_penalty, "dHash or frame hashes absent");
    }

    if a.file.media_kind == dedup_model::MediaKind::Video {
        if let (Some(va), Some(vb)) = (a.video_signature, b.video_signature) {
            let delta = (va.duration_seconds - vb.duration_seconds).abs();
            let tolerance = (va.duration_seconds.max(vb.duration_seconds) * 0.02).max(2.0);
            if delta > tolerance {
                score.penalize(
                    "duration_mismatch",
                    cfg.video_duration_mismatch_penalty,
                    format!("duration delta {delta:.2}s exceeds tolerance {tolerance:.2}s"),
                );
            }
        }
    }
}

fn stem_of(file: &File) -> String {
    file.path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Great-circle distance in meters, used for the GPS metadata sub-signal.
fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().clamp(-1.0, 1.0).asin();
    EARTH_RADIUS_M * c
}

/// Classifies an aggregate score against the configured confidence
/// thresholds.
pub fn classify(aggregate: f64, cfg: &EngineConfig) -> Option<dedup_model::ConfidenceLabel> {
    if aggregate >= cfg.confidence_duplicate {
        Some(dedup_model::ConfidenceLabel::Duplicate)
    } else if aggregate >= cfg.confidence_similar {
        Some(dedup_model::ConfidenceLabel::SimilarNotDuplicate)
    } else {
        None
    }
}

/// Builds the persisted [`GroupMember`] row for one side of a scored pair.
pub fn member_from_score(
    group_id: dedup_model::GroupId,
    file_id: dedup_model::FileId,
    hamming_distance: Option<u32>,
    name_similarity: Option<f64>,
    score: &PairScore,
) -> GroupMember {
    let mut member = GroupMember::new(group_id, file_id);
    member.hamming_distance_to_keeper = hamming_distance;
    member.name_similarity_to_keeper = name_similarity;
    member.signal_contributions = score.contributions.clone();
    member.penalties = score.penalties.clone();
    member
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dedup_model::{IdentityTriple, MediaKind};
    use std::path::PathBuf;

    fn file(name: &str, checksum: Option<Vec<u8>>) -> File {
        let now = Utc::now();
        let mut f = File::discovered(
            PathBuf::from(format!("/lib/{name}")),
            MediaKind::Photo,
            1000,
            now,
            now,
            IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
        );
        f.checksum = checksum;
        f
    }

    #[test]
    fn identical_checksums_score_checksum_signal_at_full_weight() {
        let cfg = EngineConfig::default();
        let a = file("a.jpg", Some(vec![1, 2, 3]));
        let b = file("b.jpg", Some(vec![1, 2, 3]));
        let ctx_a = PairContext { file: &a, metadata: None, image_signatures: &[], video_signature: None };
        let ctx_b = PairContext { file: &b, metadata: None, image_signatures: &[], video_signature: None };
        let score = score_pair(&ctx_a, &ctx_b, &cfg);
        let checksum_contribution = score.contributions.iter().find(|c| c.key == "checksum").unwrap();
        assert_eq!(checksum_contribution.raw_score, 1.0);
    }

    #[test]
    fn missing_dhash_applies_penalty() {
        let cfg = EngineConfig::default();
        let a = file("a.jpg", None);
        let b = file("b.jpg", None);
        let ctx_a = PairContext { file: &a, metadata: None, image_signatures: &[], video_signature: None };
        let ctx_b = PairContext { file: &b, metadata: None, image_signatures: &[], video_signature: None };
        let score = score_pair(&ctx_a, &ctx_b, &cfg);
        assert!(score.penalties.iter().any(|p| p.key == "missing_signature"));
    }

    #[test]
    fn classify_respects_thresholds() {
        let cfg = EngineConfig::default();
        assert_eq!(classify(0.9, &cfg), Some(dedup_model::ConfidenceLabel::Duplicate));
        assert_eq!(classify(0.7, &cfg), Some(dedup_model::ConfidenceLabel::SimilarNotDuplicate));
        assert_eq!(classify(0.1, &cfg), None);
    }

    #[test]
    fn haversine_of_identical_points_is_zero() {
        assert_eq!(haversine_meters(37.7749, -122.4194, 37.7749, -122.4194), 0.0);
    }

    #[test]
    fn haversine_one_degree_of_latitude_is_about_111_km() {
        let meters = haversine_meters(0.0, 0.0, 1.0, 0.0);
        assert!((meters - 111_195.0).abs() < 1_000.0, "got {meters}");
    }

    #[test]
    fn haversine_handles_antipodal_points_without_nan() {
        let meters = haversine_meters(10.0, 20.0, -10.0, -160.0);
        assert!(meters.is_finite());
    }
}
