use chrono::{DateTime, Utc};

use crate::ids::FileId;

/// Which perceptual hash algorithm produced a given [`ImageSignature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text"))]
pub enum ImageHashAlgorithm {
    DHash,
    PHash,
}

impl std::fmt::Display for ImageHashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageHashAlgorithm::DHash => write!(f, "dhash"),
            ImageHashAlgorithm::PHash => write!(f, "phash"),
        }
    }
}

/// A perceptual image hash row, optional 1:1 per (file, algorithm) pair.
///
/// A photo `File` may have both a dHash and a pHash row; dHash is always
/// computed when images are hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ImageSignature {
    pub file_id: FileId,
    pub algorithm: ImageHashAlgorithm,
    pub hash: i64,
    pub width: u32,
    pub height: u32,
    pub computed_at: DateTime<Utc>,
}

impl ImageSignature {
    pub fn hash_u64(&self) -> u64 {
        self.hash as u64
    }
}

/// A video fingerprint: an ordered sequence of frame hashes at sampled
/// times, optional 1:1 with a video `File`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoSignature {
    pub file_id: FileId,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    /// 1:1 with `sample_times`, in the same order.
    pub frame_hashes: Vec<u64>,
    pub sample_times: Vec<f64>,
    pub computed_at: DateTime<Utc>,
}

impl VideoSignature {
    pub fn mean_distance_to(&self, other: &VideoSignature) -> Option<u32> {
        let n = self.frame_hashes.len().min(other.frame_hashes.len());
        if n == 0 {
            return None;
        }
        let total: u32 = self.frame_hashes[..n]
            .iter()
            .zip(other.frame_hashes[..n].iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        Some(total / n as u32)
    }
}

/// Resolution tier used for video bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResolutionTier {
    Sd,
    Hd,
    FullHd,
    QuadHd,
    UltraHd,
}

impl ResolutionTier {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let long_edge = width.max(height);
        if long_edge >= 3840 {
            ResolutionTier::UltraHd
        } else if long_edge >= 2560 {
            ResolutionTier::QuadHd
        } else if long_edge >= 1920 {
            ResolutionTier::FullHd
        } else if long_edge >= 1280 {
            ResolutionTier::Hd
        } else {
            ResolutionTier::Sd
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_distance_uses_shortest_overlap() {
        let base_time = Utc::now();
        let a = VideoSignature {
            file_id: FileId::new(),
            duration_seconds: 10.0,
            width: 1920,
            height: 1080,
            frame_hashes: vec![0, 0, 0],
            sample_times: vec![0.0, 5.0, 9.0],
            computed_at: base_time,
        };
        let b = VideoSignature {
            file_id: FileId::new(),
            duration_seconds: 10.0,
            width: 1920,
            height: 1080,
            frame_hashes: vec![0, 1, 3],
            sample_times: vec![0.0, 5.0, 9.0],
            computed_at: base_time,
        };
        assert_eq!(a.mean_distance_to(&b), Some((0 + 1 + 2) / 3));
    }

    #[test]
    fn resolution_tier_boundaries() {
        assert_eq!(ResolutionTier::from_dimensions(720, 480), ResolutionTier::Sd);
        assert_eq!(ResolutionTier::from_dimensions(1280, 720), ResolutionTier::Hd);
        assert_eq!(ResolutionTier::from_dimensions(1920, 1080), ResolutionTier::FullHd);
        assert_eq!(ResolutionTier::from_dimensions(2560, 1440), ResolutionTier::QuadHd);
        assert_eq!(ResolutionTier::from_dimensions(3840, 2160), ResolutionTier::UltraHd);
    }
}
