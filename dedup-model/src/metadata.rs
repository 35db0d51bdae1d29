use chrono::{DateTime, Utc};

use crate::ids::FileId;

/// GPS coordinate pair, clamped to 1e-6 precision.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsCoordinate {
    pub lat: f64,
    pub lon: f64,
}

impl GpsCoordinate {
    /// Rounds both components to 1e-6 precision. Callers are responsible
    /// for dropping the pair entirely when either component is missing.
    pub fn clamp_precision(lat: f64, lon: f64) -> Self {
        const SCALE: f64 = 1_000_000.0;
        Self {
            lat: (lat * SCALE).round() / SCALE,
            lon: (lon * SCALE).round() / SCALE,
        }
    }
}

/// Which source of capture timestamp was preferred, used for preference
/// ordering and for explaining extraction decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaptureTimeSource {
    ExifDateTimeOriginal,
    CreatedAt,
    ModifiedAt,
}

/// Metadata extracted from a file's container/EXIF without a full pixel
/// decode. Optional 1:1 with [`crate::file::File`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaMetadata {
    pub file_id: FileId,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub capture_time: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub capture_time_source: Option<CaptureTimeSource>,
    pub camera_model: Option<String>,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,
    pub codec_tag: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub keywords: Vec<String>,
    pub content_type_tag: Option<String>,
}

impl MediaMetadata {
    pub fn empty(file_id: FileId) -> Self {
        Self {
            file_id,
            width: None,
            height: None,
            capture_time: None,
            capture_time_source: None,
            camera_model: None,
            gps_lat: None,
            gps_lon: None,
            duration_seconds: None,
            frame_rate: None,
            codec_tag: None,
            keywords: Vec::new(),
            content_type_tag: None,
        }
    }

    pub fn gps(&self) -> Option<GpsCoordinate> {
        match (self.gps_lat, self.gps_lon) {
            (Some(lat), Some(lon)) => Some(GpsCoordinate { lat, lon }),
            _ => None,
        }
    }

    pub fn set_gps(&mut self, coord: Option<GpsCoordinate>) {
        match coord {
            Some(c) => {
                self.gps_lat = Some(c.lat);
                self.gps_lon = Some(c.lon);
            }
            None => {
                self.gps_lat = None;
                self.gps_lon = None;
            }
        }
    }

    /// Re-applies normalization rules: idempotent by construction since it
    /// only fills gaps and never overwrites an already-present value.
    pub fn normalize(
        mut self,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        if self.capture_time.is_none() {
            self.capture_time = Some(created_at);
            self.capture_time_source = Some(CaptureTimeSource::CreatedAt);
            if created_at == modified_at {
                // Nothing extra to distinguish; keep CreatedAt as the source.
            }
        }
        if let Some(coord) = self.gps() {
            self.set_gps(Some(GpsCoordinate::clamp_precision(coord.lat, coord.lon)));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_is_idempotent() {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let modified = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap();
        let mut meta = MediaMetadata::empty(FileId::new());
        meta.gps_lat = Some(51.50732123456);
        meta.gps_lon = Some(-0.12765987654);

        let once = meta.clone().normalize(created, modified);
        let twice = once.clone().normalize(created, modified);
        assert_eq!(once, twice);
    }

    #[test]
    fn gps_clamped_to_microdegree() {
        let coord = GpsCoordinate::clamp_precision(51.1234567, -0.9876543);
        assert_eq!(coord.lat, 51.123457);
        assert_eq!(coord.lon, -0.987654);
    }
}
