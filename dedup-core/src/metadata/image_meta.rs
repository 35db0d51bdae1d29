use std::fs::File as StdFile;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use exif::{In, Tag, Value};

use dedup_model::{GpsCoordinate, MediaMetadata};

use crate::error::{DedupError, Result};

/// Extracts EXIF fields and pixel dimensions for a photo without a full
/// pixel decode where EXIF alone is sufficient. Falls back to
/// [`image::image_dimensions`] when no EXIF-reported size is present.
pub fn extract_image_metadata(path: &Path, file_id: dedup_model::FileId) -> Result<MediaMetadata> {
    let mut meta = MediaMetadata::empty(file_id);

    match read_exif(path) {
        Ok(Some(exif)) => {
            meta.capture_time = exif_datetime(&exif, Tag::DateTimeOriginal);
            meta.camera_model = exif_string(&exif, Tag::Model);
            meta.content_type_tag = exif_string(&exif, Tag::Make);
            if let Some(coord) = exif_gps(&exif) {
                meta.gps_lat = Some(coord.lat);
                meta.gps_lon = Some(coord.lon);
            }
            if let Some(w) = exif_uint(&exif, Tag::PixelXDimension) {
                meta.width = Some(w);
            }
            if let Some(h) = exif_uint(&exif, Tag::PixelYDimension) {
                meta.height = Some(h);
            }
        }
        Ok(None) => {}
        Err(DedupError::Exif(_)) => {
            // Many valid images simply carry no EXIF segment; that is not
            // an extraction failure.
        }
        Err(other) => return Err(other),
    }

    if meta.width.is_none() || meta.height.is_none() {
        if let Ok((w, h)) = image::image_dimensions(path) {
            meta.width = Some(w);
            meta.height = Some(h);
        }
    }

    Ok(meta)
}

fn read_exif(path: &Path) -> Result<Option<exif::Exif>> {
    let file = StdFile::open(path)?;
    let mut reader = BufReader::new(&file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(DedupError::Exif(e)),
    }
}

fn exif_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .map(|f| f.display_value().to_string().trim().to_string())
}

fn exif_uint(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
}

fn exif_datetime(exif: &exif::Exif, tag: Tag) -> Option<DateTime<Utc>> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let text = field.display_value().to_string();
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn exif_gps(exif: &exif::Exif) -> Option<GpsCoordinate> {
    let lat = gps_component(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S")?;
    let lon = gps_component(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W")?;
    Some(GpsCoordinate::clamp_precision(lat, lon))
}

fn gps_component(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(ref rationals) = field.value else {
        return None;
    };
    let degrees = rationals.first()?.to_f64();
    let minutes = rationals.get(1)?.to_f64();
    let seconds = rationals.get(2)?.to_f64();
    let mut decimal = degrees + minutes / 60.0 + seconds / 3600.0;

    if let Some(reference) = exif.get_field(ref_tag, In::PRIMARY) {
        if reference.display_value().to_string().trim() == negative_ref {
            decimal = -decimal;
        }
    }
    Some(decimal)
}
