//! Policy collapse: RAW+JPEG linking, Live Photo bundling,
//! and XMP sidecar attachment. Each toggle is read once per `buildGroups`
//! call and contributes an extra edge plus a confidence bonus on top of
//! whatever the base signal score found.

use chrono::{DateTime, Utc};

use dedup_model::File;

const RAW_EXTENSIONS: &[&str] = &["cr2", "nef", "arw", "dng", "raf", "orf"];
const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
const LIVE_PHOTO_STILL_EXTENSIONS: &[&str] = &["heic", "heif", "jpg", "jpeg"];
const LIVE_PHOTO_VIDEO_EXTENSIONS: &[&str] = &["mov"];

/// Which policy toggles are active for a `buildGroups` call; changing any
/// of these mid-pass invalidates partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyToggles {
    pub raw_jpeg_link: bool,
    pub live_photo_bundle: bool,
    pub sidecar_link: bool,
}

impl Default for PolicyToggles {
    fn default() -> Self {
        Self {
            raw_jpeg_link: true,
            live_photo_bundle: true,
            sidecar_link: true,
        }
    }
}

/// Which collapse rule linked a pair, and the bonus it contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyLink {
    RawJpeg,
    LivePhoto,
    Sidecar,
}

impl PolicyLink {
    pub fn tag(self) -> &'static str {
        match self {
            PolicyLink::RawJpeg => "raw_jpeg",
            PolicyLink::LivePhoto => "live_photo",
            PolicyLink::Sidecar => "sidecar",
        }
    }
}

fn extension_of(file: &File) -> String {
    file.path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn stem_of(file: &File) -> String {
    file.path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn same_second(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp() == b.timestamp()
}

fn within(a: DateTime<Utc>, b: DateTime<Utc>, seconds: i64) -> bool {
    (a - b).num_milliseconds().unsigned_abs() <= (seconds * 1000) as u64
}

/// Evaluates every enabled toggle for a pair, returning the first match
/// (a pair can only be linked by one collapse rule at a time).
pub fn evaluate(
    a: &File,
    a_capture: Option<DateTime<Utc>>,
    b: &File,
    b_capture: Option<DateTime<Utc>>,
    toggles: PolicyToggles,
) -> Option<PolicyLink> {
    if toggles.raw_jpeg_link {
        if let Some(link) = raw_jpeg_link(a, a_capture, b, b_capture) {
            return Some(link);
        }
    }
    if toggles.live_photo_bundle {
        if let Some(link) = live_photo_link(a, a_capture, b, b_capture) {
            return Some(link);
        }
    }
    if toggles.sidecar_link {
        if let Some(link) = sidecar_link(a, b) {
            return Some(link);
        }
    }
    None
}

fn raw_jpeg_link(
    a: &File,
    a_capture: Option<DateTime<Utc>>,
    b: &File,
    b_capture: Option<DateTime<Utc>>,
) -> Option<PolicyLink> {
    let (ext_a, ext_b) = (extension_of(a), extension_of(b));
    if stem_of(a) != stem_of(b) {
        return None;
    }
    let is_raw_jpeg_pair = (RAW_EXTENSIONS.contains(&ext_a.as_str()) && JPEG_EXTENSIONS.contains(&ext_b.as_str()))
        || (RAW_EXTENSIONS.contains(&ext_b.as_str()) && JPEG_EXTENSIONS.contains(&ext_a.as_str()));
    if !is_raw_jpeg_pair {
        return None;
    }
    match (a_capture, b_capture) {
        (Some(ta), Some(tb)) if same_second(ta, tb) => Some(PolicyLink::RawJpeg),
        _ => None,
    }
}

fn live_photo_link(
    a: &File,
    a_capture: Option<DateTime<Utc>>,
    b: &File,
    b_capture: Option<DateTime<Utc>>,
) -> Option<PolicyLink> {
    if stem_of(a) != stem_of(b) {
        return None;
    }
    let (ext_a, ext_b) = (extension_of(a), extension_of(b));
    let is_still_video_pair = (LIVE_PHOTO_STILL_EXTENSIONS.contains(&ext_a.as_str())
        && LIVE_PHOTO_VIDEO_EXTENSIONS.contains(&ext_b.as_str()))
        || (LIVE_PHOTO_STILL_EXTENSIONS.contains(&ext_b.as_str())
            && LIVE_PHOTO_VIDEO_EXTENSIONS.contains(&ext_a.as_str()));
    if !is_still_video_pair {
        return None;
    }
    match (a_capture, b_capture) {
        (Some(ta), Some(tb)) if within(ta, tb, 1) => Some(PolicyLink::LivePhoto),
        _ => None,
    }
}

fn sidecar_link(a: &File, b: &File) -> Option<PolicyLink> {
    if stem_of(a) != stem_of(b) {
        return None;
    }
    let (ext_a, ext_b) = (extension_of(a), extension_of(b));
    if ext_a == "xmp" || ext_b == "xmp" {
        Some(PolicyLink::Sidecar)
    } else {
        None
    }
}

/// The confidence bonus a [`PolicyLink`] contributes.
pub fn bonus_for(link: PolicyLink, cfg: &crate::config::EngineConfig) -> f64 {
    match link {
        PolicyLink::RawJpeg => cfg.raw_jpeg_bonus,
        PolicyLink::LivePhoto => cfg.live_photo_bonus,
        PolicyLink::Sidecar => cfg.sidecar_bonus,
    }
}
