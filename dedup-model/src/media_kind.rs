/// Tagged variant over the kinds of asset the engine handles.
///
/// The detection engine dispatches on this variant rather than through
/// runtime type inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text"))]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "heic" | "heif" | "tif" | "tiff" | "cr2" | "nef" | "arw"
            | "dng" | "raf" | "orf" | "webp" | "gif" | "bmp" => MediaKind::Photo,
            "mp4" | "mov" | "mkv" | "avi" | "webm" | "m4v" | "3gp" | "wmv" => MediaKind::Video,
            "mp3" | "flac" | "wav" | "aac" | "m4a" | "ogg" | "wma" => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Other => "other",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_extensions() {
        assert_eq!(MediaKind::from_extension("JPG"), MediaKind::Photo);
        assert_eq!(MediaKind::from_extension("cr2"), MediaKind::Photo);
        assert_eq!(MediaKind::from_extension("mov"), MediaKind::Video);
        assert_eq!(MediaKind::from_extension("flac"), MediaKind::Audio);
        assert_eq!(MediaKind::from_extension("txt"), MediaKind::Other);
    }
}
