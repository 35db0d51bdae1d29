//! Keeper selection and field union. Pure functions over
//! already-fetched data; no I/O, no side effects — the executor is what
//! actually touches the filesystem.

use std::cmp::Ordering;

use dedup_model::{FieldChange, File, FileId, MediaMetadata};

/// Raw material the planner needs for one candidate file in a group.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub file: File,
    pub metadata: Option<MediaMetadata>,
}

impl Candidate {
    fn pixel_count(&self) -> Option<u64> {
        let meta = self.metadata.as_ref()?;
        Some(meta.width? as u64 * meta.height? as u64)
    }

    fn bitrate_estimate(&self) -> Option<f64> {
        let duration = self.metadata.as_ref()?.duration_seconds?;
        if duration <= 0.0 {
            return None;
        }
        Some(self.file.size as f64 * 8.0 / duration)
    }

    fn format_rank(&self) -> u8 {
        let ext = self
            .file
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match self.file.media_kind {
            dedup_model::MediaKind::Audio => match ext.as_str() {
                "flac" | "wav" | "alac" => 2,
                "aac" | "m4a" | "ogg" => 1,
                _ => 0,
            },
            _ => match ext.as_str() {
                "cr2" | "nef" | "arw" | "dng" | "raf" | "orf" => 4,
                "heic" | "heif" => 3,
                "png" => 2,
                "jpg" | "jpeg" => 1,
                _ => 0,
            },
        }
    }

    fn metadata_richness(&self) -> u32 {
        let Some(meta) = &self.metadata else { return 0 };
        let mut score = 0;
        if meta.gps().is_some() {
            score += 1;
        }
        score += meta.keywords.len() as u32;
        if meta.camera_model.is_some() {
            score += 1;
        }
        score
    }
}

/// Applies the keeper-selection precedence in order: the first
/// decisive rule wins. `Ordering::Greater` means `a` is the better keeper.
fn compare_candidates(a: &Candidate, b: &Candidate, user_override: Option<FileId>) -> Ordering {
    if let Some(preferred) = user_override {
        if a.file.id == preferred {
            return Ordering::Greater;
        }
        if b.file.id == preferred {
            return Ordering::Less;
        }
    }

    if let (Some(pa), Some(pb)) = (a.pixel_count(), b.pixel_count()) {
        if pa != pb {
            return pa.cmp(&pb);
        }
    }
    if let (Some(ba), Some(bb)) = (a.bitrate_estimate(), b.bitrate_estimate()) {
        if let Some(ord) = ba.partial_cmp(&bb) {
            if ord != Ordering::Equal {
                return ord;
            }
        }
    }

    if a.file.size != b.file.size {
        return a.file.size.cmp(&b.file.size);
    }

    if a.format_rank() != b.format_rank() {
        return a.format_rank().cmp(&b.format_rank());
    }

    match (a.metadata.as_ref().and_then(|m| m.capture_time), b.metadata.as_ref().and_then(|m| m.capture_time)) {
        (Some(ta), Some(tb)) if ta != tb => return tb.cmp(&ta), // earlier wins => reverse chronological compare
        _ => {}
    }

    if a.metadata_richness() != b.metadata_richness() {
        return a.metadata_richness().cmp(&b.metadata_richness());
    }

    // Final tiebreak: lexicographically *smaller* path wins, so reverse
    // the natural path ordering to keep "Greater = better keeper".
    b.file.path.cmp(&a.file.path)
}

/// Picks the keeper from a group's candidates using the ordered
/// precedence rules, returning the winner and a short rationale string.
pub fn select_keeper(candidates: &[Candidate], user_override: Option<FileId>) -> (FileId, String) {
    let winner = candidates
        .iter()
        .max_by(|a, b| compare_candidates(a, b, user_override))
        .expect("select_keeper requires at least one candidate");

    let rationale = if Some(winner.file.id) == user_override {
        "user override".to_string()
    } else {
        "highest pixel count / size / format rank / earliest capture / richest metadata / lexicographically smallest path".to_string()
    };
    (winner.file.id, rationale)
}

/// Builds the field-union list for a keeper against its discard
/// candidates, in keeper-selection order: the keeper's own
/// value wins where present; missing fields are filled from the first
/// discard candidate that has them. Keywords are unioned, not replaced.
pub fn union_fields(keeper: &Candidate, discards_in_rank_order: &[Candidate]) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let keeper_meta = keeper.metadata.clone().unwrap_or_else(|| MediaMetadata::empty(keeper.file.id));

    macro_rules! fill_scalar {
        ($field:ident, $name:expr) => {
            if keeper_meta.$field.is_none() {
                for candidate in discards_in_rank_order {
                    if let Some(value) = candidate.metadata.as_ref().and_then(|m| m.$field.clone()) {
                        changes.push(FieldChange {
                            field: $name.to_string(),
                            from_file_id: candidate.file.id,
                            previous_value: None,
                            new_value: value,
                        });
                        break;
                    }
                }
            }
        };
    }

    fill_scalar!(camera_model, "camera_model");
    fill_scalar!(codec_tag, "codec_tag");
    fill_scalar!(content_type_tag, "content_type_tag");

    if keeper_meta.width.is_none() || keeper_meta.height.is_none() {
        for candidate in discards_in_rank_order {
            if let Some(meta) = &candidate.metadata {
                if let (Some(w), Some(h)) = (meta.width, meta.height) {
                    changes.push(FieldChange {
                        field: "dimensions".to_string(),
                        from_file_id: candidate.file.id,
                        previous_value: None,
                        new_value: format!("{w}x{h}"),
                    });
                    break;
                }
            }
        }
    }

    // GPS: keeper keeps its own value; otherwise take the most precise
    // (first-present) source in rank order.
    if keeper_meta.gps().is_none() {
        for candidate in discards_in_rank_order {
            if let Some(meta) = &candidate.metadata {
                if let Some(gps) = meta.gps() {
                    changes.push(FieldChange {
                        field: "gps".to_string(),
                        from_file_id: candidate.file.id,
                        previous_value: None,
                        new_value: format!("{},{}", gps.lat, gps.lon),
                    });
                    break;
                }
            }
        }
    }

    // Capture date never overwrites a present keeper date.
    if keeper_meta.capture_time.is_none() {
        for candidate in discards_in_rank_order {
            if let Some(t) = candidate.metadata.as_ref().and_then(|m| m.capture_time) {
                changes.push(FieldChange {
                    field: "capture_time".to_string(),
                    from_file_id: candidate.file.id,
                    previous_value: None,
                    new_value: t.to_rfc3339(),
                });
                break;
            }
        }
    }

    // Keywords union across every discard candidate, not just the first.
    let mut keyword_union: Vec<String> = keeper_meta.keywords.clone();
    for candidate in discards_in_rank_order {
        if let Some(meta) = &candidate.metadata {
            for kw in &meta.keywords {
                if !keyword_union.contains(kw) {
                    keyword_union.push(kw.clone());
                    changes.push(FieldChange {
                        field: "keywords".to_string(),
                        from_file_id: candidate.file.id,
                        previous_value: None,
                        new_value: kw.clone(),
                    });
                }
            }
        }
    }

    changes
}

/// Orders discard candidates by the same precedence keeper selection
/// uses, so field union always consults the "next best" source first.
pub fn rank_discards(discards: &mut [Candidate]) {
    discards.sort_by(|a, b| compare_candidates(b, a, None));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dedup_model::{IdentityTriple, MediaKind};
    use std::path::PathBuf;

    fn candidate(name: &str, size: u64, width: Option<u32>, height: Option<u32>) -> Candidate {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let file = File::discovered(
            PathBuf::from(format!("/lib/{name}")),
            MediaKind::Photo,
            size,
            now,
            now,
            IdentityTriple { volume_id: 1, file_id: 1, link_count: 1 },
        );
        let mut meta = MediaMetadata::empty(file.id);
        meta.width = width;
        meta.height = height;
        Candidate { file, metadata: Some(meta) }
    }

    #[test]
    fn higher_pixel_count_wins() {
        let small = candidate("a.jpg", 1000, Some(100), Some(100));
        let large = candidate("b.jpg", 1000, Some(4000), Some(3000));
        let (keeper, _) = select_keeper(&[small.clone(), large.clone()], None);
        assert_eq!(keeper, large.file.id);
    }

    #[test]
    fn user_override_always_wins() {
        let small = candidate("a.jpg", 1000, Some(100), Some(100));
        let large = candidate("b.jpg", 1000, Some(4000), Some(3000));
        let (keeper, rationale) = select_keeper(&[small.clone(), large], Some(small.file.id));
        assert_eq!(keeper, small.file.id);
        assert_eq!(rationale, "user override");
    }

    #[test]
    fn lexicographic_path_is_final_tiebreak() {
        let a = candidate("a.jpg", 1000, Some(100), Some(100));
        let b = candidate("z.jpg", 1000, Some(100), Some(100));
        let (keeper, _) = select_keeper(&[b.clone(), a.clone()], None);
        assert_eq!(keeper, a.file.id);
    }

    #[test]
    fn missing_camera_model_filled_from_discard() {
        let mut keeper = candidate("a.jpg", 1000, Some(100), Some(100));
        keeper.metadata.as_mut().unwrap().camera_model = None;
        let mut discard = candidate("b.jpg", 900, Some(90), Some(90));
        discard.metadata.as_mut().unwrap().camera_model = Some("Pixel 8".to_string());

        let changes = union_fields(&keeper, &[discard.clone()]);
        assert!(changes.iter().any(|c| c.field == "camera_model" && c.from_file_id == discard.file.id));
    }

    #[test]
    fn present_keeper_capture_date_is_never_overwritten() {
        let mut keeper = candidate("a.jpg", 1000, Some(100), Some(100));
        keeper.metadata.as_mut().unwrap().capture_time = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let mut discard = candidate("b.jpg", 900, Some(90), Some(90));
        discard.metadata.as_mut().unwrap().capture_time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let changes = union_fields(&keeper, &[discard]);
        assert!(!changes.iter().any(|c| c.field == "capture_time"));
    }
}
