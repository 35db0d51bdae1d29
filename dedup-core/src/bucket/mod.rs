pub mod bktree;
pub mod keys;

use std::collections::BTreeMap;

use dedup_model::{CandidateBucket, File, MediaMetadata};

/// Groups files into [`CandidateBucket`]s. Bucket construction is
/// deterministic: files are sorted by id before insertion, so two runs
/// over the same data produce identical buckets.
pub fn build_buckets(
    files: &[File],
    metadata: &std::collections::HashMap<dedup_model::FileId, MediaMetadata>,
    max_bucket_size: usize,
) -> Vec<CandidateBucket> {
    let mut by_checksum: BTreeMap<String, CandidateBucket> = BTreeMap::new();
    let mut by_key: BTreeMap<(String, String), CandidateBucket> = BTreeMap::new();

    let mut sorted: Vec<&File> = files.iter().filter(|f| !f.trashed).collect();
    sorted.sort_by_key(|f| f.id.0);

    for file in sorted {
        if let Some(checksum) = &file.checksum {
            let key = keys::checksum_bucket_key(checksum);
            by_checksum
                .entry(key.clone())
                .or_insert_with(|| CandidateBucket::new(file.media_kind, key, "checksum".to_string()))
                .push(file.id);
        }

        let meta = metadata.get(&file.id);
        if let Some((key, tag)) = keys::bucket_key(file, meta) {
            by_key
                .entry((key.clone(), tag.clone()))
                .or_insert_with(|| CandidateBucket::new(file.media_kind, key, tag))
                .push(file.id);
        }
    }

    let mut buckets: Vec<CandidateBucket> =
        by_checksum.into_values().chain(by_key.into_values()).collect();

    for bucket in &mut buckets {
        if bucket.file_ids.len() > max_bucket_size {
            bucket.incomplete = true;
            bucket.stats.skipped_by_policy = bucket.file_ids.len() - max_bucket_size;
            bucket.file_ids.truncate(max_bucket_size);
        }
        bucket.stats.estimated_comparisons = bucket.estimate_comparisons();
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dedup_model::{IdentityTriple, MediaKind};
    use std::path::PathBuf;

    #[test]
    fn checksum_bucket_takes_priority_alongside_key_bucket() {
        let now = Utc::now();
        let mut a = File::discovered(
            PathBuf::from("/lib/a.jpg"),
            MediaKind::Photo,
            1000,
            now,
            now,
            IdentityTriple {
                volume_id: 1,
                file_id: 1,
                link_count: 1,
            },
        );
        a.checksum = Some(vec![1, 2, 3]);
        let mut b = a.clone();
        b.id = dedup_model::FileId::new();
        b.path = PathBuf::from("/lib/b.jpg");

        let buckets = build_buckets(&[a, b], &std::collections::HashMap::new(), 100);
        assert!(buckets.iter().any(|bk| bk.heuristic_tag == "checksum" && bk.file_ids.len() == 2));
    }

    #[test]
    fn oversized_bucket_is_marked_incomplete() {
        let now = Utc::now();
        let files: Vec<File> = (0..5)
            .map(|i| {
                File::discovered(
                    PathBuf::from(format!("/lib/img{i}.jpg")),
                    MediaKind::Photo,
                    1000,
                    now,
                    now,
                    IdentityTriple {
                        volume_id: 1,
                        file_id: i,
                        link_count: 1,
                    },
                )
            })
            .collect();
        let buckets = build_buckets(&files, &std::collections::HashMap::new(), 2);
        assert!(buckets.iter().any(|b| b.incomplete));
    }
}
