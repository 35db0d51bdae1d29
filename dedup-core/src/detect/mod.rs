pub mod policy;
pub mod signals;
pub mod union_find;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use dedup_contracts::detect::{DetectionApi, DetectionOptions, DetectionSummary, GroupRationale};
use dedup_contracts::error::Result;
use dedup_contracts::store::{StoreReadPort, StoreWritePort};

use dedup_model::{
    CandidateBucket, DuplicateGroup, FileId, GroupId, GroupMember, GroupStatus, IgnorePair, MediaKind,
};

use crate::config::EngineConfig;

use self::policy::PolicyToggles;
use self::signals::{classify, member_from_score, score_pair, PairContext};
use self::union_find::UnionFind;

/// One emitted edge between two candidate files, carrying the tag used
/// for evidence ("checksum", a bucket heuristic tag, or a policy tag).
struct Edge {
    a: FileId,
    b: FileId,
    tag: &'static str,
    score: signals::PairScore,
    hamming_distance: Option<u32>,
    name_similarity: Option<f64>,
}

/// Default [`DetectionApi`] implementation: bucketing already done
/// upstream, this owns pairwise comparison, policy collapse, and
/// union-find clustering.
pub struct DetectionEngine {
    reader: Arc<dyn StoreReadPort>,
    writer: Arc<dyn StoreWritePort>,
    config: EngineConfig,
    policy: PolicyToggles,
}

impl DetectionEngine {
    pub fn new(
        reader: Arc<dyn StoreReadPort>,
        writer: Arc<dyn StoreWritePort>,
        config: EngineConfig,
        policy: PolicyToggles,
    ) -> Self {
        Self { reader, writer, config, policy }
    }

    async fn context_for(&self, file_id: FileId) -> Result<Option<OwnedContext>> {
        let Some(file) = self.reader.get_file(file_id).await? else {
            return Ok(None);
        };
        let metadata = self.reader.get_metadata(file_id).await?;
        let image_signatures = self.reader.get_image_signatures(file_id).await?;
        let video_signature = self.reader.get_video_signature(file_id).await?;
        Ok(Some(OwnedContext { file, metadata, image_signatures, video_signature }))
    }
}

/// Owned counterpart of [`PairContext`] so comparisons can hold data
/// fetched from the store across an await boundary.
struct OwnedContext {
    file: dedup_model::File,
    metadata: Option<dedup_model::MediaMetadata>,
    image_signatures: Vec<dedup_model::ImageSignature>,
    video_signature: Option<dedup_model::VideoSignature>,
}

impl OwnedContext {
    fn as_pair_context(&self) -> PairContext<'_> {
        PairContext {
            file: &self.file,
            metadata: self.metadata.as_ref(),
            image_signatures: &self.image_signatures,
            video_signature: self.video_signature.as_ref(),
        }
    }
}

#[async_trait]
impl DetectionApi for DetectionEngine {
    async fn build_buckets(&self, options: &DetectionOptions) -> Result<Vec<CandidateBucket>> {
        let mut all_files = Vec::new();
        for kind in &options.media_kinds {
            all_files.extend(self.reader.list_files(Some(*kind)).await?);
        }

        let mut metadata_by_file = HashMap::new();
        for file in &all_files {
            if let Some(meta) = self.reader.get_metadata(file.id).await? {
                metadata_by_file.insert(file.id, meta);
            }
        }

        Ok(crate::bucket::build_buckets(&all_files, &metadata_by_file, usize::try_from(options.max_comparisons_per_bucket).unwrap_or(usize::MAX)))
    }

    async fn detect(&self, buckets: &[CandidateBucket], options: &DetectionOptions) -> Result<DetectionSummary> {
        let started = Instant::now();
        let time_budget = options.time_budget_seconds.map(Duration::from_secs);

        let ignore_set: std::collections::HashSet<IgnorePair> =
            self.reader.list_ignore_pairs().await?.into_iter().collect();

        let mut summary = DetectionSummary::default();
        let mut edges: Vec<Edge> = Vec::new();
        let mut incomplete_files: std::collections::HashSet<FileId> = std::collections::HashSet::new();
        let mut time_exceeded = false;

        for bucket in buckets {
            summary.buckets_built += 1;
            if bucket.incomplete {
                summary.buckets_incomplete += 1;
                incomplete_files.extend(bucket.file_ids.iter().copied());
            }

            if bucket.heuristic_tag == "checksum" {
                for pair in sorted_pairs(&bucket.file_ids) {
                    if ignore_set.contains(&IgnorePair::new(pair.0, pair.1)) {
                        continue;
                    }
                    edges.push(Edge {
                        a: pair.0,
                        b: pair.1,
                        tag: "checksum",
                        score: checksum_edge_score(&self.config),
                        hamming_distance: Some(0),
                        name_similarity: None,
                    });
                }
                continue;
            }

            if time_exceeded {
                incomplete_files.extend(bucket.file_ids.iter().copied());
                continue;
            }

            let mut comparisons_this_bucket = 0u64;
            for pair in sorted_pairs(&bucket.file_ids) {
                if let Some(budget) = time_budget {
                    if started.elapsed() >= budget {
                        time_exceeded = true;
                        incomplete_files.extend(bucket.file_ids.iter().copied());
                        break;
                    }
                }
                if comparisons_this_bucket >= self.config.max_comparisons_per_bucket {
                    incomplete_files.extend(bucket.file_ids.iter().copied());
                    break;
                }
                if ignore_set.contains(&IgnorePair::new(pair.0, pair.1)) {
                    continue;
                }
                comparisons_this_bucket += 1;
                summary.comparisons_performed += 1;

                let (Some(ctx_a), Some(ctx_b)) = (self.context_for(pair.0).await?, self.context_for(pair.1).await?)
                else {
                    continue;
                };
                let pc_a = ctx_a.as_pair_context();
                let pc_b = ctx_b.as_pair_context();
                let mut score = score_pair(&pc_a, &pc_b, &self.config);

                let mut tag: &'static str = bucket_tag(bucket);
                if let Some(link) = policy::evaluate(
                    &ctx_a.file,
                    ctx_a.metadata.as_ref().and_then(|m| m.capture_time),
                    &ctx_b.file,
                    ctx_b.metadata.as_ref().and_then(|m| m.capture_time),
                    self.policy,
                ) {
                    let bonus = policy::bonus_for(link, &self.config);
                    score.aggregate = (score.aggregate + bonus).clamp(0.0, 1.0);
                    tag = link.tag();
                    if classify(score.aggregate, &self.config).is_none() {
                        score.aggregate = score.aggregate.max(self.config.confidence_similar);
                    }
                }

                let Some(_label) = classify(score.aggregate, &self.config) else {
                    continue;
                };

                let hamming_distance = match (pc_a.dhash(), pc_b.dhash()) {
                    (Some(ha), Some(hb)) => Some(crate::hashing::hamming::distance(ha, hb)),
                    _ => None,
                };
                let name_similarity = score
                    .contributions
                    .iter()
                    .find(|c| c.key == "name")
                    .map(|c| c.raw_score);

                edges.push(Edge { a: pair.0, b: pair.1, tag, score, hamming_distance, name_similarity });
            }
            if time_exceeded {
                break;
            }
        }

        let mut uf = UnionFind::new();
        let mut edge_lookup: HashMap<(FileId, FileId), &Edge> = HashMap::new();
        for edge in &edges {
            uf.union(edge.a, edge.b);
            edge_lookup.insert((edge.a, edge.b), edge);
        }

        for component in uf.components() {
            let group = DuplicateGroup::new(&component);
            let group_incomplete = component.iter().any(|id| incomplete_files.contains(id)) || time_exceeded;

            let mut members = Vec::with_capacity(component.len());
            let mut confidences = Vec::new();
            for &file_id in &component {
                let best_edge = component
                    .iter()
                    .filter(|&&other| other != file_id)
                    .filter_map(|&other| {
                        edge_lookup
                            .get(&(file_id, other))
                            .or_else(|| edge_lookup.get(&(other, file_id)))
                            .copied()
                    })
                    .max_by(|a, b| a.score.aggregate.partial_cmp(&b.score.aggregate).unwrap());

                let Some(edge) = best_edge else { continue };
                confidences.push(edge.score.aggregate);
                members.push(member_from_score(
                    group.id,
                    file_id,
                    edge.hamming_distance,
                    edge.name_similarity,
                    &edge.score,
                ));
            }

            let mut group = group;
            group.confidence = if confidences.is_empty() {
                0.0
            } else {
                confidences.iter().sum::<f64>() / confidences.len() as f64
            };
            group.incomplete = group_incomplete;

            self.writer.put_group(&group, &members).await?;
            summary.groups_formed += 1;
        }

        Ok(summary)
    }

    async fn explain(&self, group_id: GroupId) -> Result<GroupRationale> {
        let group = self
            .reader
            .get_group(group_id)
            .await?
            .ok_or_else(|| dedup_contracts::error::ContractError::NotFound(group_id.to_string()))?;
        let members = self.reader.get_group_members(group_id).await?;
        Ok(GroupRationale { group, members })
    }

    async fn ignore_pair(&self, a: FileId, b: FileId) -> Result<()> {
        self.writer.put_ignore_pair(IgnorePair::new(a, b)).await
    }
}

fn bucket_tag(bucket: &CandidateBucket) -> &'static str {
    match bucket.media_kind {
        MediaKind::Photo => "photo_bucket",
        MediaKind::Video => "video_bucket",
        MediaKind::Audio => "audio_bucket",
        MediaKind::Other => "other_bucket",
    }
}

/// Every ordered pair within a sorted id list, itself sorted for
/// determinism.
fn sorted_pairs(ids: &[FileId]) -> Vec<(FileId, FileId)> {
    let mut sorted = ids.to_vec();
    sorted.sort_by_key(|id| id.0);
    let mut out = Vec::with_capacity(sorted.len() * sorted.len() / 2);
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            out.push((sorted[i], sorted[j]));
        }
    }
    out
}

fn checksum_edge_score(cfg: &EngineConfig) -> signals::PairScore {
    signals::PairScore {
        contributions: vec![dedup_model::SignalContribution {
            key: "checksum".to_string(),
            weight: cfg.weight_checksum,
            raw_score: 1.0,
            contribution: 1.0,
            rationale: "sha-256 match".to_string(),
        }],
        penalties: Vec::new(),
        aggregate: 1.0,
    }
}

#[cfg(test)]
mod group_status_tests {
    use super::*;

    #[test]
    fn sorted_pairs_covers_every_unordered_combination() {
        let ids = vec![FileId::new(), FileId::new(), FileId::new()];
        let pairs = sorted_pairs(&ids);
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn new_groups_start_open() {
        let ids = vec![FileId::new(), FileId::new()];
        let group = DuplicateGroup::new(&ids);
        assert_eq!(group.status, GroupStatus::Open);
    }
}
