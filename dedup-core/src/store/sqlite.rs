use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use dedup_contracts::error::{ContractError, Result};
use dedup_contracts::store::{StoreReadPort, StoreWritePort};

use dedup_model::{
    DuplicateGroup, FieldChange, File, FileId, GroupId, GroupMember, IgnorePair, ImageSignature,
    MediaKind, MediaMetadata, MergeTransaction, Penalty, Preference, SignalContribution,
    TransactionId, VideoSignature,
};

use super::{
    backend_err, decode_json, decode_optional_time, decode_time, encode_json, encode_optional_time,
    encode_time, group_status_from_str, group_status_to_str, image_algorithm_from_str,
    image_algorithm_to_str, media_kind_from_str, media_kind_to_str, transaction_status_from_str,
    transaction_status_to_str,
};

/// SQLite-backed implementation of both store ports, sharing one pool.
/// Consumers wrap a single instance in two `Arc<dyn ...>` handles (one per
/// trait object) the way `DetectionEngine` and `MergeEngine` expect them.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn uuid_text(id: Uuid) -> String {
    id.to_string()
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| ContractError::Backend(format!("corrupt {what} id {raw:?}: {e}")))
}

fn file_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<File> {
    let id_raw: String = row.try_get("id").map_err(|e| backend_err("read files.id", e))?;
    let media_kind_raw: String =
        row.try_get("media_kind").map_err(|e| backend_err("read files.media_kind", e))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| backend_err("read files.created_at", e))?;
    let modified_at_raw: String =
        row.try_get("modified_at").map_err(|e| backend_err("read files.modified_at", e))?;
    let last_scanned_raw: String =
        row.try_get("last_scanned_at").map_err(|e| backend_err("read files.last_scanned_at", e))?;

    Ok(File {
        id: FileId(parse_uuid(&id_raw, "file")?),
        path: PathBuf::from(row.try_get::<String, _>("path").map_err(|e| backend_err("read files.path", e))?),
        access_token: None,
        media_kind: media_kind_from_str(&media_kind_raw)?,
        size: row.try_get::<i64, _>("size").map_err(|e| backend_err("read files.size", e))? as u64,
        created_at: decode_time(&created_at_raw)?,
        modified_at: decode_time(&modified_at_raw)?,
        volume_id: row.try_get("volume_id").map_err(|e| backend_err("read files.volume_id", e))?,
        file_ref: row.try_get("file_ref").map_err(|e| backend_err("read files.file_ref", e))?,
        link_count: row.try_get("link_count").map_err(|e| backend_err("read files.link_count", e))?,
        checksum: row.try_get("checksum").map_err(|e| backend_err("read files.checksum", e))?,
        trashed: row.try_get("trashed").map_err(|e| backend_err("read files.trashed", e))?,
        last_scanned_at: decode_time(&last_scanned_raw)?,
        needs_metadata_refresh: row
            .try_get("needs_metadata_refresh")
            .map_err(|e| backend_err("read files.needs_metadata_refresh", e))?,
        needs_signature_refresh: row
            .try_get("needs_signature_refresh")
            .map_err(|e| backend_err("read files.needs_signature_refresh", e))?,
    })
}

fn metadata_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MediaMetadata> {
    let file_id_raw: String =
        row.try_get("file_id").map_err(|e| backend_err("read media_metadata.file_id", e))?;
    let capture_time_raw: Option<String> =
        row.try_get("capture_time").map_err(|e| backend_err("read media_metadata.capture_time", e))?;
    let keywords_raw: String =
        row.try_get("keywords").map_err(|e| backend_err("read media_metadata.keywords", e))?;

    Ok(MediaMetadata {
        file_id: FileId(parse_uuid(&file_id_raw, "file")?),
        width: row.try_get("width").map_err(|e| backend_err("read media_metadata.width", e))?,
        height: row.try_get("height").map_err(|e| backend_err("read media_metadata.height", e))?,
        capture_time: decode_optional_time(capture_time_raw)?,
        capture_time_source: None,
        camera_model: row
            .try_get("camera_model")
            .map_err(|e| backend_err("read media_metadata.camera_model", e))?,
        gps_lat: row.try_get("gps_lat").map_err(|e| backend_err("read media_metadata.gps_lat", e))?,
        gps_lon: row.try_get("gps_lon").map_err(|e| backend_err("read media_metadata.gps_lon", e))?,
        duration_seconds: row
            .try_get("duration_seconds")
            .map_err(|e| backend_err("read media_metadata.duration_seconds", e))?,
        frame_rate: row
            .try_get("frame_rate")
            .map_err(|e| backend_err("read media_metadata.frame_rate", e))?,
        codec_tag: row.try_get("codec_tag").map_err(|e| backend_err("read media_metadata.codec_tag", e))?,
        keywords: decode_json(&keywords_raw)?,
        content_type_tag: row
            .try_get("content_type_tag")
            .map_err(|e| backend_err("read media_metadata.content_type_tag", e))?,
    })
}

fn image_signature_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ImageSignature> {
    let file_id_raw: String =
        row.try_get("file_id").map_err(|e| backend_err("read image_signatures.file_id", e))?;
    let algorithm_raw: String =
        row.try_get("algorithm").map_err(|e| backend_err("read image_signatures.algorithm", e))?;
    let computed_at_raw: String =
        row.try_get("computed_at").map_err(|e| backend_err("read image_signatures.computed_at", e))?;

    Ok(ImageSignature {
        file_id: FileId(parse_uuid(&file_id_raw, "file")?),
        algorithm: image_algorithm_from_str(&algorithm_raw)?,
        hash: row.try_get("hash").map_err(|e| backend_err("read image_signatures.hash", e))?,
        width: row.try_get("width").map_err(|e| backend_err("read image_signatures.width", e))?,
        height: row.try_get("height").map_err(|e| backend_err("read image_signatures.height", e))?,
        computed_at: decode_time(&computed_at_raw)?,
    })
}

fn video_signature_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<VideoSignature> {
    let file_id_raw: String =
        row.try_get("file_id").map_err(|e| backend_err("read video_signatures.file_id", e))?;
    let computed_at_raw: String =
        row.try_get("computed_at").map_err(|e| backend_err("read video_signatures.computed_at", e))?;
    let frame_hashes_raw: String =
        row.try_get("frame_hashes").map_err(|e| backend_err("read video_signatures.frame_hashes", e))?;
    let sample_times_raw: String =
        row.try_get("sample_times").map_err(|e| backend_err("read video_signatures.sample_times", e))?;
    let signed_hashes: Vec<i64> = decode_json(&frame_hashes_raw)?;

    Ok(VideoSignature {
        file_id: FileId(parse_uuid(&file_id_raw, "file")?),
        duration_seconds: row
            .try_get("duration_seconds")
            .map_err(|e| backend_err("read video_signatures.duration_seconds", e))?,
        width: row.try_get("width").map_err(|e| backend_err("read video_signatures.width", e))?,
        height: row.try_get("height").map_err(|e| backend_err("read video_signatures.height", e))?,
        frame_hashes: signed_hashes.into_iter().map(|h| h as u64).collect(),
        sample_times: decode_json(&sample_times_raw)?,
        computed_at: decode_time(&computed_at_raw)?,
    })
}

fn group_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DuplicateGroup> {
    let id_raw: String = row.try_get("id").map_err(|e| backend_err("read duplicate_groups.id", e))?;
    let status_raw: String =
        row.try_get("status").map_err(|e| backend_err("read duplicate_groups.status", e))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| backend_err("read duplicate_groups.created_at", e))?;

    Ok(DuplicateGroup {
        id: GroupId(parse_uuid(&id_raw, "group")?),
        created_at: decode_time(&created_at_raw)?,
        status: group_status_from_str(&status_raw)?,
        confidence: row
            .try_get("confidence")
            .map_err(|e| backend_err("read duplicate_groups.confidence", e))?,
        incomplete: row
            .try_get("incomplete")
            .map_err(|e| backend_err("read duplicate_groups.incomplete", e))?,
        policy_decisions: row
            .try_get("policy_decisions")
            .map_err(|e| backend_err("read duplicate_groups.policy_decisions", e))?,
    })
}

fn group_member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<GroupMember> {
    let group_id_raw: String =
        row.try_get("group_id").map_err(|e| backend_err("read group_members.group_id", e))?;
    let file_id_raw: String =
        row.try_get("file_id").map_err(|e| backend_err("read group_members.file_id", e))?;
    let contributions_raw: String = row
        .try_get("signal_contributions")
        .map_err(|e| backend_err("read group_members.signal_contributions", e))?;
    let penalties_raw: String =
        row.try_get("penalties").map_err(|e| backend_err("read group_members.penalties", e))?;
    let hamming_distance: Option<i64> = row
        .try_get("hamming_distance_to_keeper")
        .map_err(|e| backend_err("read group_members.hamming_distance_to_keeper", e))?;

    Ok(GroupMember {
        group_id: GroupId(parse_uuid(&group_id_raw, "group")?),
        file_id: FileId(parse_uuid(&file_id_raw, "file")?),
        keeper_suggestion: row
            .try_get("keeper_suggestion")
            .map_err(|e| backend_err("read group_members.keeper_suggestion", e))?,
        hamming_distance_to_keeper: hamming_distance.map(|d| d as u32),
        name_similarity_to_keeper: row
            .try_get("name_similarity_to_keeper")
            .map_err(|e| backend_err("read group_members.name_similarity_to_keeper", e))?,
        signal_contributions: decode_json::<Vec<SignalContribution>>(&contributions_raw)?,
        penalties: decode_json::<Vec<Penalty>>(&penalties_raw)?,
    })
}

fn preference_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Preference> {
    Ok(Preference {
        key: row.try_get("key").map_err(|e| backend_err("read preferences.key", e))?,
        value: row.try_get("value").map_err(|e| backend_err("read preferences.value", e))?,
    })
}

fn ignore_pair_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<IgnorePair> {
    let lo_raw: String = row.try_get("lo").map_err(|e| backend_err("read ignore_pairs.lo", e))?;
    let hi_raw: String = row.try_get("hi").map_err(|e| backend_err("read ignore_pairs.hi", e))?;
    Ok(IgnorePair::new(
        FileId(parse_uuid(&lo_raw, "file")?),
        FileId(parse_uuid(&hi_raw, "file")?),
    ))
}

fn transaction_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MergeTransaction> {
    let id_raw: String = row.try_get("id").map_err(|e| backend_err("read merge_transactions.id", e))?;
    let group_id_raw: String =
        row.try_get("group_id").map_err(|e| backend_err("read merge_transactions.group_id", e))?;
    let keeper_id_raw: String =
        row.try_get("keeper_id").map_err(|e| backend_err("read merge_transactions.keeper_id", e))?;
    let status_raw: String =
        row.try_get("status").map_err(|e| backend_err("read merge_transactions.status", e))?;
    let staged_at_raw: String =
        row.try_get("staged_at").map_err(|e| backend_err("read merge_transactions.staged_at", e))?;
    let committed_at_raw: Option<String> = row
        .try_get("committed_at")
        .map_err(|e| backend_err("read merge_transactions.committed_at", e))?;
    let original_paths_raw: String = row
        .try_get("original_paths")
        .map_err(|e| backend_err("read merge_transactions.original_paths", e))?;
    let trash_handles_raw: String = row
        .try_get("trash_handles")
        .map_err(|e| backend_err("read merge_transactions.trash_handles", e))?;
    let field_changes_raw: String = row
        .try_get("field_changes")
        .map_err(|e| backend_err("read merge_transactions.field_changes", e))?;

    Ok(MergeTransaction {
        id: TransactionId(parse_uuid(&id_raw, "transaction")?),
        group_id: GroupId(parse_uuid(&group_id_raw, "group")?),
        keeper_id: FileId(parse_uuid(&keeper_id_raw, "file")?),
        status: transaction_status_from_str(&status_raw)?,
        staged_at: decode_time(&staged_at_raw)?,
        committed_at: decode_optional_time(committed_at_raw)?,
        original_paths: decode_json(&original_paths_raw)?,
        trash_handles: decode_json(&trash_handles_raw)?,
        field_changes: decode_json::<Vec<FieldChange>>(&field_changes_raw)?,
    })
}

#[async_trait]
impl StoreReadPort for SqliteStore {
    async fn get_file(&self, id: FileId) -> Result<Option<File>> {
        let row = sqlx::query("SELECT * FROM files WHERE id = ?")
            .bind(uuid_text(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get_file", e))?;
        row.as_ref().map(file_from_row).transpose()
    }

    async fn list_files(&self, media_kind: Option<MediaKind>) -> Result<Vec<File>> {
        let rows = match media_kind {
            Some(kind) => {
                sqlx::query("SELECT * FROM files WHERE media_kind = ? AND trashed = 0 ORDER BY id")
                    .bind(media_kind_to_str(kind))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM files WHERE trashed = 0 ORDER BY id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| backend_err("list_files", e))?;
        rows.iter().map(file_from_row).collect()
    }

    async fn get_metadata(&self, file_id: FileId) -> Result<Option<MediaMetadata>> {
        let row = sqlx::query("SELECT * FROM media_metadata WHERE file_id = ?")
            .bind(uuid_text(file_id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get_metadata", e))?;
        row.as_ref().map(metadata_from_row).transpose()
    }

    async fn get_image_signatures(&self, file_id: FileId) -> Result<Vec<ImageSignature>> {
        let rows = sqlx::query("SELECT * FROM image_signatures WHERE file_id = ? ORDER BY algorithm")
            .bind(uuid_text(file_id.0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("get_image_signatures", e))?;
        rows.iter().map(image_signature_from_row).collect()
    }

    async fn get_video_signature(&self, file_id: FileId) -> Result<Option<VideoSignature>> {
        let row = sqlx::query("SELECT * FROM video_signatures WHERE file_id = ?")
            .bind(uuid_text(file_id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get_video_signature", e))?;
        row.as_ref().map(video_signature_from_row).transpose()
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<DuplicateGroup>> {
        let row = sqlx::query("SELECT * FROM duplicate_groups WHERE id = ?")
            .bind(uuid_text(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get_group", e))?;
        row.as_ref().map(group_from_row).transpose()
    }

    async fn list_open_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let rows = sqlx::query("SELECT * FROM duplicate_groups WHERE status = 'open' ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("list_open_groups", e))?;
        rows.iter().map(group_from_row).collect()
    }

    async fn get_group_members(&self, group_id: GroupId) -> Result<Vec<GroupMember>> {
        let rows = sqlx::query("SELECT * FROM group_members WHERE group_id = ? ORDER BY file_id")
            .bind(uuid_text(group_id.0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("get_group_members", e))?;
        rows.iter().map(group_member_from_row).collect()
    }

    async fn list_ignore_pairs(&self) -> Result<Vec<IgnorePair>> {
        let rows = sqlx::query("SELECT * FROM ignore_pairs")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("list_ignore_pairs", e))?;
        rows.iter().map(ignore_pair_from_row).collect()
    }

    async fn get_preference(&self, key: &str) -> Result<Option<Preference>> {
        let row = sqlx::query("SELECT * FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get_preference", e))?;
        row.as_ref().map(preference_from_row).transpose()
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<MergeTransaction>> {
        let row = sqlx::query("SELECT * FROM merge_transactions WHERE id = ?")
            .bind(uuid_text(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend_err("get_transaction", e))?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn list_staged_transactions(&self) -> Result<Vec<MergeTransaction>> {
        let rows = sqlx::query("SELECT * FROM merge_transactions WHERE status = 'staged' ORDER BY staged_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend_err("list_staged_transactions", e))?;
        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl StoreWritePort for SqliteStore {
    async fn upsert_file(&self, file: &File) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (
                id, path, media_kind, size, created_at, modified_at,
                volume_id, file_ref, link_count, checksum, trashed,
                last_scanned_at, needs_metadata_refresh, needs_signature_refresh
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                path = excluded.path,
                media_kind = excluded.media_kind,
                size = excluded.size,
                created_at = excluded.created_at,
                modified_at = excluded.modified_at,
                volume_id = excluded.volume_id,
                file_ref = excluded.file_ref,
                link_count = excluded.link_count,
                checksum = excluded.checksum,
                trashed = excluded.trashed,
                last_scanned_at = excluded.last_scanned_at,
                needs_metadata_refresh = excluded.needs_metadata_refresh,
                needs_signature_refresh = excluded.needs_signature_refresh
            "#,
        )
        .bind(uuid_text(file.id.0))
        .bind(file.path.to_string_lossy().to_string())
        .bind(media_kind_to_str(file.media_kind))
        .bind(file.size as i64)
        .bind(encode_time(file.created_at))
        .bind(encode_time(file.modified_at))
        .bind(file.volume_id)
        .bind(file.file_ref)
        .bind(file.link_count)
        .bind(file.checksum.clone())
        .bind(file.trashed)
        .bind(encode_time(file.last_scanned_at))
        .bind(file.needs_metadata_refresh)
        .bind(file.needs_signature_refresh)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("upsert_file", e))?;
        Ok(())
    }

    async fn mark_missing(&self, file_id: FileId) -> Result<()> {
        sqlx::query("UPDATE files SET trashed = 1 WHERE id = ?")
            .bind(uuid_text(file_id.0))
            .execute(&self.pool)
            .await
            .map_err(|e| backend_err("mark_missing", e))?;
        Ok(())
    }

    async fn upsert_metadata(&self, metadata: &MediaMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media_metadata (
                file_id, width, height, capture_time, camera_model,
                gps_lat, gps_lon, duration_seconds, frame_rate, codec_tag,
                keywords, content_type_tag
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (file_id) DO UPDATE SET
                width = excluded.width,
                height = excluded.height,
                capture_time = excluded.capture_time,
                camera_model = excluded.camera_model,
                gps_lat = excluded.gps_lat,
                gps_lon = excluded.gps_lon,
                duration_seconds = excluded.duration_seconds,
                frame_rate = excluded.frame_rate,
                codec_tag = excluded.codec_tag,
                keywords = excluded.keywords,
                content_type_tag = excluded.content_type_tag
            "#,
        )
        .bind(uuid_text(metadata.file_id.0))
        .bind(metadata.width)
        .bind(metadata.height)
        .bind(encode_optional_time(metadata.capture_time))
        .bind(metadata.camera_model.clone())
        .bind(metadata.gps_lat)
        .bind(metadata.gps_lon)
        .bind(metadata.duration_seconds)
        .bind(metadata.frame_rate)
        .bind(metadata.codec_tag.clone())
        .bind(encode_json(&metadata.keywords)?)
        .bind(metadata.content_type_tag.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("upsert_metadata", e))?;
        Ok(())
    }

    async fn upsert_image_signature(&self, signature: &ImageSignature) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO image_signatures (file_id, algorithm, hash, width, height, computed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (file_id, algorithm) DO UPDATE SET
                hash = excluded.hash,
                width = excluded.width,
                height = excluded.height,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(uuid_text(signature.file_id.0))
        .bind(image_algorithm_to_str(signature.algorithm))
        .bind(signature.hash)
        .bind(signature.width)
        .bind(signature.height)
        .bind(encode_time(signature.computed_at))
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("upsert_image_signature", e))?;
        Ok(())
    }

    async fn upsert_video_signature(&self, signature: &VideoSignature) -> Result<()> {
        let signed_hashes: Vec<i64> = signature.frame_hashes.iter().map(|h| *h as i64).collect();
        sqlx::query(
            r#"
            INSERT INTO video_signatures (
                file_id, duration_seconds, width, height, frame_hashes, sample_times, computed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (file_id) DO UPDATE SET
                duration_seconds = excluded.duration_seconds,
                width = excluded.width,
                height = excluded.height,
                frame_hashes = excluded.frame_hashes,
                sample_times = excluded.sample_times,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(uuid_text(signature.file_id.0))
        .bind(signature.duration_seconds)
        .bind(signature.width)
        .bind(signature.height)
        .bind(encode_json(&signed_hashes)?)
        .bind(encode_json(&signature.sample_times)?)
        .bind(encode_time(signature.computed_at))
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("upsert_video_signature", e))?;
        Ok(())
    }

    async fn put_group(&self, group: &DuplicateGroup, members: &[GroupMember]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| backend_err("put_group begin", e))?;

        sqlx::query(
            r#"
            INSERT INTO duplicate_groups (id, created_at, status, confidence, incomplete, policy_decisions)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                confidence = excluded.confidence,
                incomplete = excluded.incomplete,
                policy_decisions = excluded.policy_decisions
            "#,
        )
        .bind(uuid_text(group.id.0))
        .bind(encode_time(group.created_at))
        .bind(group_status_to_str(group.status))
        .bind(group.confidence)
        .bind(group.incomplete)
        .bind(group.policy_decisions.clone())
        .execute(&mut *tx)
        .await
        .map_err(|e| backend_err("put_group insert", e))?;

        sqlx::query("DELETE FROM group_members WHERE group_id = ?")
            .bind(uuid_text(group.id.0))
            .execute(&mut *tx)
            .await
            .map_err(|e| backend_err("put_group clear members", e))?;

        for member in members {
            sqlx::query(
                r#"
                INSERT INTO group_members (
                    group_id, file_id, keeper_suggestion, hamming_distance_to_keeper,
                    name_similarity_to_keeper, signal_contributions, penalties
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(uuid_text(member.group_id.0))
            .bind(uuid_text(member.file_id.0))
            .bind(member.keeper_suggestion)
            .bind(member.hamming_distance_to_keeper.map(|d| d as i64))
            .bind(member.name_similarity_to_keeper)
            .bind(encode_json(&member.signal_contributions)?)
            .bind(encode_json(&member.penalties)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| backend_err("put_group insert member", e))?;
        }

        tx.commit().await.map_err(|e| backend_err("put_group commit", e))?;
        Ok(())
    }

    async fn delete_group(&self, group_id: GroupId) -> Result<()> {
        sqlx::query("DELETE FROM duplicate_groups WHERE id = ?")
            .bind(uuid_text(group_id.0))
            .execute(&self.pool)
            .await
            .map_err(|e| backend_err("delete_group", e))?;
        Ok(())
    }

    async fn put_ignore_pair(&self, pair: IgnorePair) -> Result<()> {
        let (lo, hi) = pair.parts();
        sqlx::query("INSERT OR IGNORE INTO ignore_pairs (lo, hi) VALUES (?, ?)")
            .bind(uuid_text(lo.0))
            .bind(uuid_text(hi.0))
            .execute(&self.pool)
            .await
            .map_err(|e| backend_err("put_ignore_pair", e))?;
        Ok(())
    }

    async fn set_preference(&self, preference: Preference) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value) VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(preference.key)
        .bind(preference.value)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("set_preference", e))?;
        Ok(())
    }

    async fn put_transaction(&self, transaction: &MergeTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO merge_transactions (
                id, group_id, keeper_id, status, staged_at, committed_at,
                original_paths, trash_handles, field_changes
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                committed_at = excluded.committed_at,
                original_paths = excluded.original_paths,
                trash_handles = excluded.trash_handles,
                field_changes = excluded.field_changes
            "#,
        )
        .bind(uuid_text(transaction.id.0))
        .bind(uuid_text(transaction.group_id.0))
        .bind(uuid_text(transaction.keeper_id.0))
        .bind(transaction_status_to_str(transaction.status))
        .bind(encode_time(transaction.staged_at))
        .bind(encode_optional_time(transaction.committed_at))
        .bind(encode_json(&transaction.original_paths)?)
        .bind(encode_json(&transaction.trash_handles)?)
        .bind(encode_json(&transaction.field_changes)?)
        .execute(&self.pool)
        .await
        .map_err(|e| backend_err("put_transaction", e))?;
        Ok(())
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        sqlx::query("DELETE FROM merge_transactions WHERE id = ?")
            .bind(uuid_text(id.0))
            .execute(&self.pool)
            .await
            .map_err(|e| backend_err("delete_transaction", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dedup_model::{IdentityTriple, MediaKind};

    async fn memory_store() -> SqliteStore {
        let pool = crate::store::open("sqlite::memory:").await.expect("open in-memory store");
        SqliteStore::new(pool)
    }

    fn sample_file() -> File {
        File::discovered(
            PathBuf::from("/library/a.jpg"),
            MediaKind::Photo,
            1024,
            chrono::Utc::now(),
            chrono::Utc::now(),
            IdentityTriple { volume_id: 1, file_id: 42, link_count: 1 },
        )
    }

    #[tokio::test]
    async fn upsert_and_fetch_roundtrips_a_file() {
        let store = memory_store().await;
        let file = sample_file();
        store.upsert_file(&file).await.unwrap();

        let fetched = store.get_file(file.id).await.unwrap().expect("file present");
        assert_eq!(fetched.path, file.path);
        assert_eq!(fetched.size, file.size);
        assert_eq!(fetched.media_kind, MediaKind::Photo);
    }

    #[tokio::test]
    async fn upsert_file_is_idempotent_on_conflict() {
        let store = memory_store().await;
        let mut file = sample_file();
        store.upsert_file(&file).await.unwrap();

        file.size = 2048;
        store.upsert_file(&file).await.unwrap();

        let all = store.list_files(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].size, 2048);
    }

    #[tokio::test]
    async fn mark_missing_excludes_file_from_listing() {
        let store = memory_store().await;
        let file = sample_file();
        store.upsert_file(&file).await.unwrap();
        store.mark_missing(file.id).await.unwrap();

        assert!(store.list_files(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn group_round_trip_preserves_member_evidence() {
        let store = memory_store().await;
        let a = sample_file();
        let mut b = sample_file();
        b.id = FileId::new();
        store.upsert_file(&a).await.unwrap();
        store.upsert_file(&b).await.unwrap();

        let group = DuplicateGroup::new(&[a.id, b.id]);
        let mut member = GroupMember::new(group.id, a.id);
        member.keeper_suggestion = true;
        member.signal_contributions.push(SignalContribution {
            key: "hash".into(),
            weight: 0.5,
            raw_score: 1.0,
            contribution: 0.5,
            rationale: "exact dHash match".into(),
        });
        let other = GroupMember::new(group.id, b.id);

        store.put_group(&group, &[member, other]).await.unwrap();

        let fetched_members = store.get_group_members(group.id).await.unwrap();
        assert_eq!(fetched_members.len(), 2);
        let keeper = fetched_members.iter().find(|m| m.file_id == a.id).unwrap();
        assert!(keeper.keeper_suggestion);
        assert_eq!(keeper.signal_contributions.len(), 1);
    }

    #[tokio::test]
    async fn ignore_pair_is_order_independent_in_storage() {
        let store = memory_store().await;
        let a = FileId::new();
        let b = FileId::new();
        store.put_ignore_pair(IgnorePair::new(a, b)).await.unwrap();

        let pairs = store.list_ignore_pairs().await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].contains(a) && pairs[0].contains(b));
    }

    #[tokio::test]
    async fn transaction_round_trips_through_json_columns() {
        let store = memory_store().await;
        let plan = dedup_model::MergePlan::new(GroupId::new(), FileId::new(), vec![FileId::new()]);
        let mut txn = MergeTransaction::staged(&plan);
        txn.original_paths = vec!["/library/dup.jpg".to_string()];
        txn.trash_handles = vec!["trash-handle-1".to_string()];

        store.put_transaction(&txn).await.unwrap();
        let fetched = store.get_transaction(txn.id).await.unwrap().expect("transaction present");
        assert_eq!(fetched.original_paths, txn.original_paths);
        assert_eq!(fetched.trash_handles, txn.trash_handles);
        assert_eq!(fetched.status, dedup_model::TransactionStatus::Staged);
    }
}
