//! The embedded persistent store: a single-file SQLite database
//! behind the [`StoreReadPort`](dedup_contracts::store::StoreReadPort) and
//! [`StoreWritePort`](dedup_contracts::store::StoreWritePort) contracts.
//!
//! Rows are mapped manually via `Row::try_get` using runtime-checked
//! `sqlx::query`/`query_as` rather than the `query!` macro, which needs a
//! live database reachable at build time.

pub mod sqlite;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use dedup_contracts::error::{ContractError, Result};
use dedup_model::{GroupStatus, ImageHashAlgorithm, MediaKind, TransactionStatus};

pub use self::sqlite::SqliteStore;

/// Embedded migrations, run against a fresh or existing database on
/// startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Opens (creating if absent) the SQLite file at `database_url` and runs
/// pending migrations. `database_url` is an `sqlx` SQLite connection
/// string, e.g. `sqlite:///path/to/dedup.db` or `sqlite::memory:` for
/// tests.
pub async fn open(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| ContractError::Backend(format!("invalid database url: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(num_cpus::get().max(4) as u32)
        .connect_with(options)
        .await
        .map_err(|e| ContractError::Backend(format!("database connection failed: {e}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| ContractError::Backend(format!("migration failed: {e}")))?;

    Ok(pool)
}

pub(crate) fn backend_err(context: &str, err: sqlx::Error) -> ContractError {
    ContractError::Backend(format!("{context}: {err}"))
}

pub(crate) fn encode_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn decode_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ContractError::Backend(format!("corrupt timestamp {raw:?}: {e}")))
}

pub(crate) fn encode_optional_time(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(encode_time)
}

pub(crate) fn decode_optional_time(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| decode_time(&s)).transpose()
}

pub(crate) fn media_kind_to_str(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo",
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
        MediaKind::Other => "other",
    }
}

pub(crate) fn media_kind_from_str(raw: &str) -> Result<MediaKind> {
    match raw {
        "photo" => Ok(MediaKind::Photo),
        "video" => Ok(MediaKind::Video),
        "audio" => Ok(MediaKind::Audio),
        "other" => Ok(MediaKind::Other),
        other => Err(ContractError::Backend(format!("corrupt media_kind {other:?}"))),
    }
}

pub(crate) fn group_status_to_str(status: GroupStatus) -> &'static str {
    match status {
        GroupStatus::Open => "open",
        GroupStatus::Resolved => "resolved",
        GroupStatus::Ignored => "ignored",
    }
}

pub(crate) fn group_status_from_str(raw: &str) -> Result<GroupStatus> {
    match raw {
        "open" => Ok(GroupStatus::Open),
        "resolved" => Ok(GroupStatus::Resolved),
        "ignored" => Ok(GroupStatus::Ignored),
        other => Err(ContractError::Backend(format!("corrupt group status {other:?}"))),
    }
}

pub(crate) fn transaction_status_to_str(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Staged => "staged",
        TransactionStatus::Committed => "committed",
        TransactionStatus::RolledBack => "rolled_back",
        TransactionStatus::Finalized => "finalized",
        TransactionStatus::Reaped => "reaped",
    }
}

pub(crate) fn transaction_status_from_str(raw: &str) -> Result<TransactionStatus> {
    match raw {
        "staged" => Ok(TransactionStatus::Staged),
        "committed" => Ok(TransactionStatus::Committed),
        "rolled_back" => Ok(TransactionStatus::RolledBack),
        "finalized" => Ok(TransactionStatus::Finalized),
        "reaped" => Ok(TransactionStatus::Reaped),
        other => Err(ContractError::Backend(format!("corrupt transaction status {other:?}"))),
    }
}

pub(crate) fn image_algorithm_to_str(algorithm: ImageHashAlgorithm) -> &'static str {
    match algorithm {
        ImageHashAlgorithm::DHash => "dhash",
        ImageHashAlgorithm::PHash => "phash",
    }
}

pub(crate) fn image_algorithm_from_str(raw: &str) -> Result<ImageHashAlgorithm> {
    match raw {
        "dhash" => Ok(ImageHashAlgorithm::DHash),
        "phash" => Ok(ImageHashAlgorithm::PHash),
        other => Err(ContractError::Backend(format!("corrupt hash algorithm {other:?}"))),
    }
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ContractError::Backend(format!("serialize failed: {e}")))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| ContractError::Backend(format!("corrupt json column: {e}")))
}
