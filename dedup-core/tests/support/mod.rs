//! Shared fixtures for `dedup-core`'s integration tests: one support
//! module, one file per subsystem, everything run against a real
//! in-process SQLite database rather than a mock store.

use std::sync::Arc;

use dedup_contracts::store::{StoreReadPort, StoreWritePort};
use dedup_core::store::SqliteStore;

/// A fresh, migrated, empty database backing both store ports.
pub async fn open_store() -> Arc<SqliteStore> {
    let pool = dedup_core::open_store("sqlite::memory:")
        .await
        .expect("in-memory sqlite store should always open");
    Arc::new(SqliteStore::new(pool))
}

/// Casts one [`SqliteStore`] handle to both port trait objects, the way a
/// real caller wires `Scanner`/`DetectionEngine`/`MergeEngine` together.
pub fn as_ports(store: &Arc<SqliteStore>) -> (Arc<dyn StoreReadPort>, Arc<dyn StoreWritePort>) {
    (store.clone() as Arc<dyn StoreReadPort>, store.clone() as Arc<dyn StoreWritePort>)
}
