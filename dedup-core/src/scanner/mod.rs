pub mod excludes;
pub mod walker;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use dedup_contracts::error::Result;
use dedup_contracts::scan::{ScanDriver, ScanEvent, ScanOptions};
use dedup_contracts::store::StoreReadPort;

use crate::fs::FileSystem;

use self::walker::Walker;

/// Default [`ScanDriver`] implementation, gluing a [`FileSystem`]
/// abstraction to the persistent store's read port.
pub struct Scanner<F: FileSystem> {
    walker: Walker<F>,
    cancel: CancellationToken,
}

impl<F: FileSystem + 'static> Scanner<F> {
    pub fn new(fs: Arc<F>, store: Arc<dyn StoreReadPort>) -> Self {
        let cancel = CancellationToken::new();
        Self {
            walker: Walker::new(fs, store, cancel.clone()),
            cancel,
        }
    }

    /// Requests cancellation of any in-flight scan. Events already queued
    /// are still delivered; the walker stops enumerating new entries.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl<F: FileSystem + 'static> ScanDriver for Scanner<F> {
    type EventStream = ReceiverStream<ScanEvent>;

    async fn scan(&self, options: ScanOptions) -> Result<Self::EventStream> {
        Ok(self.walker.scan(options).await)
    }
}
