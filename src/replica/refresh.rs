use super::local_db::LocalDb;
use crate::library_store::{LibraryDelta, LibraryStore, SqliteLibraryStore, StoreError};

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Where a replica pulls its deltas from.
#[async_trait]
pub trait DeltaSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every change and tombstone with a timestamp at or after `from_ts`.
    async fn fetch_delta(&self, from_ts: i64) -> Result<LibraryDelta, Self::Error>;
}

#[async_trait]
impl DeltaSource for SqliteLibraryStore {
    type Error = StoreError;

    async fn fetch_delta(&self, from_ts: i64) -> Result<LibraryDelta, StoreError> {
        self.read_delta(from_ts)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub from_ts: i64,
    pub watermark: i64,
    pub upserts: usize,
    pub deletes: usize,
}

/// A [`LocalDb`] kept in sync with a [`DeltaSource`].
///
/// Readers take a snapshot and keep it as long as they like; a refresh
/// builds the next state on a copy and swaps it in, so a snapshot is always
/// either entirely before or entirely after a refresh.
pub struct LocalReplica<S> {
    source: S,
    snapshot: RwLock<Arc<LocalDb>>,
    refresh_guard: tokio::sync::Mutex<()>,
}

impl<S: DeltaSource> LocalReplica<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(LocalDb::new())),
            refresh_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn snapshot(&self) -> Arc<LocalDb> {
        self.snapshot.read().unwrap().clone()
    }

    pub fn watermark(&self) -> i64 {
        self.snapshot().watermark
    }

    /// Pulls everything changed since the watermark and folds it in. At most
    /// one refresh runs at a time; a failed fetch leaves the replica as it was.
    pub async fn refresh(&self) -> Result<RefreshOutcome, S::Error> {
        let _guard = self.refresh_guard.lock().await;
        let current = self.snapshot();
        let from_ts = current.watermark;

        let delta = match self.source.fetch_delta(from_ts).await {
            Ok(delta) => delta,
            Err(err) => {
                warn!("Refresh from {} failed: {}", from_ts, err);
                return Err(err);
            }
        };
        for (kind, count) in delta.counts_by_kind() {
            if count > 0 {
                debug!("Delta from {}: {} {} entries", from_ts, count, kind);
            }
        }

        let mut next = (*current).clone();
        let stats = next.apply_delta(&delta);
        let outcome = RefreshOutcome {
            from_ts,
            watermark: next.watermark,
            upserts: stats.upserts,
            deletes: stats.deletes,
        };
        *self.snapshot.write().unwrap() = Arc::new(next);

        info!(
            "Refreshed replica: {} upserts, {} deletes, watermark {} -> {}",
            outcome.upserts, outcome.deletes, from_ts, outcome.watermark
        );
        Ok(outcome)
    }
}
