//! Pricing snapshot store surface
//!
//! The store is an external collaborator: the engine only consumes
//! this trait. Snapshots are append-only and addressed by identity;
//! nothing here mutates a rate in place. Store access is the single
//! async boundary in the crate, and it is bounded by [`StorePool`]
//! (permits with an acquire timeout).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::time::timeout;
use tracing::warn;

use super::{Rate, RateKey, SnapshotInfo};

/// Store access errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("snapshot already exists: {0}")]
    SnapshotExists(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store connection acquire timed out after {0:?}")]
    AcquireTimeout(Duration),

    #[error("encoding error: {0}")]
    Encode(String),
}

impl StoreError {
    /// Transient failures are retried with backoff; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::AcquireTimeout(_)
        )
    }
}

/// Read surface of the pricing snapshot store plus append-only
/// ingestion. All implementations must be safe to share across
/// concurrent estimations; the `Send` bounds on the returned futures
/// keep callers usable from multi-threaded servers.
pub trait SnapshotStore: Send + Sync {
    fn get_snapshot(
        &self,
        snapshot_id: &str,
    ) -> impl Future<Output = Result<Option<SnapshotInfo>, StoreError>> + Send;

    /// Most recently created snapshot, if any.
    fn latest_snapshot(
        &self,
    ) -> impl Future<Output = Result<Option<SnapshotInfo>, StoreError>> + Send;

    fn list_snapshots(&self)
        -> impl Future<Output = Result<Vec<SnapshotInfo>, StoreError>> + Send;

    fn get_rate(
        &self,
        snapshot_id: &str,
        key: &RateKey,
    ) -> impl Future<Output = Result<Option<Rate>, StoreError>> + Send;

    /// Ingest a snapshot with its rates. Fails if the id exists;
    /// snapshots supersede by identity, never by mutation.
    fn put_snapshot(
        &self,
        info: SnapshotInfo,
        rates: Vec<Rate>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory snapshot store; the unit-test substrate and the fallback
/// when no data directory is configured.
#[derive(Default)]
pub struct MemorySnapshotStore {
    // snapshot_id -> (info, canonical rate key -> rate)
    inner: RwLock<HashMap<String, (SnapshotInfo, HashMap<String, Rate>)>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<SnapshotInfo>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .get(snapshot_id)
            .map(|(info, _)| info.clone()))
    }

    async fn latest_snapshot(&self) -> Result<Option<SnapshotInfo>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .map(|(info, _)| info)
            .max_by_key(|info| (info.created_at, info.snapshot_id.clone()))
            .cloned())
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, StoreError> {
        let mut snapshots: Vec<SnapshotInfo> = self
            .inner
            .read()
            .await
            .values()
            .map(|(info, _)| info.clone())
            .collect();
        snapshots.sort_by(|a, b| {
            (a.created_at, &a.snapshot_id).cmp(&(b.created_at, &b.snapshot_id))
        });
        Ok(snapshots)
    }

    async fn get_rate(
        &self,
        snapshot_id: &str,
        key: &RateKey,
    ) -> Result<Option<Rate>, StoreError> {
        let inner = self.inner.read().await;
        let (_, rates) = inner
            .get(snapshot_id)
            .ok_or_else(|| StoreError::SnapshotNotFound(snapshot_id.to_string()))?;
        Ok(rates.get(&key.canonical()).cloned())
    }

    async fn put_snapshot(
        &self,
        info: SnapshotInfo,
        rates: Vec<Rate>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.contains_key(&info.snapshot_id) {
            return Err(StoreError::SnapshotExists(info.snapshot_id));
        }
        let by_key: HashMap<String, Rate> = rates
            .into_iter()
            .map(|r| (r.key.canonical(), r))
            .collect();
        inner.insert(info.snapshot_id.clone(), (info, by_key));
        Ok(())
    }
}

/// Bounded access to the store: a fixed number of permits and a
/// timeout on acquire. Lookups hold a permit for the duration of one
/// batch and release it on drop.
pub struct StorePool {
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl StorePool {
    pub fn new(size: usize, acquire_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
            acquire_timeout,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, StoreError> {
        match timeout(self.acquire_timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(StoreError::Unavailable("store pool closed".to_string())),
            Err(_) => {
                warn!(
                    timeout_ms = self.acquire_timeout.as_millis() as u64,
                    "store pool acquire timed out"
                );
                Err(StoreError::AcquireTimeout(self.acquire_timeout))
            }
        }
    }
}
