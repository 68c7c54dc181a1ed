//! RocksDB-backed snapshot store
//!
//! Storage design:
//! - **Key format**: `meta:{snapshot_id}` for snapshot metadata,
//!   `rate:{snapshot_id}:{canonical_rate_key}` for rates
//! - **Value format**: MessagePack via rmp-serde
//! - **Query pattern**: point lookups per rate, prefix scan for
//!   snapshot listings
//! - **Append-only**: ingesting an existing snapshot id is refused;
//!   superseded snapshots stay until explicitly cleaned up

use rocksdb::{Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

use super::store::{SnapshotStore, StoreError};
use super::{Rate, RateKey, SnapshotInfo};

const META_PREFIX: &str = "meta:";
const RATE_PREFIX: &str = "rate:";

/// RocksDB handle for pricing snapshots
#[derive(Clone)]
pub struct DiskSnapshotStore {
    db: Arc<DB>,
}

impl DiskSnapshotStore {
    /// Open (or create) the store at `path`.
    ///
    /// Rates are written once per snapshot and read many times, so
    /// the options favor point-lookup reads with Zstd compression.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        // prefix covers "rate:" plus the start of a snapshot id
        opts.set_prefix_extractor(rocksdb::SliceTransform::create_fixed_prefix(10));

        let db = DB::open(&opts, path)
            .map_err(|e| StoreError::Unavailable(format!("rocksdb open: {e}")))?;
        Ok(Self { db: Arc::new(db) })
    }

    fn meta_key(snapshot_id: &str) -> String {
        format!("{META_PREFIX}{snapshot_id}")
    }

    fn rate_key(snapshot_id: &str, key: &RateKey) -> String {
        format!("{RATE_PREFIX}{snapshot_id}:{}", key.canonical())
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        rmp_serde::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn blocking_list(db: &DB) -> Result<Vec<SnapshotInfo>, StoreError> {
        let mut snapshots = Vec::new();
        let iter = db.prefix_iterator(META_PREFIX.as_bytes());
        for item in iter {
            let (key, value) =
                item.map_err(|e| StoreError::Unavailable(format!("rocksdb iterate: {e}")))?;
            if !key.starts_with(META_PREFIX.as_bytes()) {
                break;
            }
            snapshots.push(Self::decode::<SnapshotInfo>(&value)?);
        }
        snapshots.sort_by(|a, b| {
            (a.created_at, &a.snapshot_id).cmp(&(b.created_at, &b.snapshot_id))
        });
        Ok(snapshots)
    }

    /// Delete snapshots created before `cutoff_secs` ago, keeping at
    /// least the most recent one. Returns the number removed.
    pub async fn cleanup_superseded(&self, cutoff_secs: i64) -> Result<usize, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let cutoff = chrono::Utc::now() - chrono::Duration::seconds(cutoff_secs);
            let snapshots = Self::blocking_list(&db)?;
            let keep_latest = snapshots.last().map(|s| s.snapshot_id.clone());

            let mut batch = WriteBatch::default();
            let mut removed = 0usize;
            for info in &snapshots {
                if Some(&info.snapshot_id) == keep_latest.as_ref() || info.created_at >= cutoff {
                    continue;
                }
                batch.delete(Self::meta_key(&info.snapshot_id).as_bytes());
                let prefix = format!("{RATE_PREFIX}{}:", info.snapshot_id);
                let iter = db.prefix_iterator(prefix.as_bytes());
                for item in iter {
                    let (key, _) = item
                        .map_err(|e| StoreError::Unavailable(format!("rocksdb iterate: {e}")))?;
                    if !key.starts_with(prefix.as_bytes()) {
                        break;
                    }
                    batch.delete(&key);
                }
                removed += 1;
            }
            if removed > 0 {
                db.write(batch)
                    .map_err(|e| StoreError::Unavailable(format!("rocksdb write: {e}")))?;
            }
            Ok(removed)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task: {e}")))?
    }
}

impl SnapshotStore for DiskSnapshotStore {
    async fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<SnapshotInfo>, StoreError> {
        let db = self.db.clone();
        let key = Self::meta_key(snapshot_id);
        tokio::task::spawn_blocking(move || {
            match db
                .get(key.as_bytes())
                .map_err(|e| StoreError::Unavailable(format!("rocksdb read: {e}")))?
            {
                Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task: {e}")))?
    }

    async fn latest_snapshot(&self) -> Result<Option<SnapshotInfo>, StoreError> {
        Ok(self.list_snapshots().await?.into_iter().next_back())
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || Self::blocking_list(&db))
            .await
            .map_err(|e| StoreError::Unavailable(format!("blocking task: {e}")))?
    }

    async fn get_rate(
        &self,
        snapshot_id: &str,
        key: &RateKey,
    ) -> Result<Option<Rate>, StoreError> {
        let db = self.db.clone();
        let meta_key = Self::meta_key(snapshot_id);
        let rate_key = Self::rate_key(snapshot_id, key);
        tokio::task::spawn_blocking(move || {
            let meta = db
                .get(meta_key.as_bytes())
                .map_err(|e| StoreError::Unavailable(format!("rocksdb read: {e}")))?;
            if meta.is_none() {
                let id = meta_key.trim_start_matches(META_PREFIX).to_string();
                return Err(StoreError::SnapshotNotFound(id));
            }
            match db
                .get(rate_key.as_bytes())
                .map_err(|e| StoreError::Unavailable(format!("rocksdb read: {e}")))?
            {
                Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task: {e}")))?
    }

    async fn put_snapshot(
        &self,
        info: SnapshotInfo,
        rates: Vec<Rate>,
    ) -> Result<(), StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let meta_key = Self::meta_key(&info.snapshot_id);
            let existing = db
                .get(meta_key.as_bytes())
                .map_err(|e| StoreError::Unavailable(format!("rocksdb read: {e}")))?;
            if existing.is_some() {
                return Err(StoreError::SnapshotExists(info.snapshot_id.clone()));
            }

            let mut batch = WriteBatch::default();
            batch.put(meta_key.as_bytes(), Self::encode(&info)?);
            for rate in &rates {
                batch.put(
                    Self::rate_key(&info.snapshot_id, &rate.key).as_bytes(),
                    Self::encode(rate)?,
                );
            }
            db.write(batch)
                .map_err(|e| StoreError::Unavailable(format!("rocksdb write: {e}")))
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn snapshot(id: &str, age_days: i64) -> SnapshotInfo {
        SnapshotInfo {
            snapshot_id: id.to_string(),
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            profile: "on_demand".to_string(),
            created_at: Utc::now() - chrono::Duration::days(age_days),
            effective_from: Utc::now() - chrono::Duration::days(age_days),
            effective_to: None,
        }
    }

    fn rate(snapshot_id: &str, instance_type: &str) -> Rate {
        Rate {
            key: RateKey::new("aws", "AmazonEC2", "us-east-1")
                .with_attr("instanceType", instance_type),
            unit_price: Decimal::new(96, 3),
            currency: Currency::Usd,
            billing_unit: "Hrs".to_string(),
            tiers: vec![],
            effective_from: Utc::now(),
            effective_to: None,
            snapshot_id: snapshot_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = DiskSnapshotStore::new(dir.path()).unwrap();

        store
            .put_snapshot(snapshot("snap-1", 1), vec![rate("snap-1", "m5.large")])
            .await
            .unwrap();

        let key =
            RateKey::new("aws", "AmazonEC2", "us-east-1").with_attr("instanceType", "m5.large");
        let found = store.get_rate("snap-1", &key).await.unwrap().unwrap();
        assert_eq!(found.unit_price, Decimal::new(96, 3));
        assert_eq!(found.snapshot_id, "snap-1");

        let listed = store.list_snapshots().await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_append_only_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = DiskSnapshotStore::new(dir.path()).unwrap();

        store.put_snapshot(snapshot("snap-1", 1), vec![]).await.unwrap();
        let err = store
            .put_snapshot(snapshot("snap-1", 0), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SnapshotExists(_)));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_latest_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = DiskSnapshotStore::new(dir.path()).unwrap();

        store
            .put_snapshot(snapshot("snap-old", 30), vec![rate("snap-old", "m5.large")])
            .await
            .unwrap();
        store
            .put_snapshot(snapshot("snap-new", 1), vec![rate("snap-new", "m5.large")])
            .await
            .unwrap();

        // everything older than 7 days goes, except the latest
        let removed = store.cleanup_superseded(7 * 24 * 3600).await.unwrap();
        assert_eq!(removed, 1);

        assert!(store.get_snapshot("snap-old").await.unwrap().is_none());
        assert!(store.get_snapshot("snap-new").await.unwrap().is_some());
    }
}
