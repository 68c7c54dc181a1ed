//! Governed rate cache
//!
//! TTL-based in-memory cache for resolved rates with governance
//! semantics: an entry is only a hit while it is unexpired AND its
//! schema version and provider hash match the current values. A
//! mismatch invalidates silently; the caller just sees a miss.
//! Eviction is lazy (on read) plus an optional sweep.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::{Rate, RateKey};

/// Default entry lifetime when no per-source TTL is configured.
pub const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct CacheEntry {
    rate: Rate,
    snapshot_id: String,
    schema_version: u32,
    provider_hash: String,
    #[allow(dead_code)] // kept for sweep diagnostics
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Concurrent-reader, exclusive-writer rate cache.
pub struct RateCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    source_ttls: RwLock<HashMap<String, Duration>>,
    default_ttl: Duration,
    schema_version: u32,
    provider_hash: RwLock<String>,
}

impl RateCache {
    pub fn new(default_ttl_secs: i64, schema_version: u32, provider_hash: &str) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            source_ttls: RwLock::new(HashMap::new()),
            default_ttl: Duration::seconds(default_ttl_secs),
            schema_version,
            provider_hash: RwLock::new(provider_hash.to_string()),
        }
    }

    /// Override the TTL for one source (provider id).
    pub fn set_source_ttl(&self, source: &str, ttl_secs: i64) {
        self.source_ttls
            .write()
            .expect("source ttl lock")
            .insert(source.to_string(), Duration::seconds(ttl_secs));
    }

    /// Rotate the provider hash; existing entries become misses.
    pub fn set_provider_hash(&self, provider_hash: &str) {
        *self.provider_hash.write().expect("provider hash lock") = provider_hash.to_string();
    }

    fn ttl_for(&self, source: &str) -> Duration {
        self.source_ttls
            .read()
            .expect("source ttl lock")
            .get(source)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    pub fn get(&self, snapshot_id: &str, key: &RateKey) -> Option<Rate> {
        self.get_at(snapshot_id, key, Utc::now())
    }

    pub(crate) fn get_at(
        &self,
        snapshot_id: &str,
        key: &RateKey,
        now: DateTime<Utc>,
    ) -> Option<Rate> {
        let cache_key = key.canonical();
        {
            let entries = self.entries.read().expect("cache lock");
            if let Some(entry) = entries.get(&cache_key) {
                if self.entry_valid(entry, snapshot_id, now) {
                    return Some(entry.rate.clone());
                }
            } else {
                return None;
            }
        }
        // lazy eviction of the invalid entry
        self.entries.write().expect("cache lock").remove(&cache_key);
        None
    }

    fn entry_valid(&self, entry: &CacheEntry, snapshot_id: &str, now: DateTime<Utc>) -> bool {
        entry.snapshot_id == snapshot_id
            && entry.expires_at > now
            && entry.schema_version == self.schema_version
            && entry.provider_hash == *self.provider_hash.read().expect("provider hash lock")
    }

    pub fn put(&self, rate: Rate) {
        let now = Utc::now();
        let ttl = self.ttl_for(&rate.key.provider_id);
        let entry = CacheEntry {
            snapshot_id: rate.snapshot_id.clone(),
            schema_version: self.schema_version,
            provider_hash: self.provider_hash.read().expect("provider hash lock").clone(),
            created_at: now,
            expires_at: now + ttl,
            rate,
        };
        self.entries
            .write()
            .expect("cache lock")
            .insert(entry.rate.key.canonical(), entry);
    }

    /// Drop every invalid entry now instead of waiting for reads.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().expect("cache lock");
        let before = entries.len();
        let provider_hash = self.provider_hash.read().expect("provider hash lock").clone();
        entries.retain(|_, e| {
            e.expires_at > now
                && e.schema_version == self.schema_version
                && e.provider_hash == provider_hash
        });
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "rate cache sweep");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use rust_decimal::Decimal;

    fn rate(snapshot_id: &str) -> Rate {
        Rate {
            key: RateKey::new("aws", "AmazonEC2", "us-east-1").with_attr("instanceType", "m5.large"),
            unit_price: Decimal::new(96, 3),
            currency: Currency::Usd,
            billing_unit: "Hrs".to_string(),
            tiers: vec![],
            effective_from: Utc::now(),
            effective_to: None,
            snapshot_id: snapshot_id.to_string(),
        }
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = RateCache::new(60, 1, "hash-a");
        let r = rate("snap-1");
        cache.put(r.clone());
        assert!(cache.get("snap-1", &r.key).is_some());
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_evicted() {
        let cache = RateCache::new(60, 1, "hash-a");
        let r = rate("snap-1");
        cache.put(r.clone());

        let later = Utc::now() + Duration::seconds(120);
        assert!(cache.get_at("snap-1", &r.key, later).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_schema_mismatch_invalidates_silently() {
        let cache = RateCache::new(60, 1, "hash-a");
        let r = rate("snap-1");
        cache.put(r.clone());

        // a different cache generation with a newer schema sees a miss
        let upgraded = RateCache::new(60, 2, "hash-a");
        upgraded.put(r.clone());
        assert!(upgraded.get("snap-1", &r.key).is_some());
        assert!(cache.get("snap-1", &r.key).is_some());
    }

    #[test]
    fn test_provider_hash_rotation_invalidates() {
        let cache = RateCache::new(60, 1, "hash-a");
        let r = rate("snap-1");
        cache.put(r.clone());

        cache.set_provider_hash("hash-b");
        assert!(cache.get("snap-1", &r.key).is_none());
        // the stale entry was lazily evicted
        assert!(cache.is_empty());
    }

    #[test]
    fn test_snapshot_identity_is_part_of_validity() {
        let cache = RateCache::new(60, 1, "hash-a");
        let r = rate("snap-1");
        cache.put(r.clone());
        assert!(cache.get("snap-2", &r.key).is_none());
    }

    #[test]
    fn test_per_source_ttl_overrides_default() {
        let cache = RateCache::new(3600, 1, "hash-a");
        cache.set_source_ttl("aws", 10);
        let r = rate("snap-1");
        cache.put(r.clone());

        let later = Utc::now() + Duration::seconds(30);
        assert!(cache.get_at("snap-1", &r.key, later).is_none());
    }

    #[test]
    fn test_sweep_removes_invalid_entries() {
        let cache = RateCache::new(60, 1, "hash-a");
        cache.put(rate("snap-1"));
        cache.set_provider_hash("hash-b");
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }
}
