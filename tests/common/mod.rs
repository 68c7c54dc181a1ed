//! Shared fixtures for integration tests

use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use terracost::engine::{catalog_hash, Engine};
use terracost::mapper::registry::builtin_registry;
use terracost::money::Currency;
use terracost::pricing::cache::RateCache;
use terracost::pricing::resolver::ResolverConfig;
use terracost::pricing::store::{MemorySnapshotStore, SnapshotStore, StorePool};
use terracost::pricing::{Rate, RateKey, SnapshotInfo};

pub fn snapshot(id: &str, age_days: i64) -> SnapshotInfo {
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

pub fn ec2_rate(snapshot_id: &str, hourly_price: &str) -> Rate {
    Rate {
        key: RateKey::new("aws", "AmazonEC2", "us-east-1")
            .with_attr("instanceType", "m5.large")
            .with_attr("operatingSystem", "Linux")
            .with_attr("tenancy", "Shared"),
        unit_price: Decimal::from_str(hourly_price).unwrap(),
        currency: Currency::Usd,
        billing_unit: "Hrs".to_string(),
        tiers: vec![],
        effective_from: Utc::now() - chrono::Duration::days(1),
        effective_to: None,
        snapshot_id: snapshot_id.to_string(),
    }
}

pub async fn engine_with(
    snap: SnapshotInfo,
    rates: Vec<Rate>,
) -> Engine<MemorySnapshotStore> {
    let store = Arc::new(MemorySnapshotStore::new());
    store.put_snapshot(snap, rates).await.unwrap();
    engine_over(store)
}

pub fn engine_over(store: Arc<MemorySnapshotStore>) -> Engine<MemorySnapshotStore> {
    let registry = Arc::new(builtin_registry().expect("catalog loads"));
    let cache = Arc::new(RateCache::new(3600, 1, &catalog_hash(&registry)));
    let pool = Arc::new(StorePool::new(4, Duration::from_millis(500)));
    Engine::new(registry, store, cache, pool, ResolverConfig::default())
}

/// A single m5.large in us-east-1 with no expansion tricks.
pub fn single_ec2_plan() -> serde_json::Value {
    serde_json::json!({
        "region": "us-east-1",
        "resources": [
            {
                "address": "aws_instance.web",
                "type": "aws_instance",
                "provider": "aws",
                "values": {"instance_type": "m5.large"}
            }
        ]
    })
}
