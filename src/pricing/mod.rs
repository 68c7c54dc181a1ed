//! Pricing data model and rate resolution
//!
//! Rates live in immutable, identified snapshots. A [`RateKey`] is a
//! lookup coordinate only; prices appear exclusively on [`Rate`]s
//! read from a pinned snapshot. A new snapshot supersedes an old one
//! by identity, never by mutation.

pub mod cache;
#[cfg(feature = "disk_store")]
pub mod disk;
pub mod resolver;
pub mod store;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::Currency;

/// Canonical identifier of one pricing dimension.
///
/// Equality is structural over the attribute set, independent of
/// insertion order (the map is ordered by key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RateKey {
    pub provider_id: String,
    pub service: String,
    pub region: String,
    pub attributes: BTreeMap<String, String>,
}

impl RateKey {
    pub fn new(provider_id: &str, service: &str, region: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Stable string form used as a storage/cache key.
    pub fn canonical(&self) -> String {
        let attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!(
            "{}/{}/{}/{}",
            self.provider_id,
            self.service,
            self.region,
            attrs.join(",")
        )
    }

    /// Short human form for messages, e.g. missing-rate reasons.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            self.provider_id.clone(),
            self.service.clone(),
            self.region.clone(),
        ];
        parts.extend(self.attributes.values().cloned());
        parts.join(" ")
    }
}

/// One tier of a tiered price: `up_to` is the inclusive quantity
/// ceiling for this tier, `None` for the unbounded last tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    pub up_to: Option<Decimal>,
    pub unit_price: Decimal,
}

/// An immutable rate read from a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    pub key: RateKey,

    /// Flat unit price; ignored when `tiers` is non-empty
    pub unit_price: Decimal,

    pub currency: Currency,

    /// Billing unit the price applies to, e.g. "Hrs" or "GB-Mo"
    pub billing_unit: String,

    /// Ordered tiers for tiered pricing (empty for flat rates)
    #[serde(default)]
    pub tiers: Vec<PriceTier>,

    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,

    /// Identity of the snapshot this rate was read from
    pub snapshot_id: String,
}

impl Rate {
    /// Whether the rate's effective window has closed as of `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        matches!(self.effective_to, Some(end) if end < now)
    }

    /// Price a quantity, traversing tiers in order until exhausted.
    pub fn price(&self, quantity: Decimal) -> Decimal {
        if self.tiers.is_empty() {
            return quantity * self.unit_price;
        }

        let mut remaining = quantity;
        let mut consumed = Decimal::ZERO;
        let mut total = Decimal::ZERO;
        for tier in &self.tiers {
            if remaining <= Decimal::ZERO {
                break;
            }
            let in_tier = match tier.up_to {
                Some(ceiling) => {
                    let capacity = (ceiling - consumed).max(Decimal::ZERO);
                    remaining.min(capacity)
                }
                None => remaining,
            };
            total += in_tier * tier.unit_price;
            consumed += in_tier;
            remaining -= in_tier;
        }
        total
    }
}

/// Identity and metadata of one pricing snapshot.
///
/// Snapshots are addressed by `(provider, region, profile,
/// snapshot_id)` and are append-only in the store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotInfo {
    pub snapshot_id: String,
    pub provider: String,
    pub region: String,
    pub profile: String,
    pub created_at: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

impl SnapshotInfo {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        matches!(self.effective_to, Some(end) if end < now)
    }
}

/// On-disk/JSON interchange form of one snapshot with its rates;
/// used by snapshot ingestion at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub info: SnapshotInfo,
    pub rates: Vec<Rate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_rate_key_equality_ignores_insertion_order() {
        let a = RateKey::new("aws", "AmazonEC2", "us-east-1")
            .with_attr("instanceType", "m5.large")
            .with_attr("operatingSystem", "Linux");
        let b = RateKey::new("aws", "AmazonEC2", "us-east-1")
            .with_attr("operatingSystem", "Linux")
            .with_attr("instanceType", "m5.large");

        assert_eq!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_flat_pricing() {
        let rate = Rate {
            key: RateKey::new("aws", "AmazonEC2", "us-east-1"),
            unit_price: dec("0.096"),
            currency: Currency::Usd,
            billing_unit: "Hrs".to_string(),
            tiers: vec![],
            effective_from: Utc::now(),
            effective_to: None,
            snapshot_id: "snap-1".to_string(),
        };

        assert_eq!(rate.price(dec("730")), dec("70.080"));
    }

    #[test]
    fn test_tiered_pricing_accumulates_by_tier() {
        let rate = Rate {
            key: RateKey::new("aws", "AmazonS3", "us-east-1"),
            unit_price: Decimal::ZERO,
            currency: Currency::Usd,
            billing_unit: "GB-Mo".to_string(),
            tiers: vec![
                PriceTier {
                    up_to: Some(dec("50")),
                    unit_price: dec("0.023"),
                },
                PriceTier {
                    up_to: Some(dec("450")),
                    unit_price: dec("0.022"),
                },
                PriceTier {
                    up_to: None,
                    unit_price: dec("0.021"),
                },
            ],
            effective_from: Utc::now(),
            effective_to: None,
            snapshot_id: "snap-1".to_string(),
        };

        // 100 GB: 50 @ 0.023 + 50 @ 0.022
        assert_eq!(rate.price(dec("100")), dec("2.250"));
        // 500 GB: 50 @ 0.023 + 400 @ 0.022 + 50 @ 0.021
        assert_eq!(rate.price(dec("500")), dec("11.000"));
    }

    #[test]
    fn test_staleness_window() {
        let mut rate = Rate {
            key: RateKey::new("aws", "AmazonEC2", "us-east-1"),
            unit_price: dec("1"),
            currency: Currency::Usd,
            billing_unit: "Hrs".to_string(),
            tiers: vec![],
            effective_from: Utc::now() - chrono::Duration::days(30),
            effective_to: None,
            snapshot_id: "snap-1".to_string(),
        };
        assert!(!rate.is_stale(Utc::now()));

        rate.effective_to = Some(Utc::now() - chrono::Duration::days(1));
        assert!(rate.is_stale(Utc::now()));
    }
}
