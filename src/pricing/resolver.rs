//! Rate resolution against a pinned snapshot
//!
//! Walks the cost graph in canonical order and prices every
//! non-symbolic unit: cache first, then the store through the
//! connection pool, with bounded retries for transient failures.
//! A missing rate is a confidence decay and a symbolic conversion,
//! never a substituted number. The store calls are the only
//! suspension points and honor the cancellation token.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::confidence::{DecayEvent, DecayRule, DecayTracker};
use crate::engine::Mode;
use crate::error::EngineError;
use crate::graph::CostGraph;
use crate::money::{Currency, Money};

use super::cache::RateCache;
use super::store::{SnapshotStore, StoreError, StorePool};
use super::{Rate, RateKey, SnapshotInfo};

/// Resolution limits
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Per-request pricing deadline
    pub deadline: Duration,

    /// Retry attempts for transient store failures
    pub max_retries: u32,

    /// Base backoff, doubled per attempt
    pub backoff_base: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(10),
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
        }
    }
}

/// What pricing did to the graph
#[derive(Debug, Default)]
pub struct PricingOutcome {
    pub decay_events: Vec<DecayEvent>,

    /// Units that became symbolic because no rate was found
    pub missing_rates: usize,

    /// Units that became symbolic because the deadline passed
    pub timed_out: usize,
}

enum Fetch {
    Found(Rate),
    Missing,
    TimedOut,
    Fatal(StoreError),
}

/// Prices cost graphs. Shares its cache and pool across estimations.
pub struct PricingResolver<S: SnapshotStore> {
    store: Arc<S>,
    cache: Arc<RateCache>,
    pool: Arc<StorePool>,
    config: ResolverConfig,
}

impl<S: SnapshotStore> PricingResolver<S> {
    pub fn new(
        store: Arc<S>,
        cache: Arc<RateCache>,
        pool: Arc<StorePool>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            cache,
            pool,
            config,
        }
    }

    /// Resolve every unit in the graph against `snapshot`.
    pub async fn resolve(
        &self,
        graph: &mut CostGraph,
        snapshot: &SnapshotInfo,
        mode: Mode,
        cancel: &CancellationToken,
    ) -> Result<PricingOutcome, EngineError> {
        let started = Instant::now();
        let now = Utc::now();
        let snapshot_stale = snapshot.is_stale(now);
        let mut outcome = PricingOutcome::default();
        let mut currency: Option<Currency> = None;

        for address in graph.addresses_ordered() {
            let Some(slot) = graph.units_of_mut(&address) else {
                continue;
            };
            let mut units = std::mem::take(slot);

            for unit in &mut units {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled(
                        "estimation cancelled during pricing".to_string(),
                    ));
                }

                if unit.is_symbolic {
                    // best-effort bound pricing; failures leave the
                    // bound unset, they never fail the estimation
                    if let Some(bound_q) = unit.bound_quantity {
                        if let Some(rate) = self.lookup_quietly(snapshot, &unit.rate_key).await {
                            unit.bound_amount =
                                Some(Money::from_decimal(rate.price(bound_q), rate.currency));
                        }
                    }
                    continue;
                }

                let Some(quantity) = unit.quantity else {
                    continue;
                };

                let fetch = match self.cache.get(&snapshot.snapshot_id, &unit.rate_key) {
                    Some(rate) => Fetch::Found(rate),
                    None => {
                        self.fetch_with_retry(snapshot, &unit.rate_key, started, cancel)
                            .await
                    }
                };

                match fetch {
                    Fetch::Found(rate) => {
                        self.cache.put(rate.clone());
                        let amount = Money::from_decimal(rate.price(quantity), rate.currency);
                        if let Some(expected) = currency {
                            if expected != rate.currency {
                                return Err(EngineError::Internal(format!(
                                    "currency mismatch across rates: {} vs {}",
                                    expected, rate.currency
                                )));
                            }
                        }
                        currency = Some(rate.currency);
                        unit.amount = Some(amount);
                        unit.snapshot_id = Some(rate.snapshot_id.clone());

                        if snapshot_stale || rate.is_stale(now) {
                            let mut tracker =
                                DecayTracker::new(unit.confidence, unit.address.clone());
                            unit.confidence = tracker.apply(
                                DecayRule::StaleSnapshot,
                                format!("snapshot {} past its window", snapshot.snapshot_id),
                            );
                            outcome.decay_events.extend(tracker.into_events());
                        }
                    }
                    Fetch::Missing => {
                        let summary = unit.rate_key.summary();
                        debug!(address = %unit.address, key = %summary, "no rate found");
                        let mut tracker = DecayTracker::new(unit.confidence, unit.address.clone());
                        unit.confidence = tracker
                            .apply(DecayRule::MissingRate, format!("no rate found for {summary}"));
                        outcome.decay_events.extend(tracker.into_events());
                        unit.make_symbolic(format!("no rate found for {summary}"));
                        outcome.missing_rates += 1;
                    }
                    Fetch::TimedOut => {
                        if mode == Mode::Strict {
                            return Err(EngineError::PricingUnavailable(format!(
                                "pricing deadline exceeded after {:?}",
                                self.config.deadline
                            )));
                        }
                        let summary = unit.rate_key.summary();
                        warn!(address = %unit.address, key = %summary, "rate lookup timed out");
                        let mut tracker = DecayTracker::new(unit.confidence, unit.address.clone());
                        unit.confidence = tracker.apply(
                            DecayRule::MissingRate,
                            format!("rate lookup timed out for {summary}"),
                        );
                        outcome.decay_events.extend(tracker.into_events());
                        unit.make_symbolic(format!("rate lookup timed out for {summary}"));
                        outcome.timed_out += 1;
                    }
                    Fetch::Fatal(err) => {
                        if mode == Mode::Strict {
                            return Err(EngineError::PricingUnavailable(err.to_string()));
                        }
                        let summary = unit.rate_key.summary();
                        warn!(address = %unit.address, error = %err, "pricing store failure");
                        let mut tracker = DecayTracker::new(unit.confidence, unit.address.clone());
                        unit.confidence = tracker.apply(
                            DecayRule::MissingRate,
                            format!("pricing store unavailable for {summary}"),
                        );
                        outcome.decay_events.extend(tracker.into_events());
                        unit.make_symbolic(format!("pricing store unavailable for {summary}"));
                        outcome.missing_rates += 1;
                    }
                }
            }

            if let Some(slot) = graph.units_of_mut(&address) {
                *slot = units;
            }
        }

        graph.set_currency(currency.unwrap_or_default());
        Ok(outcome)
    }

    /// One cache/store lookup with no retries; used for bounds.
    async fn lookup_quietly(&self, snapshot: &SnapshotInfo, key: &RateKey) -> Option<Rate> {
        if let Some(rate) = self.cache.get(&snapshot.snapshot_id, key) {
            return Some(rate);
        }
        let _permit = self.pool.acquire().await.ok()?;
        let rate = self
            .store
            .get_rate(&snapshot.snapshot_id, key)
            .await
            .ok()
            .flatten()?;
        self.cache.put(rate.clone());
        Some(rate)
    }

    /// Store lookup with exponential backoff, bounded by the request
    /// deadline. Transient errors retry; the rest surface.
    async fn fetch_with_retry(
        &self,
        snapshot: &SnapshotInfo,
        key: &RateKey,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Fetch {
        for attempt in 0..=self.config.max_retries {
            if cancel.is_cancelled() {
                return Fetch::TimedOut;
            }
            if started.elapsed() >= self.config.deadline {
                return Fetch::TimedOut;
            }

            let permit = match self.pool.acquire().await {
                Ok(p) => p,
                Err(err) if err.is_transient() => {
                    tokio::time::sleep(self.backoff(attempt)).await;
                    continue;
                }
                Err(err) => return Fetch::Fatal(err),
            };

            let result = self.store.get_rate(&snapshot.snapshot_id, key).await;
            drop(permit);

            match result {
                Ok(Some(rate)) => return Fetch::Found(rate),
                Ok(None) => return Fetch::Missing,
                Err(err) if err.is_transient() => {
                    debug!(attempt, error = %err, "transient store failure, backing off");
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
                Err(err) => return Fetch::Fatal(err),
            }
        }
        Fetch::TimedOut
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_base * 2u32.saturating_pow(attempt)
    }
}
