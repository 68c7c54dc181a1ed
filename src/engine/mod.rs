//! Estimation pipeline orchestrator
//!
//! Drives one request through scan → dependency graph → asset graph
//! → cost graph → invariants → pricing → coverage and policy, and
//! assembles the response with its audit metadata. The pipeline is
//! synchronous end to end; only pricing-store access suspends.

pub mod diff;
pub mod response;

pub use diff::{DiffRequest, DiffSide};
pub use response::{EstimateResponse, ResponseStatus};

use chrono::Utc;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::confidence::{DecayEvent, DecayRule};
use crate::coverage::policy::Policy;
use crate::coverage::WeightedCoverageReport;
use crate::error::{EngineError, Result};
use crate::graph::{
    invariants, AssetGraph, AssetNode, AttributeValue, Cardinality, CostGraph, DependencyGraph,
    ExpansionGuard, ProviderContext,
};
use crate::mapper::defaults::DefaultUsagePolicy;
use crate::mapper::registry::MapperRegistry;
use crate::mapper::{apply_emission_rules, Assumption, Cloud, CostUnit, UsageContext};
use crate::money::Money;
use crate::pricing::cache::RateCache;
use crate::pricing::resolver::{PricingResolver, ResolverConfig};
use crate::pricing::store::{SnapshotStore, StorePool};
use crate::pricing::SnapshotInfo;
use crate::scan::{input_hash, ExpansionValue, PlanScanner, RawAsset, Scanner};

/// Estimation strictness. Strictness selects policy outcomes, never
/// invariants: those are fatal in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Strict,
    Permissive,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Strict => "strict",
            Mode::Permissive => "permissive",
        }
    }
}

/// Caller-provided usage numbers: address or resource type → metric →
/// value
pub type UsageProfile = BTreeMap<String, BTreeMap<String, Decimal>>;

/// Response shaping options
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EstimateOptions {
    #[serde(default)]
    pub include_dependency_graph: bool,

    #[serde(default)]
    pub include_cost_lineage: bool,

    #[serde(default)]
    pub include_assumptions: bool,

    /// Policy preset name; `default` when omitted
    #[serde(default)]
    pub policy: Option<String>,
}

/// One estimation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRequest {
    /// Plan-shaped source document
    pub source: Value,

    pub mode: Mode,

    #[serde(default)]
    pub usage_profile: Option<UsageProfile>,

    #[serde(default)]
    pub options: EstimateOptions,

    /// Pin a specific snapshot; the store's latest when omitted
    #[serde(default)]
    pub pricing_snapshot_id: Option<String>,
}

/// The estimation engine. One instance serves many concurrent
/// estimations; the mapper registry and the rate cache are the only
/// shared state.
pub struct Engine<S: SnapshotStore> {
    registry: Arc<MapperRegistry>,
    store: Arc<S>,
    cache: Arc<RateCache>,
    pool: Arc<StorePool>,
    resolver_config: ResolverConfig,
    scanner: PlanScanner,
}

impl<S: SnapshotStore> Engine<S> {
    pub fn new(
        registry: Arc<MapperRegistry>,
        store: Arc<S>,
        cache: Arc<RateCache>,
        pool: Arc<StorePool>,
        resolver_config: ResolverConfig,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            pool,
            resolver_config,
            scanner: PlanScanner::new(),
        }
    }

    pub fn registry(&self) -> &Arc<MapperRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one estimation end to end.
    pub async fn estimate(
        &self,
        request: &EstimateRequest,
        cancel: &CancellationToken,
    ) -> Result<EstimateResponse> {
        let started = Instant::now();

        if !request.source.is_object() {
            return Err(EngineError::InvalidRequest(
                "source must be a JSON object".to_string(),
            ));
        }
        let policy = self.select_policy(&request.options)?;

        let normalized = normalized_input(request);
        let hash = input_hash(&normalized);
        debug!(input_hash = %hash, mode = request.mode.as_str(), "estimation started");

        // scan → dependency graph → seal/close
        let raw_assets = self.scanner.scan(&request.source)?;
        let (dep, guard, cardinality_rules) = build_dependency_graph(&raw_assets)?;

        // expansion guard → asset graph → cost graph
        let assets = build_asset_graph(dep, &raw_assets, &guard)?;
        let mut ctx = UsageContext::new(
            request.usage_profile.clone().unwrap_or_default(),
            DefaultUsagePolicy::strict(),
        );
        let (mut cost_graph, mut decay_events) =
            self.build_cost_graph(assets, &mut ctx, &cardinality_rules)?;

        // full invariant check before any price exists
        invariants::check_pre_pricing(&cost_graph)?;

        // pricing resolution against the pinned snapshot
        let snapshot = self.pin_snapshot(request.pricing_snapshot_id.as_deref()).await?;
        let resolver = PricingResolver::new(
            self.store.clone(),
            self.cache.clone(),
            self.pool.clone(),
            self.resolver_config.clone(),
        );
        let outcome = resolver
            .resolve(&mut cost_graph, &snapshot, request.mode, cancel)
            .await?;
        decay_events.extend(outcome.decay_events);
        invariants::check_post_pricing(&cost_graph, &snapshot.snapshot_id)?;

        // weighted coverage + policy enforcement
        let report = WeightedCoverageReport::build(
            &cost_graph,
            &self.registry,
            guard.unbounded().count(),
        )?;
        let policy_result = policy.enforce(&report, request.mode == Mode::Strict);

        let response = assemble_response(AssembleArgs {
            request,
            hash,
            snapshot: &snapshot,
            cost_graph: &cost_graph,
            guard: &guard,
            report: &report,
            policy_results: vec![policy_result],
            assumptions: ctx.take_assumptions(),
            decay_events: {
                decay_events.extend(ctx.take_decay_events());
                decay_events
            },
            duration_ms: started.elapsed().as_millis() as u64,
        })?;

        info!(
            input_hash = %response.metadata.input_hash,
            total = %response.summary.total_monthly_cost,
            confidence = response.summary.confidence,
            status = ?response.status,
            "estimation finished"
        );
        Ok(response)
    }

    fn select_policy(&self, options: &EstimateOptions) -> Result<Policy> {
        let name = options.policy.as_deref().unwrap_or("default");
        Policy::preset(name)
            .ok_or_else(|| EngineError::Validation(format!("unknown policy preset: {name}")))
    }

    async fn pin_snapshot(&self, requested: Option<&str>) -> Result<SnapshotInfo> {
        match requested {
            Some(id) => self
                .store
                .get_snapshot(id)
                .await?
                .ok_or_else(|| EngineError::PricingUnavailable(format!("snapshot not found: {id}"))),
            None => self
                .store
                .latest_snapshot()
                .await?
                .ok_or_else(|| {
                    EngineError::PricingUnavailable("no pricing snapshots ingested".to_string())
                }),
        }
    }

    fn build_cost_graph(
        &self,
        assets: AssetGraph,
        ctx: &mut UsageContext,
        cardinality_rules: &BTreeMap<String, (DecayRule, Option<u64>)>,
    ) -> Result<(CostGraph, Vec<DecayEvent>)> {
        let mut prepared: Vec<(String, String, Vec<CostUnit>)> = Vec::new();
        let mut unsupported: Vec<(String, String)> = Vec::new();
        let mut decay_events = Vec::new();

        for asset in assets.iter_ordered() {
            let mapper = Cloud::from_provider_id(&asset.provider.provider_id)
                .and_then(|cloud| self.registry.lookup(cloud, &asset.resource_type));
            let Some(mapper) = mapper else {
                debug!(address = %asset.address, resource_type = %asset.resource_type, "no mapper");
                unsupported.push((asset.address.clone(), asset.resource_type.clone()));
                continue;
            };

            let metadata = mapper.metadata();
            let usage = mapper.build_usage(asset, ctx)?;
            let units = mapper.build_cost_units(asset, &usage)?;
            let (rule, bound) = match cardinality_rules.get(&asset.address) {
                Some((rule, bound)) => (Some(*rule), *bound),
                None => (None, None),
            };
            let (units, events) =
                apply_emission_rules(asset, &metadata, &usage, units, rule, bound);
            decay_events.extend(events);
            prepared.push((asset.address.clone(), metadata.category, units));
        }

        let mut cost_graph = CostGraph::new_enforced(assets)?;
        for (address, category, units) in prepared {
            cost_graph.attach(&address, &category, units)?;
        }
        for (address, resource_type) in unsupported {
            cost_graph.record_unsupported(&address, &resource_type);
        }
        Ok((cost_graph, decay_events))
    }
}

/// The running engine's version, stamped into every response.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// The canonical, hash-relevant form of a request.
fn normalized_input(request: &EstimateRequest) -> Value {
    json!({
        "source": request.source,
        "mode": request.mode.as_str(),
        "usage_profile": request.usage_profile,
        "options": {
            "policy": request.options.policy.as_deref().unwrap_or("default"),
        },
    })
}

/// Stable hash of the mapper catalog; cache entries written under a
/// different catalog are silently invalid.
pub fn catalog_hash(registry: &MapperRegistry) -> String {
    let mut hasher = Sha256::new();
    for cloud in [Cloud::Aws, Cloud::Gcp, Cloud::Azure] {
        for md in registry.by_cloud(cloud) {
            hasher.update(md.cloud.as_str().as_bytes());
            hasher.update(md.resource_type.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

fn build_dependency_graph(
    raw_assets: &[RawAsset],
) -> Result<(
    DependencyGraph,
    ExpansionGuard,
    BTreeMap<String, (DecayRule, Option<u64>)>,
)> {
    let mut dep = DependencyGraph::new();
    let mut guard = ExpansionGuard::new();
    let mut rules = BTreeMap::new();

    for raw in raw_assets {
        dep.add_node(&raw.address)?;
        for target in &raw.depends_on {
            dep.add_edge(&raw.address, target)?;
        }

        if let Some(ExpansionValue::Unresolved {
            expression,
            upper_bound,
        }) = &raw.count
        {
            guard.record(&raw.address, expression, *upper_bound);
            rules.insert(raw.address.clone(), (DecayRule::UnknownCount, *upper_bound));
        }
        if let Some(ExpansionValue::Unresolved {
            expression,
            upper_bound,
        }) = &raw.for_each
        {
            guard.record(&raw.address, expression, *upper_bound);
            rules
                .entry(raw.address.clone())
                .or_insert((DecayRule::UnknownForEach, *upper_bound));
        }
    }

    dep.seal()?;
    dep.must_be_closed()?;
    Ok((dep, guard, rules))
}

fn cardinality_of(raw: &RawAsset, guard: &ExpansionGuard) -> Cardinality {
    if guard.is_blocked(&raw.address) {
        let reason = guard
            .blocked()
            .iter()
            .find(|b| b.address == raw.address)
            .map(|b| b.reason.clone())
            .unwrap_or_else(|| "unresolved expansion".to_string());
        return Cardinality::unknown(reason);
    }
    let count = match (&raw.count, &raw.for_each) {
        (Some(ExpansionValue::Resolved(n)), _) => *n,
        (None, Some(ExpansionValue::Resolved(n))) => *n,
        _ => 1,
    };
    Cardinality::known(count)
}

fn build_asset_graph(
    dep: DependencyGraph,
    raw_assets: &[RawAsset],
    guard: &ExpansionGuard,
) -> Result<AssetGraph> {
    let mut assets = AssetGraph::new_enforced(dep)?;
    for raw in raw_assets {
        let attributes = match AttributeValue::from_json(&raw.attributes) {
            Some(AttributeValue::Map(map)) => map,
            _ => BTreeMap::new(),
        };
        assets.add_asset(AssetNode {
            address: raw.address.clone(),
            resource_type: raw.resource_type.clone(),
            attributes,
            provider: ProviderContext {
                provider_id: raw.provider_id.clone(),
                alias: raw.provider_alias.clone(),
                region: raw.region.clone(),
                account_id: raw.account_id.clone(),
            },
            cardinality: cardinality_of(raw, guard),
            instance_key: None,
            children: vec![],
            tags: raw.tags.clone(),
        })?;
    }
    assets.finalize();
    Ok(assets)
}

struct AssembleArgs<'a> {
    request: &'a EstimateRequest,
    hash: String,
    snapshot: &'a SnapshotInfo,
    cost_graph: &'a CostGraph,
    guard: &'a ExpansionGuard,
    report: &'a WeightedCoverageReport,
    policy_results: Vec<crate::coverage::policy::PolicyResult>,
    assumptions: Vec<Assumption>,
    decay_events: Vec<DecayEvent>,
    duration_ms: u64,
}

fn assemble_response(args: AssembleArgs<'_>) -> Result<EstimateResponse> {
    let AssembleArgs {
        request,
        hash,
        snapshot,
        cost_graph,
        guard,
        report,
        policy_results,
        assumptions,
        decay_events,
        duration_ms,
    } = args;

    let currency = cost_graph.currency();
    let mut resources = Vec::new();
    let mut symbolic_rows = Vec::new();
    let mut total = Money::zero(currency);

    for (asset, units) in cost_graph.iter_ordered() {
        let mut asset_total = Money::zero(currency);
        let mut components = Vec::new();
        let mut any_symbolic = false;

        for unit in units {
            if let Some(amount) = &unit.amount {
                asset_total = asset_total.add(amount)?;
            }
            if unit.is_symbolic {
                any_symbolic = true;
                let expression = guard
                    .blocked()
                    .iter()
                    .find(|b| b.address == asset.address)
                    .map(|b| b.reason.clone());
                symbolic_rows.push(response::SymbolicCostRow {
                    address: asset.address.clone(),
                    reason: unit
                        .symbolic_reason
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    expression,
                    lower_bound: None,
                    upper_bound: unit.bound_amount.as_ref().map(Money::to_display),
                    is_unbounded: unit.bound_amount.is_none(),
                });
            }
            components.push(response::CostComponent {
                name: unit.component_name.clone(),
                billing_measure: unit.billing_measure.clone(),
                quantity: unit.quantity.map(|q| q.to_string()),
                monthly_cost: unit.amount.as_ref().map(Money::to_display),
                is_symbolic: unit.is_symbolic,
                symbolic_reason: unit.symbolic_reason.clone(),
                confidence: unit.confidence,
            });
        }

        total = total.add(&asset_total)?;
        let confidence = cost_graph.asset_confidence(&asset.address);
        let lineage = request.options.include_cost_lineage.then(|| response::Lineage {
            dependency_path: cost_graph.assets().dependency_path(&asset.address),
            explanation: decay_events
                .iter()
                .filter(|e| e.source == asset.address)
                .map(DecayEvent::describe)
                .collect(),
        });

        resources.push(response::ResourceCost {
            address: asset.address.clone(),
            resource_type: asset.resource_type.clone(),
            provider_alias: asset.provider.alias.clone(),
            monthly_cost: asset_total.to_display(),
            hourly_cost: asset_total.monthly_to_hourly().to_display(),
            confidence: confidence.value,
            is_symbolic: any_symbolic,
            components,
            lineage,
        });
    }

    let project_confidence = cost_graph.aggregate_confidence();
    let policy_blocked = request.mode == Mode::Strict
        && policy_results.iter().any(|r| !r.passed);
    let has_gaps = report.symbolic_units > 0 || report.unsupported_resources > 0;
    let status = if policy_blocked {
        ResponseStatus::Error
    } else if has_gaps {
        ResponseStatus::Partial
    } else {
        ResponseStatus::Success
    };

    let dependency_graph = request.options.include_dependency_graph.then(|| {
        cost_graph
            .assets()
            .iter_ordered()
            .map(|asset| {
                let deps = cost_graph
                    .assets()
                    .dependency_graph()
                    .dependencies_of(&asset.address)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (asset.address.clone(), deps)
            })
            .collect()
    });

    Ok(EstimateResponse {
        metadata: response::ResponseMetadata {
            request_id: Uuid::new_v4().to_string(),
            input_hash: hash,
            engine_version: engine_version().to_string(),
            pricing_snapshot_id: snapshot.snapshot_id.clone(),
            mode: request.mode,
            timestamp: Utc::now(),
            duration_ms,
        },
        status,
        summary: response::Summary {
            total_monthly_cost: total.to_display(),
            total_hourly_cost: total.monthly_to_hourly().to_display(),
            currency,
            confidence: project_confidence.value,
            confidence_level: project_confidence.level,
            confidence_reason: project_confidence.lowest_cause.clone(),
        },
        resources,
        symbolic_costs: symbolic_rows,
        coverage: response::CoverageSummary {
            numeric_pct: report.numeric_pct,
            symbolic_pct: report.symbolic_pct,
            unsupported_pct: report.unsupported_pct,
            numeric_total: report.numeric_total.to_display(),
            symbolic_bound: report.symbolic_bound.to_display(),
            grand_total: report.grand_total.to_display(),
            unsupported_resources: report.unsupported_resources,
            unsupported_types: report.unsupported_types.iter().cloned().collect(),
        },
        warnings: report.warnings.clone(),
        policy_results,
        assumptions: if request.options.include_assumptions {
            assumptions
        } else {
            Vec::new()
        },
        dependency_graph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::registry::builtin_registry;
    use crate::pricing::store::MemorySnapshotStore;

    #[test]
    fn test_normalized_input_hash_ignores_option_noise() {
        let a = EstimateRequest {
            source: json!({"resources": [], "region": "us-east-1"}),
            mode: Mode::Permissive,
            usage_profile: None,
            options: EstimateOptions {
                include_dependency_graph: true,
                ..Default::default()
            },
            pricing_snapshot_id: None,
        };
        let mut b = a.clone();
        b.options.include_dependency_graph = false;

        // response shaping options do not change the input identity
        assert_eq!(
            input_hash(&normalized_input(&a)),
            input_hash(&normalized_input(&b))
        );
    }

    #[test]
    fn test_catalog_hash_is_stable() {
        let r1 = builtin_registry().unwrap();
        let r2 = builtin_registry().unwrap();
        assert_eq!(catalog_hash(&r1), catalog_hash(&r2));
    }

    #[tokio::test]
    async fn test_unknown_policy_preset_is_a_validation_error() {
        let engine = Engine::new(
            Arc::new(builtin_registry().unwrap()),
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(RateCache::new(60, 1, "hash")),
            Arc::new(StorePool::new(2, std::time::Duration::from_millis(100))),
            ResolverConfig::default(),
        );
        let request = EstimateRequest {
            source: json!({"resources": [], "region": "us-east-1"}),
            mode: Mode::Permissive,
            usage_profile: None,
            options: EstimateOptions {
                policy: Some("nonsense".to_string()),
                ..Default::default()
            },
            pricing_snapshot_id: None,
        };
        let err = engine
            .estimate(&request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
