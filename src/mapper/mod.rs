//! Resource mapper protocol
//!
//! A mapper translates one resource type into usage vectors and
//! price-free cost units. Mappers declare themselves through
//! [`MapperMetadata`]; the registry validates the declaration before
//! admitting the mapper. The emission rules that protect the graph
//! invariants (unknown cardinality poisons, symbolic usage poisons,
//! ceiling clamps) are applied by the pipeline, never left to the
//! mapper.

pub mod defaults;
pub mod indirect;
pub mod registry;

pub mod aws;
pub mod azure;
pub mod gcp;

pub use registry::{MapperRegistry, RegistryError};

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::confidence::{DecayEvent, DecayRule, DecayTracker};
use crate::graph::{AssetNode, Cardinality};
use crate::money::Money;
use crate::pricing::RateKey;

use defaults::DefaultUsagePolicy;

/// Shared usage metric vocabulary. Mappers may add service-specific
/// metrics, but these names are used wherever they fit.
pub mod metrics {
    pub const MONTHLY_HOURS: &str = "monthly_hours";
    pub const MONTHLY_REQUESTS: &str = "monthly_requests";
    pub const STORAGE_GB: &str = "storage_gb";
    pub const DATA_TRANSFER_GB: &str = "data_transfer_gb";
    pub const IOPS: &str = "iops";
    pub const THROUGHPUT_MBPS: &str = "throughput_mbps";
}

/// Confidence attached to usage supplied by the caller's profile.
pub const PROVIDED_USAGE_CONFIDENCE: f64 = 0.9;

/// Supported cloud providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    Aws,
    Gcp,
    Azure,
}

impl Cloud {
    pub fn as_str(self) -> &'static str {
        match self {
            Cloud::Aws => "aws",
            Cloud::Gcp => "gcp",
            Cloud::Azure => "azure",
        }
    }

    /// Map a provider id as it appears in plans to a cloud.
    pub fn from_provider_id(provider_id: &str) -> Option<Self> {
        match provider_id {
            "aws" => Some(Cloud::Aws),
            "google" | "google-beta" | "gcp" => Some(Cloud::Gcp),
            "azurerm" | "azure" => Some(Cloud::Azure),
            _ => None,
        }
    }
}

/// Mapper quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Tier {
    /// Produces numeric cost units from resolvable attributes
    Tier1Numeric,

    /// Produces symbolic cost units when usage is missing
    Tier2Symbolic,

    /// Produces no direct cost (VPCs, IAM, ...)
    Tier3Indirect,
}

/// How a resource incurs cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CostBehavior {
    /// Billed for existing (instances, volumes)
    Direct,

    /// Billed by consumption (requests, storage operations)
    UsageBased,

    /// No direct charge; cost shows up elsewhere
    Indirect,

    /// Known resource type with no pricing support
    Unsupported,
}

/// Self-description every mapper must provide.
///
/// All fields are required; [`MapperMetadata::validate`] gates
/// registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperMetadata {
    pub resource_type: String,
    pub cloud: Cloud,
    pub tier: Tier,
    pub cost_behavior: CostBehavior,
    pub requires_usage: bool,
    pub can_be_symbolic: bool,

    /// Emitted confidence never exceeds this; in (0, 1]
    pub confidence_ceiling: f64,

    /// Whether this type typically dominates spend
    pub high_impact: bool,

    /// Coarse grouping for roll-ups, e.g. "compute", "storage"
    pub category: String,

    /// Names of the cost components the mapper emits
    pub cost_components: Vec<String>,

    pub notes: String,
}

/// Metadata validation failures (registration is refused)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("{resource_type}: {field} must not be empty")]
    EmptyField {
        resource_type: String,
        field: &'static str,
    },

    #[error("{resource_type}: confidence ceiling {ceiling} outside (0, 1]")]
    CeilingOutOfRange {
        resource_type: String,
        ceiling: String,
    },

    #[error("{resource_type}: Tier1Numeric cannot have indirect cost behavior")]
    Tier1Indirect { resource_type: String },

    #[error("{resource_type}: Tier2Symbolic requires can_be_symbolic")]
    Tier2NotSymbolic { resource_type: String },

    #[error("{resource_type}: Tier3Indirect requires indirect behavior and can_be_symbolic")]
    Tier3NotIndirect { resource_type: String },

    #[error("{resource_type}: usage-based behavior requires requires_usage")]
    UsageBasedWithoutUsage { resource_type: String },
}

impl MapperMetadata {
    pub fn validate(&self) -> Result<(), MetadataError> {
        let rt = || self.resource_type.clone();

        if self.resource_type.is_empty() {
            return Err(MetadataError::EmptyField {
                resource_type: "<unnamed>".to_string(),
                field: "resource_type",
            });
        }
        if self.category.is_empty() {
            return Err(MetadataError::EmptyField {
                resource_type: rt(),
                field: "category",
            });
        }
        if self.cost_components.is_empty() {
            return Err(MetadataError::EmptyField {
                resource_type: rt(),
                field: "cost_components",
            });
        }
        if self.notes.is_empty() {
            return Err(MetadataError::EmptyField {
                resource_type: rt(),
                field: "notes",
            });
        }
        if !(self.confidence_ceiling > 0.0 && self.confidence_ceiling <= 1.0) {
            return Err(MetadataError::CeilingOutOfRange {
                resource_type: rt(),
                ceiling: format!("{}", self.confidence_ceiling),
            });
        }
        if self.tier == Tier::Tier1Numeric && self.cost_behavior == CostBehavior::Indirect {
            return Err(MetadataError::Tier1Indirect { resource_type: rt() });
        }
        if self.tier == Tier::Tier2Symbolic && !self.can_be_symbolic {
            return Err(MetadataError::Tier2NotSymbolic { resource_type: rt() });
        }
        if self.tier == Tier::Tier3Indirect
            && (self.cost_behavior != CostBehavior::Indirect || !self.can_be_symbolic)
        {
            return Err(MetadataError::Tier3NotIndirect { resource_type: rt() });
        }
        if self.cost_behavior == CostBehavior::UsageBased && !self.requires_usage {
            return Err(MetadataError::UsageBasedWithoutUsage { resource_type: rt() });
        }
        Ok(())
    }
}

/// One usage observation. Either concrete (value + confidence) or
/// symbolic (reason, no value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageVector {
    pub metric: String,
    pub value: Option<Decimal>,
    pub is_symbolic: bool,
    pub symbolic_reason: Option<String>,
    pub confidence: f64,
}

impl UsageVector {
    pub fn concrete(metric: &str, value: Decimal, confidence: f64) -> Self {
        Self {
            metric: metric.to_string(),
            value: Some(value),
            is_symbolic: false,
            symbolic_reason: None,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn symbolic(metric: &str, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            metric: metric.to_string(),
            value: None,
            is_symbolic: true,
            symbolic_reason: Some(reason.into()),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A recorded default-usage assumption
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Assumption {
    pub address: String,
    pub metric: String,
    pub assumed_value: String,
    pub confidence: f64,
    pub note: String,
}

/// Usage resolution context handed to mappers.
///
/// Resolution order: caller-provided usage profile, then the strict
/// default policy (recorded as an assumption), then symbolic.
#[derive(Debug)]
pub struct UsageContext {
    profile: BTreeMap<String, BTreeMap<String, Decimal>>,
    defaults: DefaultUsagePolicy,
    assumptions: Vec<Assumption>,
    decay_events: Vec<DecayEvent>,
}

impl UsageContext {
    pub fn new(
        profile: BTreeMap<String, BTreeMap<String, Decimal>>,
        defaults: DefaultUsagePolicy,
    ) -> Self {
        Self {
            profile,
            defaults,
            assumptions: Vec::new(),
            decay_events: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), DefaultUsagePolicy::strict())
    }

    fn profile_value(&self, asset: &AssetNode, metric: &str) -> Option<Decimal> {
        // exact address first, resource-type fallback second
        for key in [asset.address.as_str(), asset.resource_type.as_str()] {
            if let Some(value) = self.profile.get(key).and_then(|m| m.get(metric)) {
                return Some(*value);
            }
        }
        None
    }

    /// Resolve one usage metric for an asset.
    pub fn resolve(&mut self, asset: &AssetNode, metric: &str) -> UsageVector {
        if let Some(value) = self.profile_value(asset, metric) {
            return UsageVector::concrete(metric, value, PROVIDED_USAGE_CONFIDENCE);
        }

        if let Some(default) = self.defaults.lookup(&asset.resource_type, metric) {
            self.assumptions.push(Assumption {
                address: asset.address.clone(),
                metric: metric.to_string(),
                assumed_value: default.value.to_string(),
                confidence: default.confidence,
                note: default.note.to_string(),
            });
            if default.confidence < 1.0 {
                self.decay_events.push(DecayEvent {
                    rule: DecayRule::DefaultUsage,
                    cause: format!("assumed {} = {}", metric, default.value),
                    source: asset.address.clone(),
                    before: 1.0,
                    after: default.confidence,
                });
            }
            return UsageVector::concrete(metric, default.value, default.confidence);
        }

        let mut tracker = DecayTracker::new(1.0, asset.address.clone());
        let confidence =
            tracker.apply(DecayRule::UnknownUsage, format!("no usage data for {metric}"));
        self.decay_events.extend(tracker.into_events());
        UsageVector::symbolic(metric, format!("no usage data for {metric}"), confidence)
    }

    pub fn assumptions(&self) -> &[Assumption] {
        &self.assumptions
    }

    pub fn take_assumptions(&mut self) -> Vec<Assumption> {
        std::mem::take(&mut self.assumptions)
    }

    pub fn take_decay_events(&mut self) -> Vec<DecayEvent> {
        std::mem::take(&mut self.decay_events)
    }
}

/// One billable line item, pre-pricing.
///
/// Mappers construct these without amounts; the pricing step fills
/// `amount`/`snapshot_id`, and the pipeline stamps `address` and
/// `category` when attaching to the cost graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostUnit {
    pub component_name: String,

    /// Billing measure of the unit, e.g. "Hrs" or "GB-Mo"
    pub billing_measure: String,

    pub quantity: Option<Decimal>,
    pub rate_key: RateKey,
    pub is_symbolic: bool,
    pub symbolic_reason: Option<String>,
    pub confidence: f64,

    /// Metric this unit's quantity was derived from
    pub source_metric: Option<String>,

    /// Ceiling on the quantity when the exact value is unknown
    pub bound_quantity: Option<Decimal>,

    /// Owning asset address; stamped by the cost graph
    #[serde(default)]
    pub address: String,

    /// Mapper category; stamped by the cost graph
    #[serde(default)]
    pub category: String,

    /// Resolved monthly amount; pricing only
    pub amount: Option<Money>,

    /// Upper-bound monthly amount for bounded symbolic units
    pub bound_amount: Option<Money>,

    /// Snapshot the amount was resolved against; pricing only
    pub snapshot_id: Option<String>,
}

impl CostUnit {
    pub fn concrete(
        component_name: &str,
        billing_measure: &str,
        rate_key: RateKey,
        quantity: Decimal,
        confidence: f64,
        source_metric: &str,
    ) -> Self {
        Self {
            component_name: component_name.to_string(),
            billing_measure: billing_measure.to_string(),
            quantity: Some(quantity),
            rate_key,
            is_symbolic: false,
            symbolic_reason: None,
            confidence: confidence.clamp(0.0, 1.0),
            source_metric: Some(source_metric.to_string()),
            bound_quantity: None,
            address: String::new(),
            category: String::new(),
            amount: None,
            bound_amount: None,
            snapshot_id: None,
        }
    }

    pub fn symbolic(
        component_name: &str,
        billing_measure: &str,
        rate_key: RateKey,
        reason: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            component_name: component_name.to_string(),
            billing_measure: billing_measure.to_string(),
            quantity: None,
            rate_key,
            is_symbolic: true,
            symbolic_reason: Some(reason.into()),
            confidence: confidence.clamp(0.0, 1.0),
            source_metric: None,
            bound_quantity: None,
            address: String::new(),
            category: String::new(),
            amount: None,
            bound_amount: None,
            snapshot_id: None,
        }
    }

    /// Build a unit from a usage vector: concrete vectors produce
    /// concrete units, symbolic vectors produce symbolic units with
    /// the vector's reason.
    pub fn from_usage(
        component_name: &str,
        billing_measure: &str,
        rate_key: RateKey,
        usage: &UsageVector,
    ) -> Self {
        match usage.value {
            Some(value) if !usage.is_symbolic => Self::concrete(
                component_name,
                billing_measure,
                rate_key,
                value,
                usage.confidence,
                &usage.metric,
            ),
            _ => {
                let reason = usage
                    .symbolic_reason
                    .clone()
                    .unwrap_or_else(|| format!("no value for {}", usage.metric));
                let mut unit = Self::symbolic(
                    component_name,
                    billing_measure,
                    rate_key,
                    reason,
                    usage.confidence,
                );
                unit.source_metric = Some(usage.metric.clone());
                unit
            }
        }
    }

    /// Force the unit symbolic, dropping any quantity.
    pub fn make_symbolic(&mut self, reason: impl Into<String>) {
        self.is_symbolic = true;
        self.symbolic_reason = Some(reason.into());
        if let Some(q) = self.quantity.take() {
            // a formerly known quantity still bounds the unit
            self.bound_quantity.get_or_insert(q);
        }
    }
}

/// Mapper execution errors
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("{address}: attribute {attribute} has unusable value: {detail}")]
    InvalidAttribute {
        address: String,
        attribute: String,
        detail: String,
    },

    #[error("no mapper registered for ({cloud}, {resource_type})")]
    NotRegistered {
        cloud: String,
        resource_type: String,
    },
}

/// The per-resource-type mapping protocol.
///
/// Implementations are stateless; all request state arrives through
/// the asset and the usage context. Mappers never resolve prices.
pub trait ResourceMapper: Send + Sync {
    fn metadata(&self) -> MapperMetadata;

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError>;

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError>;
}

/// Pipeline-side normalization of mapper output.
///
/// Applied to every emission regardless of mapper behavior:
/// 1. confidence is clamped to the mapper's ceiling;
/// 2. a known cardinality scales quantities; an unknown cardinality
///    turns every unit symbolic ("unknown cardinality: <reason>") and
///    applies the guard's decay rule, keeping a quantity bound only
///    when the guard recorded a static ceiling;
/// 3. a unit derived from a symbolic usage vector becomes symbolic
///    with that vector's reason.
pub fn apply_emission_rules(
    asset: &AssetNode,
    metadata: &MapperMetadata,
    usage: &[UsageVector],
    units: Vec<CostUnit>,
    cardinality_rule: Option<DecayRule>,
    expansion_bound: Option<u64>,
) -> (Vec<CostUnit>, Vec<DecayEvent>) {
    let mut events = Vec::new();
    let mut out = Vec::with_capacity(units.len());

    for mut unit in units {
        unit.confidence = unit.confidence.min(metadata.confidence_ceiling);

        if let Some(metric) = unit.source_metric.clone() {
            if let Some(vector) = usage.iter().find(|v| v.metric == metric) {
                if vector.is_symbolic && !unit.is_symbolic {
                    let reason = vector
                        .symbolic_reason
                        .clone()
                        .unwrap_or_else(|| format!("no value for {metric}"));
                    unit.confidence = unit.confidence.min(vector.confidence);
                    unit.make_symbolic(reason);
                }
            }
        }

        match &asset.cardinality {
            Cardinality::Known { count } => {
                if *count != 1 {
                    if let Some(q) = unit.quantity {
                        unit.quantity = Some(q * Decimal::from(*count));
                    }
                    if let Some(b) = unit.bound_quantity {
                        unit.bound_quantity = Some(b * Decimal::from(*count));
                    }
                }
            }
            Cardinality::Unknown { reason } => {
                let mut tracker = DecayTracker::new(unit.confidence, asset.address.clone());
                let rule = cardinality_rule.unwrap_or(DecayRule::UnknownValue);
                unit.confidence = tracker.apply(rule, format!("unknown cardinality: {reason}"));
                events.extend(tracker.into_events());
                let per_instance = unit.quantity;
                unit.make_symbolic(format!("unknown cardinality: {reason}"));
                // one instance's quantity is no ceiling when the count
                // itself is unknown
                unit.bound_quantity = match (expansion_bound, per_instance) {
                    (Some(bound), Some(q)) => Some(q * Decimal::from(bound)),
                    _ => None,
                };
            }
        }

        out.push(unit);
    }

    (out, events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ProviderContext;

    fn metadata() -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_instance".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.95,
            high_impact: true,
            category: "compute".to_string(),
            cost_components: vec!["instance_hours".to_string()],
            notes: "on-demand instance hours".to_string(),
        }
    }

    fn asset(cardinality: Cardinality) -> AssetNode {
        AssetNode {
            address: "aws_instance.web".to_string(),
            resource_type: "aws_instance".to_string(),
            attributes: BTreeMap::new(),
            provider: ProviderContext {
                provider_id: "aws".to_string(),
                alias: "aws".to_string(),
                region: "us-east-1".to_string(),
                account_id: None,
            },
            cardinality,
            instance_key: None,
            children: vec![],
            tags: BTreeMap::new(),
        }
    }

    fn unit(confidence: f64) -> CostUnit {
        CostUnit::concrete(
            "instance_hours",
            "Hrs",
            RateKey::new("aws", "AmazonEC2", "us-east-1"),
            Decimal::from(730),
            confidence,
            metrics::MONTHLY_HOURS,
        )
    }

    #[test]
    fn test_metadata_tier_invariants() {
        let mut md = metadata();
        assert!(md.validate().is_ok());

        md.tier = Tier::Tier1Numeric;
        md.cost_behavior = CostBehavior::Indirect;
        assert_eq!(
            md.validate(),
            Err(MetadataError::Tier1Indirect {
                resource_type: "aws_instance".to_string()
            })
        );

        let mut md = metadata();
        md.tier = Tier::Tier2Symbolic;
        md.can_be_symbolic = false;
        assert!(matches!(
            md.validate(),
            Err(MetadataError::Tier2NotSymbolic { .. })
        ));

        let mut md = metadata();
        md.tier = Tier::Tier3Indirect;
        md.cost_behavior = CostBehavior::Direct;
        assert!(matches!(
            md.validate(),
            Err(MetadataError::Tier3NotIndirect { .. })
        ));

        let mut md = metadata();
        md.cost_behavior = CostBehavior::UsageBased;
        md.requires_usage = false;
        assert!(matches!(
            md.validate(),
            Err(MetadataError::UsageBasedWithoutUsage { .. })
        ));

        let mut md = metadata();
        md.confidence_ceiling = 0.0;
        assert!(matches!(
            md.validate(),
            Err(MetadataError::CeilingOutOfRange { .. })
        ));
    }

    #[test]
    fn test_unknown_cardinality_poisons_all_units() {
        let asset = asset(Cardinality::unknown("count = \"${var.replicas}\""));
        let (units, events) = apply_emission_rules(
            &asset,
            &metadata(),
            &[],
            vec![unit(0.95)],
            Some(DecayRule::UnknownCount),
            None,
        );

        assert_eq!(units.len(), 1);
        assert!(units[0].is_symbolic);
        assert!(units[0]
            .symbolic_reason
            .as_deref()
            .unwrap()
            .starts_with("unknown cardinality:"));
        assert!(units[0].confidence <= 0.5);
        assert!(units[0].quantity.is_none());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rule, DecayRule::UnknownCount);
    }

    #[test]
    fn test_known_cardinality_scales_quantity() {
        let asset = asset(Cardinality::known(3));
        let (units, _) = apply_emission_rules(&asset, &metadata(), &[], vec![unit(0.95)], None, None);
        assert_eq!(units[0].quantity, Some(Decimal::from(2190)));
        assert!(!units[0].is_symbolic);
    }

    #[test]
    fn test_ceiling_clamps_confidence() {
        let asset = asset(Cardinality::known(1));
        let (units, _) = apply_emission_rules(&asset, &metadata(), &[], vec![unit(1.0)], None, None);
        assert_eq!(units[0].confidence, 0.95);
    }

    #[test]
    fn test_symbolic_usage_poisons_derived_unit() {
        let asset = asset(Cardinality::known(1));
        let usage = vec![UsageVector::symbolic(
            metrics::MONTHLY_HOURS,
            "no usage data for monthly_hours",
            0.6,
        )];
        let (units, _) = apply_emission_rules(&asset, &metadata(), &usage, vec![unit(0.95)], None, None);

        assert!(units[0].is_symbolic);
        assert_eq!(
            units[0].symbolic_reason.as_deref(),
            Some("no usage data for monthly_hours")
        );
        assert!(units[0].confidence <= 0.6);
    }

    #[test]
    fn test_usage_context_resolution_order() {
        let mut profile: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
        profile.entry("aws_instance.web".to_string()).or_default().insert(
            metrics::MONTHLY_REQUESTS.to_string(),
            Decimal::from(1_000_000),
        );

        let mut ctx = UsageContext::new(profile, DefaultUsagePolicy::strict());
        let asset = asset(Cardinality::known(1));

        // profile hit
        let v = ctx.resolve(&asset, metrics::MONTHLY_REQUESTS);
        assert_eq!(v.value, Some(Decimal::from(1_000_000)));
        assert_eq!(v.confidence, PROVIDED_USAGE_CONFIDENCE);

        // default-policy hit (always-on hours for compute)
        let v = ctx.resolve(&asset, metrics::MONTHLY_HOURS);
        assert!(!v.is_symbolic);
        assert_eq!(ctx.assumptions().len(), 1);

        // miss goes symbolic
        let v = ctx.resolve(&asset, metrics::DATA_TRANSFER_GB);
        assert!(v.is_symbolic);
        assert!((v.confidence - 0.6).abs() < 1e-9);
    }
}
