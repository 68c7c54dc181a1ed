//! Estimate and diff response DTOs
//!
//! External shapes only: money is always a two-digit decimal string,
//! confidences are floats in [0, 1]. Everything here is reproducible
//! byte-for-byte for identical inputs except `request_id`,
//! `timestamp` and `duration_ms`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::confidence::ConfidenceLevel;
use crate::coverage::policy::PolicyResult;
use crate::mapper::Assumption;
use crate::money::Currency;

use super::Mode;

/// Overall outcome of an estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Fully numeric, no unsupported resources, policy passed
    Success,

    /// Estimation completed but contains symbolic or unsupported cost
    Partial,

    /// Policy blocked the estimation in strict mode
    Error,
}

/// Audit metadata attached to every response
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseMetadata {
    pub request_id: String,

    /// SHA-256 of the canonical normalized input
    pub input_hash: String,

    pub engine_version: String,
    pub pricing_snapshot_id: String,
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Project-level totals
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    /// Decimal string with two fractional digits
    pub total_monthly_cost: String,

    /// Decimal string with two fractional digits
    pub total_hourly_cost: String,

    pub currency: Currency,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,

    /// Why the confidence is what it is (the lowest contributor)
    pub confidence_reason: String,
}

/// One cost component under a resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CostComponent {
    pub name: String,
    pub billing_measure: String,
    pub quantity: Option<String>,
    pub monthly_cost: Option<String>,
    pub is_symbolic: bool,
    pub symbolic_reason: Option<String>,
    pub confidence: f64,
}

/// Where a number came from
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Lineage {
    pub dependency_path: Vec<String>,
    pub explanation: Vec<String>,
}

/// Per-resource cost node
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceCost {
    pub address: String,
    pub resource_type: String,
    pub provider_alias: String,
    pub monthly_cost: String,
    pub hourly_cost: String,
    pub confidence: f64,
    pub is_symbolic: bool,
    pub components: Vec<CostComponent>,
    pub lineage: Option<Lineage>,
}

/// One symbolic-cost row
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SymbolicCostRow {
    pub address: String,
    pub reason: String,

    /// The unresolved expression, when the cause was an expansion
    pub expression: Option<String>,

    pub lower_bound: Option<String>,
    pub upper_bound: Option<String>,
    pub is_unbounded: bool,
}

/// Spend-weighted coverage in external form
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverageSummary {
    pub numeric_pct: f64,
    pub symbolic_pct: f64,
    pub unsupported_pct: f64,
    pub numeric_total: String,
    pub symbolic_bound: String,
    pub grand_total: String,
    pub unsupported_resources: usize,
    pub unsupported_types: Vec<String>,
}

/// Full estimation response
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EstimateResponse {
    pub metadata: ResponseMetadata,
    pub status: ResponseStatus,
    pub summary: Summary,
    pub resources: Vec<ResourceCost>,
    pub symbolic_costs: Vec<SymbolicCostRow>,
    pub coverage: CoverageSummary,
    pub warnings: Vec<String>,
    pub policy_results: Vec<PolicyResult>,
    pub assumptions: Vec<Assumption>,

    /// Adjacency (address -> direct dependencies); present when
    /// requested
    pub dependency_graph: Option<BTreeMap<String, Vec<String>>>,
}

/// One side of a diff
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiffSideSummary {
    pub ref_name: Option<String>,
    pub input_hash: String,
    pub total_monthly_cost: String,
    pub confidence: f64,
    pub status: ResponseStatus,
}

/// Kind of a per-address change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One changed resource between base and head
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Change {
    pub address: String,
    pub kind: ChangeKind,
    pub cost_before: Option<String>,
    pub cost_after: Option<String>,

    /// Signed, e.g. `+$12.41` or `-$3.00`
    pub cost_delta: String,

    pub confidence_before: Option<f64>,
    pub confidence_after: Option<f64>,
    pub dependency_path: Vec<String>,
}

/// Full diff response
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiffResponse {
    pub metadata: ResponseMetadata,
    pub base: DiffSideSummary,
    pub head: DiffSideSummary,

    /// Signed difference of monthly totals
    pub monthly_cost_delta: String,

    /// `head.confidence - base.confidence`
    pub confidence_delta: f64,

    pub changes: Vec<Change>,
}
