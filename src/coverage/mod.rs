//! Spend-weighted coverage accounting
//!
//! After pricing, every cost unit falls into one of four classes:
//! numeric (priced), symbolic (unpriceable, with an upper bound when
//! one exists), indirect (no direct charge) or unsupported (no
//! mapper). Coverage percentages are weighted by dollars, not by
//! resource count: one unpriced database outweighs ten priced IAM
//! roles.

pub mod policy;

use rust_decimal::prelude::ToPrimitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::graph::CostGraph;
use crate::mapper::{Cloud, CostBehavior, MapperRegistry};
use crate::money::{Currency, Money, MoneyError};

/// Classification of one cost unit or resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CoverageClass {
    Numeric,
    Symbolic,
    Indirect,
    Unsupported,
}

/// Warning thresholds from the coverage contract.
const WARN_UNSUPPORTED_PCT: f64 = 10.0;
const WARN_SYMBOLIC_PCT: f64 = 20.0;
const WARN_UNSUPPORTED_TYPES: usize = 5;

/// Spend-weighted coverage over one estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedCoverageReport {
    pub currency: Currency,

    /// Sum of resolved amounts
    pub numeric_total: Money,

    /// Sum of upper bounds over bounded symbolic units
    pub symbolic_bound: Money,

    /// Estimated spend hiding behind unsupported resources
    pub unsupported_estimate: Money,

    pub grand_total: Money,

    pub numeric_pct: f64,
    pub symbolic_pct: f64,
    pub unsupported_pct: f64,

    pub numeric_units: usize,
    pub symbolic_units: usize,

    /// Symbolic units with no computable upper bound
    pub unbounded_symbolic: usize,

    /// Assets whose mapper declares no direct charge
    pub indirect_assets: usize,

    pub unsupported_resources: usize,
    pub unsupported_types: BTreeSet<String>,

    /// Blocked expansions with no static ceiling; filled by the
    /// engine from the expansion guard
    pub unbounded_blocked_expansions: usize,

    pub warnings: Vec<String>,
}

impl WeightedCoverageReport {
    /// Build the report from a priced cost graph.
    pub fn build(
        graph: &CostGraph,
        registry: &MapperRegistry,
        unbounded_blocked_expansions: usize,
    ) -> Result<Self, MoneyError> {
        let currency = graph.currency();
        let mut numeric_total = Money::zero(currency);
        let mut symbolic_bound = Money::zero(currency);
        let unsupported_estimate = Money::zero(currency);

        let mut numeric_units = 0usize;
        let mut symbolic_units = 0usize;
        let mut unbounded_symbolic = 0usize;
        let mut indirect_assets = 0usize;

        for (asset, units) in graph.iter_ordered() {
            let cloud = Cloud::from_provider_id(&asset.provider.provider_id);
            let behavior = cloud
                .and_then(|c| registry.lookup(c, &asset.resource_type))
                .map(|m| m.metadata().cost_behavior);
            if behavior == Some(CostBehavior::Indirect) {
                indirect_assets += 1;
            }

            for unit in units {
                if unit.is_symbolic {
                    symbolic_units += 1;
                    match &unit.bound_amount {
                        Some(bound) => symbolic_bound = symbolic_bound.add(bound)?,
                        None => unbounded_symbolic += 1,
                    }
                } else if let Some(amount) = &unit.amount {
                    numeric_units += 1;
                    numeric_total = numeric_total.add(amount)?;
                }
            }
        }

        let unsupported_resources = graph.unsupported().len();
        let unsupported_types: BTreeSet<String> =
            graph.unsupported().values().cloned().collect();

        let grand_total = numeric_total
            .add(&symbolic_bound)?
            .add(&unsupported_estimate)?;

        let has_gaps = symbolic_units > 0 || unsupported_resources > 0;
        let (numeric_pct, symbolic_pct, unsupported_pct) = if !grand_total.is_zero() {
            let grand = grand_total.amount().to_f64().unwrap_or(0.0);
            (
                100.0 * numeric_total.amount().to_f64().unwrap_or(0.0) / grand,
                100.0 * symbolic_bound.amount().to_f64().unwrap_or(0.0) / grand,
                100.0 * unsupported_estimate.amount().to_f64().unwrap_or(0.0) / grand,
            )
        } else if has_gaps {
            // nothing priced at all; numeric coverage is zero by definition
            (0.0, 0.0, 0.0)
        } else {
            (100.0, 0.0, 0.0)
        };

        let mut warnings = Vec::new();
        if unsupported_pct > WARN_UNSUPPORTED_PCT {
            warnings.push(format!(
                "{unsupported_pct:.1}% of estimated spend sits in unsupported resources"
            ));
        }
        if symbolic_pct > WARN_SYMBOLIC_PCT {
            warnings.push(format!(
                "{symbolic_pct:.1}% of estimated spend is symbolic"
            ));
        }
        if unsupported_types.len() >= WARN_UNSUPPORTED_TYPES {
            warnings.push(format!(
                "{} distinct resource types have no mapper",
                unsupported_types.len()
            ));
        }
        if numeric_pct == 0.0 && has_gaps {
            warnings.push("no numeric cost coverage; every estimate is symbolic or unsupported".to_string());
        }

        Ok(Self {
            currency,
            numeric_total,
            symbolic_bound,
            unsupported_estimate,
            grand_total,
            numeric_pct,
            symbolic_pct,
            unsupported_pct,
            numeric_units,
            symbolic_units,
            unbounded_symbolic,
            indirect_assets,
            unsupported_resources,
            unsupported_types,
            unbounded_blocked_expansions,
            warnings,
        })
    }
}
