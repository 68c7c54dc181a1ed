//! Full-graph invariant validation
//!
//! Runs once before pricing (structure, cardinality, monotonicity,
//! price-free emissions) and once after (snapshot uniformity,
//! symbolic units still price-free). Any violation aborts the
//! estimation in every mode; strictness governs policy, never
//! invariants.

use crate::confidence::aggregator::assert_monotone;

use super::cost::CostGraph;
use super::GraphError;

/// One failed check with enough detail to debug it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub check: &'static str,
    pub detail: String,
}

impl Violation {
    fn new(check: &'static str, detail: impl Into<String>) -> Self {
        Self {
            check,
            detail: detail.into(),
        }
    }
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("[{}] {}", v.check, v.detail))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Pre-pricing pass over a fully built cost graph.
pub fn check_pre_pricing(graph: &CostGraph) -> Result<(), GraphError> {
    let mut violations = Vec::new();

    // (a) the dependency graph is still sealed and closed
    let dep = graph.assets().dependency_graph();
    if !dep.is_sealed() {
        violations.push(Violation::new("sealing", "dependency graph is not sealed"));
    }
    if let Err(err) = dep.must_be_closed() {
        violations.push(Violation::new("closure", err.to_string()));
    }

    for (asset, units) in graph.iter_ordered() {
        for unit in units {
            // (b) unit/asset correspondence is implied by construction;
            // re-check the cardinality rule explicitly
            if asset.cardinality.is_unknown() && !unit.is_symbolic {
                violations.push(Violation::new(
                    "cardinality",
                    format!(
                        "{}:{} is numeric but cardinality is unknown",
                        asset.address, unit.component_name
                    ),
                ));
            }
            if unit.is_symbolic && unit.quantity.is_some() {
                violations.push(Violation::new(
                    "symbolic",
                    format!(
                        "{}:{} is symbolic but carries a quantity",
                        asset.address, unit.component_name
                    ),
                ));
            }
            // (d) mappers never price
            if unit.amount.is_some() || unit.snapshot_id.is_some() {
                violations.push(Violation::new(
                    "price_free",
                    format!(
                        "{}:{} carries a resolved price before pricing",
                        asset.address, unit.component_name
                    ),
                ));
            }
        }

        // (c) asset aggregate never exceeds its cheapest contributor
        let aggregate = graph.asset_confidence(&asset.address);
        let components: Vec<f64> = units.iter().map(|u| u.confidence).collect();
        if let Err(err) = assert_monotone(aggregate.value, &components) {
            violations.push(Violation::new(
                "monotonicity",
                format!("{}: {}", asset.address, err),
            ));
        }
    }

    // (c) project aggregate
    let project = graph.aggregate_confidence();
    let all: Vec<f64> = graph.units_ordered().map(|u| u.confidence).collect();
    if let Err(err) = assert_monotone(project.value, &all) {
        violations.push(Violation::new("monotonicity", format!("project: {err}")));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(GraphError::Invariant(render(&violations)))
    }
}

/// Post-pricing pass: uniform snapshot identity and symbolic units
/// still unpriced.
pub fn check_post_pricing(graph: &CostGraph, snapshot_id: &str) -> Result<(), GraphError> {
    let mut violations = Vec::new();

    for unit in graph.units_ordered() {
        if unit.is_symbolic {
            if unit.amount.is_some() {
                violations.push(Violation::new(
                    "symbolic",
                    format!(
                        "{}:{} is symbolic but carries a resolved amount",
                        unit.address, unit.component_name
                    ),
                ));
            }
            continue;
        }
        match &unit.snapshot_id {
            Some(id) if id == snapshot_id => {}
            Some(id) => violations.push(Violation::new(
                "snapshot",
                format!(
                    "{}:{} resolved against {} instead of {}",
                    unit.address, unit.component_name, id, snapshot_id
                ),
            )),
            None if unit.amount.is_some() => violations.push(Violation::new(
                "snapshot",
                format!(
                    "{}:{} has an amount with no snapshot identity",
                    unit.address, unit.component_name
                ),
            )),
            None => {}
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(GraphError::Invariant(render(&violations)))
    }
}
