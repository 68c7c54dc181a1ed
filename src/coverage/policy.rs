//! Coverage policy enforcement
//!
//! A policy is a set of thresholds over the spend-weighted coverage
//! report. `enforce` runs every check and returns every violation;
//! nothing short-circuits, so the caller sees the full picture.
//! Three presets ship with the engine: default, production and
//! zero-tolerance.

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::WeightedCoverageReport;

/// Violation severity ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Block,
}

/// One failed policy check
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyViolation {
    pub rule: String,
    pub actual: String,
    pub limit: String,
    pub message: String,
    pub severity: Severity,
}

/// Outcome of enforcing one policy
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyResult {
    pub policy_name: String,
    pub passed: bool,
    pub violations: Vec<PolicyViolation>,
}

/// Threshold set over a coverage report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub max_unsupported_cost_pct: Option<f64>,
    pub max_symbolic_cost_pct: Option<f64>,
    pub min_numeric_cost_pct: Option<f64>,
    pub max_unsupported_dollars: Option<Decimal>,
    pub max_symbolic_dollars: Option<Decimal>,
    pub block_on_any_unsupported: bool,
    pub block_on_any_symbolic: bool,
    pub max_unsupported_resources: Option<usize>,
}

impl Policy {
    /// Lenient preset for exploratory estimates.
    pub fn default_policy() -> Self {
        Self {
            name: "default".to_string(),
            max_unsupported_cost_pct: Some(30.0),
            max_symbolic_cost_pct: Some(50.0),
            min_numeric_cost_pct: None,
            max_unsupported_dollars: None,
            max_symbolic_dollars: None,
            block_on_any_unsupported: false,
            block_on_any_symbolic: false,
            max_unsupported_resources: None,
        }
    }

    /// Preset for gating production deploys.
    pub fn production() -> Self {
        Self {
            name: "production".to_string(),
            max_unsupported_cost_pct: Some(10.0),
            max_symbolic_cost_pct: Some(20.0),
            min_numeric_cost_pct: Some(70.0),
            max_unsupported_dollars: None,
            max_symbolic_dollars: None,
            block_on_any_unsupported: false,
            block_on_any_symbolic: false,
            max_unsupported_resources: Some(10),
        }
    }

    /// Nothing symbolic, nothing unsupported, fully numeric.
    pub fn zero_tolerance() -> Self {
        Self {
            name: "zero-tolerance".to_string(),
            max_unsupported_cost_pct: None,
            max_symbolic_cost_pct: None,
            min_numeric_cost_pct: Some(100.0),
            max_unsupported_dollars: None,
            max_symbolic_dollars: None,
            block_on_any_unsupported: true,
            block_on_any_symbolic: true,
            max_unsupported_resources: None,
        }
    }

    /// Resolve a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default_policy()),
            "production" => Some(Self::production()),
            "zero-tolerance" | "zero_tolerance" => Some(Self::zero_tolerance()),
            _ => None,
        }
    }

    /// Run every check against the report. `strict` additionally
    /// turns unbounded blocked expansions into a blocking violation.
    pub fn enforce(&self, report: &WeightedCoverageReport, strict: bool) -> PolicyResult {
        let mut violations = Vec::new();

        if let Some(limit) = self.max_unsupported_cost_pct {
            if report.unsupported_pct > limit {
                violations.push(PolicyViolation {
                    rule: "max_unsupported_cost_pct".to_string(),
                    actual: format!("{:.1}", report.unsupported_pct),
                    limit: format!("{limit:.1}"),
                    message: format!(
                        "unsupported spend share {:.1}% exceeds the {limit:.1}% limit",
                        report.unsupported_pct
                    ),
                    severity: Severity::Error,
                });
            }
        }

        if let Some(limit) = self.max_symbolic_cost_pct {
            if report.symbolic_pct > limit {
                violations.push(PolicyViolation {
                    rule: "max_symbolic_cost_pct".to_string(),
                    actual: format!("{:.1}", report.symbolic_pct),
                    limit: format!("{limit:.1}"),
                    message: format!(
                        "symbolic spend share {:.1}% exceeds the {limit:.1}% limit",
                        report.symbolic_pct
                    ),
                    severity: Severity::Error,
                });
            }
        }

        if let Some(limit) = self.min_numeric_cost_pct {
            if report.numeric_pct < limit {
                violations.push(PolicyViolation {
                    rule: "min_numeric_cost_pct".to_string(),
                    actual: format!("{:.1}", report.numeric_pct),
                    limit: format!("{limit:.1}"),
                    message: format!(
                        "numeric spend share {:.1}% is below the required {limit:.1}%",
                        report.numeric_pct
                    ),
                    severity: Severity::Error,
                });
            }
        }

        if let Some(limit) = self.max_unsupported_dollars {
            if report.unsupported_estimate.amount() > limit {
                violations.push(PolicyViolation {
                    rule: "max_unsupported_dollars".to_string(),
                    actual: report.unsupported_estimate.to_display(),
                    limit: limit.to_string(),
                    message: format!(
                        "unsupported spend estimate {} exceeds {limit}",
                        report.unsupported_estimate.to_display()
                    ),
                    severity: Severity::Error,
                });
            }
        }

        if let Some(limit) = self.max_symbolic_dollars {
            if report.symbolic_bound.amount() > limit {
                violations.push(PolicyViolation {
                    rule: "max_symbolic_dollars".to_string(),
                    actual: report.symbolic_bound.to_display(),
                    limit: limit.to_string(),
                    message: format!(
                        "symbolic spend bound {} exceeds {limit}",
                        report.symbolic_bound.to_display()
                    ),
                    severity: Severity::Error,
                });
            }
        }

        if self.block_on_any_unsupported && report.unsupported_resources > 0 {
            violations.push(PolicyViolation {
                rule: "block_on_any_unsupported".to_string(),
                actual: report.unsupported_resources.to_string(),
                limit: "0".to_string(),
                message: format!(
                    "{} resource(s) have no mapper or registry profile",
                    report.unsupported_resources
                ),
                severity: Severity::Block,
            });
        }

        if self.block_on_any_symbolic && report.symbolic_units > 0 {
            violations.push(PolicyViolation {
                rule: "block_on_any_symbolic".to_string(),
                actual: report.symbolic_units.to_string(),
                limit: "0".to_string(),
                message: format!(
                    "{} cost unit(s) could not be priced numerically",
                    report.symbolic_units
                ),
                severity: Severity::Block,
            });
        }

        if let Some(limit) = self.max_unsupported_resources {
            if report.unsupported_resources > limit {
                violations.push(PolicyViolation {
                    rule: "max_unsupported_resources".to_string(),
                    actual: report.unsupported_resources.to_string(),
                    limit: limit.to_string(),
                    message: format!(
                        "{} unsupported resources exceed the limit of {limit}",
                        report.unsupported_resources
                    ),
                    severity: Severity::Error,
                });
            }
        }

        if strict && report.unbounded_blocked_expansions > 0 {
            violations.push(PolicyViolation {
                rule: "blocked_expansion".to_string(),
                actual: report.unbounded_blocked_expansions.to_string(),
                limit: "0".to_string(),
                message: format!(
                    "{} blocked expansion(s) have no computable cost bound",
                    report.unbounded_blocked_expansions
                ),
                severity: Severity::Block,
            });
        }

        PolicyResult {
            policy_name: self.name.clone(),
            passed: violations.is_empty(),
            violations,
        }
    }
}
