//! Pessimistic-MIN confidence aggregation with cause tracking
//!
//! The aggregate of a set of confidences is their minimum, full stop.
//! The aggregator tracks which contributor produced the minimum so the
//! response can explain the number. Averaging entry points exist only
//! to fail loudly (see [`mean`] and friends).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence at or above this is reported as `high`.
pub const HIGH_THRESHOLD: f64 = 0.9;

/// Confidence at or above this is reported as `medium`.
pub const MEDIUM_THRESHOLD: f64 = 0.7;

/// Confidence at or above this is reported as `low`; below is `unknown`.
pub const LOW_THRESHOLD: f64 = 0.5;

/// Qualitative confidence level derived from a numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl ConfidenceLevel {
    pub fn from_value(value: f64) -> Self {
        if value >= HIGH_THRESHOLD {
            ConfidenceLevel::High
        } else if value >= MEDIUM_THRESHOLD {
            ConfidenceLevel::Medium
        } else if value >= LOW_THRESHOLD {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Unknown => "unknown",
        }
    }
}

/// One `(value, cause, source)` input to the aggregator
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Contributor {
    /// Confidence value in [0, 1]
    pub value: f64,

    /// What produced this value, e.g. "mapper ceiling" or "missing_rate decay"
    pub cause: String,

    /// Which entity contributed it, e.g. a resource address or component name
    pub source: String,
}

/// Result of a pessimistic aggregation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AggregateConfidence {
    /// The minimum over all contributors (1.0 when there are none)
    pub value: f64,

    /// Cause of the minimum contributor
    pub lowest_cause: String,

    /// Source of the minimum contributor
    pub lowest_source: String,

    /// Qualitative level for the final value
    pub level: ConfidenceLevel,

    /// All contributors, sorted ascending by value
    pub contributors: Vec<Contributor>,
}

impl AggregateConfidence {
    /// An aggregate with no contributors carries no doubt.
    pub fn empty() -> Self {
        Self {
            value: 1.0,
            lowest_cause: "no contributors".to_string(),
            lowest_source: String::new(),
            level: ConfidenceLevel::High,
            contributors: Vec::new(),
        }
    }
}

/// Pessimistic aggregator: records contributors, reports the minimum.
#[derive(Debug, Default)]
pub struct MinAggregator {
    contributors: Vec<Contributor>,
}

impl MinAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a contributor. Values are clamped to [0, 1].
    pub fn record(&mut self, value: f64, cause: impl Into<String>, source: impl Into<String>) {
        self.contributors.push(Contributor {
            value: value.clamp(0.0, 1.0),
            cause: cause.into(),
            source: source.into(),
        });
    }

    /// Fold another aggregate in as a single contributor.
    pub fn record_aggregate(&mut self, aggregate: &AggregateConfidence, source: impl Into<String>) {
        self.record(aggregate.value, aggregate.lowest_cause.clone(), source);
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Produce the final aggregate. The result is always ≤ every
    /// contributor; [`assert_monotone`] re-checks this at boundaries.
    pub fn result(&self) -> AggregateConfidence {
        let mut sorted = self.contributors.clone();
        sorted.sort_by(|a, b| {
            a.value
                .partial_cmp(&b.value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.cmp(&b.source))
        });

        match sorted.first() {
            None => AggregateConfidence::empty(),
            Some(lowest) => AggregateConfidence {
                value: lowest.value,
                lowest_cause: lowest.cause.clone(),
                lowest_source: lowest.source.clone(),
                level: ConfidenceLevel::from_value(lowest.value),
                contributors: sorted,
            },
        }
    }
}

/// Errors from the aggregation surface
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("averaging confidences is forbidden; aggregate with min() instead")]
    ForbiddenAveraging,

    #[error("aggregate {aggregate} exceeds minimum contributor {minimum}")]
    NotMonotone { aggregate: String, minimum: String },
}

/// Verify `aggregate ≤ min(components)`. Enforced at asset, roll-up
/// and project boundaries.
pub fn assert_monotone(aggregate: f64, components: &[f64]) -> Result<(), AggregationError> {
    let minimum = components.iter().copied().fold(1.0_f64, f64::min);
    if aggregate > minimum + f64::EPSILON {
        return Err(AggregationError::NotMonotone {
            aggregate: format!("{aggregate:.6}"),
            minimum: format!("{minimum:.6}"),
        });
    }
    Ok(())
}

/// Arithmetic-mean aggregation. Always fails: a mean can report more
/// confidence than its weakest input, which this engine never does.
pub fn mean(_values: &[f64]) -> Result<f64, AggregationError> {
    Err(AggregationError::ForbiddenAveraging)
}

/// Weighted-mean aggregation. Always fails; see [`mean`].
pub fn weighted_mean(_values: &[(f64, f64)]) -> Result<f64, AggregationError> {
    Err(AggregationError::ForbiddenAveraging)
}

/// Harmonic-mean aggregation. Always fails; see [`mean`].
pub fn harmonic_mean(_values: &[f64]) -> Result<f64, AggregationError> {
    Err(AggregationError::ForbiddenAveraging)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_wins_and_cause_is_tracked() {
        let mut agg = MinAggregator::new();
        agg.record(0.95, "mapper ceiling", "aws_instance.web");
        agg.record(0.38, "unknown_count decay", "aws_instance.workers");
        agg.record(0.9, "provided usage", "aws_s3_bucket.logs");

        let result = agg.result();
        assert_eq!(result.value, 0.38);
        assert_eq!(result.lowest_source, "aws_instance.workers");
        assert_eq!(result.lowest_cause, "unknown_count decay");
        assert_eq!(result.level, ConfidenceLevel::Unknown);

        // contributors sorted ascending
        let values: Vec<f64> = result.contributors.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![0.38, 0.9, 0.95]);
    }

    #[test]
    fn test_empty_aggregate_is_neutral() {
        let agg = MinAggregator::new();
        let result = agg.result();
        assert_eq!(result.value, 1.0);
        assert!(result.contributors.is_empty());
    }

    #[test]
    fn test_values_are_clamped() {
        let mut agg = MinAggregator::new();
        agg.record(1.5, "bogus", "x");
        agg.record(-0.2, "bogus", "y");
        let result = agg.result();
        assert_eq!(result.value, 0.0);
        assert_eq!(result.contributors.last().unwrap().value, 1.0);
    }

    #[test]
    fn test_levels() {
        assert_eq!(ConfidenceLevel::from_value(0.95), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_value(0.9), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_value(0.75), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_value(0.5), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_value(0.49), ConfidenceLevel::Unknown);
    }

    #[test]
    fn test_averaging_fails_loudly() {
        assert_eq!(
            mean(&[0.9, 0.1]),
            Err(AggregationError::ForbiddenAveraging)
        );
        assert_eq!(
            weighted_mean(&[(0.9, 1.0)]),
            Err(AggregationError::ForbiddenAveraging)
        );
        assert_eq!(
            harmonic_mean(&[0.9, 0.1]),
            Err(AggregationError::ForbiddenAveraging)
        );
    }

    #[test]
    fn test_monotonicity_assertion() {
        assert!(assert_monotone(0.3, &[0.3, 0.9]).is_ok());
        assert!(assert_monotone(0.5, &[0.3, 0.9]).is_err());
        assert!(assert_monotone(0.9, &[]).is_ok());
    }
}
