//! Pessimistic confidence algebra
//!
//! Two halves with a strict division of labor: the decay tracker
//! lowers a single value when a degradation is discovered (unknown
//! usage, missing rate, ...) and records why; the MIN aggregator is
//! the only way to combine values across entities. Nothing in this
//! module averages.

pub mod aggregator;
pub mod decay;

pub use aggregator::{AggregateConfidence, ConfidenceLevel, Contributor, MinAggregator};
pub use decay::{DecayEvent, DecayRule, DecayTracker};
