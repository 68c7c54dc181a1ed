//! Named confidence decay rules with before/after tracking
//!
//! Each rule carries a base factor, a compounding flag and a floor.
//! Compounding rules multiply on every application; non-compounding
//! rules apply once per tracker and are no-ops afterwards. Every
//! application is recorded so the response can explain exactly how a
//! confidence arrived at its value.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The named decay rules known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecayRule {
    /// A required attribute value could not be determined
    UnknownValue,

    /// `count` is not statically resolvable
    UnknownCount,

    /// `for_each` is not statically resolvable
    UnknownForEach,

    /// No usage data for a usage-based metric
    UnknownUsage,

    /// No rate found for a cost unit's rate key
    MissingRate,

    /// A default usage value was assumed
    DefaultUsage,

    /// The pinned snapshot is past its effective window
    StaleSnapshot,
}

impl DecayRule {
    /// Multiplier applied to the current confidence.
    pub fn factor(self) -> f64 {
        match self {
            DecayRule::UnknownValue => 0.5,
            DecayRule::UnknownCount => 0.4,
            DecayRule::UnknownForEach => 0.4,
            DecayRule::UnknownUsage => 0.6,
            DecayRule::MissingRate => 0.5,
            DecayRule::DefaultUsage => 0.85,
            DecayRule::StaleSnapshot => 0.9,
        }
    }

    /// Whether repeated applications keep multiplying.
    pub fn compounds(self) -> bool {
        matches!(self, DecayRule::DefaultUsage | DecayRule::StaleSnapshot)
    }

    /// The rule never drags a value below its floor.
    pub fn floor(self) -> f64 {
        match self {
            DecayRule::UnknownValue => 0.1,
            DecayRule::UnknownCount => 0.1,
            DecayRule::UnknownForEach => 0.1,
            DecayRule::UnknownUsage => 0.2,
            DecayRule::MissingRate => 0.1,
            DecayRule::DefaultUsage => 0.5,
            DecayRule::StaleSnapshot => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DecayRule::UnknownValue => "unknown_value",
            DecayRule::UnknownCount => "unknown_count",
            DecayRule::UnknownForEach => "unknown_for_each",
            DecayRule::UnknownUsage => "unknown_usage",
            DecayRule::MissingRate => "missing_rate",
            DecayRule::DefaultUsage => "default_usage",
            DecayRule::StaleSnapshot => "stale_snapshot",
        }
    }
}

/// One recorded decay application
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DecayEvent {
    pub rule: DecayRule,

    /// Human-readable trigger, e.g. `count = "${var.replicas}"`
    pub cause: String,

    /// Entity the decay applied to (address or component)
    pub source: String,

    pub before: f64,
    pub after: f64,
}

impl DecayEvent {
    /// One-line explanation for the response.
    pub fn describe(&self) -> String {
        format!(
            "{}: {} ({} -> {}) on {}",
            self.rule.as_str(),
            self.cause,
            format_args!("{:.2}", self.before),
            format_args!("{:.2}", self.after),
            self.source
        )
    }
}

/// Tracks one confidence value through its decays.
#[derive(Debug, Clone)]
pub struct DecayTracker {
    value: f64,
    source: String,
    applied: HashSet<DecayRule>,
    events: Vec<DecayEvent>,
}

impl DecayTracker {
    pub fn new(initial: f64, source: impl Into<String>) -> Self {
        Self {
            value: initial.clamp(0.0, 1.0),
            source: source.into(),
            applied: HashSet::new(),
            events: Vec::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn events(&self) -> &[DecayEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<DecayEvent> {
        self.events
    }

    /// Apply a rule. Returns the value after application.
    pub fn apply(&mut self, rule: DecayRule, cause: impl Into<String>) -> f64 {
        if !rule.compounds() && self.applied.contains(&rule) {
            return self.value;
        }

        let before = self.value;
        let after = (before * rule.factor()).max(rule.floor()).min(before);

        self.applied.insert(rule);
        self.events.push(DecayEvent {
            rule,
            cause: cause.into(),
            source: self.source.clone(),
            before,
            after,
        });
        self.value = after;
        after
    }
}
