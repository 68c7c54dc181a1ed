//! The three-stage graph pipeline
//!
//! Dependency graph (mutable until sealed) → asset graph (built only
//! from a sealed dependency graph) → cost graph (built only from a
//! finalized asset graph). Sealing is monotone: nothing downstream
//! can re-open an upstream graph.

pub mod asset;
pub mod cost;
pub mod dependency;
pub mod invariants;

pub use asset::{AssetGraph, AssetNode, AttributeValue, Cardinality, ProviderContext};
pub use cost::CostGraph;
pub use dependency::{BlockedExpansion, DependencyGraph, ExpansionGuard};

use thiserror::Error;

/// Graph construction and lifecycle errors
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph is sealed; mutation is not allowed")]
    Sealed,

    #[error("dependency graph must be sealed before use")]
    NotSealed,

    #[error("asset graph must be finalized before use")]
    NotFinalized,

    #[error("dependency cycle through: {0}")]
    Cycle(String),

    #[error("dangling reference: edge {from} -> {to} has no node for {to}")]
    DanglingReference { from: String, to: String },

    #[error("unknown address: {0}")]
    UnknownAddress(String),

    #[error("invariant violations: {0}")]
    Invariant(String),

    #[error("duplicate address: {0}")]
    DuplicateAddress(String),
}
