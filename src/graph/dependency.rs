//! Canonical, sealable DAG of resource references
//!
//! Nodes are resource addresses; edges are reference relations.
//! The graph is mutable during parse, immutable after `seal()`.
//! Sealing computes the canonical topological order (ties broken by
//! address string order) and rejects cycles; `must_be_closed()`
//! verifies no edge points outside the graph.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::GraphError;

/// A `count`/`for_each` that could not be statically resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedExpansion {
    pub address: String,

    /// The unresolved expression, e.g. `count = "${var.replicas}"`
    pub reason: String,

    /// Statically known ceiling on the instance count, when one exists
    pub upper_bound: Option<u64>,
}

/// Records expansions the planner could not resolve.
///
/// Strict mode turns unbounded blocked expansions into policy
/// failures; permissive mode degrades confidence and surfaces them as
/// symbolic rows. The guard itself only records.
#[derive(Debug, Default)]
pub struct ExpansionGuard {
    blocked: Vec<BlockedExpansion>,
}

impl ExpansionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, address: &str, reason: &str, upper_bound: Option<u64>) {
        debug!(address, reason, "expansion blocked");
        self.blocked.push(BlockedExpansion {
            address: address.to_string(),
            reason: reason.to_string(),
            upper_bound,
        });
    }

    pub fn is_blocked(&self, address: &str) -> bool {
        self.blocked.iter().any(|b| b.address == address)
    }

    pub fn blocked(&self) -> &[BlockedExpansion] {
        &self.blocked
    }

    pub fn unbounded(&self) -> impl Iterator<Item = &BlockedExpansion> {
        self.blocked.iter().filter(|b| b.upper_bound.is_none())
    }
}

/// Dependency graph over resource addresses.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    // from -> set of referenced addresses
    edges: BTreeMap<String, BTreeSet<String>>,
    sealed: bool,
    topo: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.nodes.contains(address)
    }

    pub fn add_node(&mut self, address: &str) -> Result<(), GraphError> {
        if self.sealed {
            return Err(GraphError::Sealed);
        }
        self.nodes.insert(address.to_string());
        Ok(())
    }

    /// Add a reference edge `from -> to`. Endpoints need not exist
    /// yet; closure is checked by [`must_be_closed`].
    ///
    /// [`must_be_closed`]: DependencyGraph::must_be_closed
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if self.sealed {
            return Err(GraphError::Sealed);
        }
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        Ok(())
    }

    /// Transition to read-only. Computes the canonical topological
    /// order and fails on any cycle. Idempotent.
    pub fn seal(&mut self) -> Result<(), GraphError> {
        if self.sealed {
            return Ok(());
        }

        let topo = self.topo_sort()?;
        debug!(nodes = self.nodes.len(), "dependency graph sealed");
        self.topo = topo;
        self.sealed = true;
        Ok(())
    }

    /// Verify every edge endpoint resolves to a node in the graph.
    pub fn must_be_closed(&self) -> Result<(), GraphError> {
        for (from, targets) in &self.edges {
            if !self.nodes.contains(from) {
                return Err(GraphError::DanglingReference {
                    from: from.clone(),
                    to: from.clone(),
                });
            }
            for to in targets {
                if !self.nodes.contains(to) {
                    return Err(GraphError::DanglingReference {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Canonical order: dependencies before dependents, ties broken
    /// by address string order. Available after seal.
    pub fn topo_order(&self) -> &[String] {
        &self.topo
    }

    /// Direct dependencies of an address, in address order.
    pub fn dependencies_of(&self, address: &str) -> Vec<&str> {
        self.edges
            .get(address)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The chain of addresses from `address` down through its first
    /// (address-ordered) dependency at each level. Used for lineage.
    pub fn dependency_path(&self, address: &str) -> Vec<String> {
        let mut path = vec![address.to_string()];
        let mut current = address.to_string();
        // bounded by node count; cycles are impossible after seal
        for _ in 0..self.nodes.len() {
            let next = match self.edges.get(&current).and_then(|s| s.iter().next()) {
                Some(n) if self.nodes.contains(n) => n.clone(),
                _ => break,
            };
            path.push(next.clone());
            current = next;
        }
        path
    }

    // Kahn's algorithm over BTree collections; deterministic by
    // construction. An edge `from -> to` means `from` depends on
    // `to`, so `to` sorts first.
    fn topo_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: BTreeMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for (from, targets) in &self.edges {
            for to in targets {
                // edges to unknown nodes are must_be_closed's problem
                if !self.nodes.contains(from) || !self.nodes.contains(to) {
                    continue;
                }
                *in_degree.entry(from.as_str()).or_insert(0) += 1;
                dependents.entry(to.as_str()).or_default().insert(from);
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(&next) = ready.iter().next() {
            ready.remove(next);
            order.push(next.to_string());
            if let Some(deps) = dependents.get(next) {
                for dependent in deps {
                    let d = in_degree.get_mut(dependent).expect("tracked node");
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(n, _)| *n)
                .collect();
            return Err(GraphError::Cycle(stuck.join(" -> ")));
        }
        Ok(order)
    }
}
