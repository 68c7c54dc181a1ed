//! Typed asset nodes with provider context and cardinality
//!
//! An asset is the provider-agnostic, normalized form of one cloud
//! resource. The asset graph can only be constructed from a sealed
//! dependency graph; provider context and cardinality are finalized
//! here and never change afterwards.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::dependency::DependencyGraph;
use super::GraphError;

/// Typed attribute value; the only dynamic shape in the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(AttributeValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(AttributeValue::Int(i))
                } else {
                    n.as_f64().map(AttributeValue::Float)
                }
            }
            serde_json::Value::String(s) => Some(AttributeValue::String(s.clone())),
            serde_json::Value::Array(items) => Some(AttributeValue::List(
                items.iter().filter_map(Self::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(AttributeValue::Map(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|av| (k.clone(), av)))
                    .collect(),
            )),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// How many instances of a resource will exist.
///
/// Set once at graph construction; immutable thereafter. An asset
/// with unknown cardinality can only ever produce symbolic cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cardinality {
    Known { count: u64 },
    Unknown { reason: String },
}

impl Cardinality {
    pub fn known(count: u64) -> Self {
        Cardinality::Known { count }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Cardinality::Unknown {
            reason: reason.into(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Cardinality::Unknown { .. })
    }
}

/// Provider binding finalized at asset-graph construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderContext {
    pub provider_id: String,
    pub alias: String,
    pub region: String,
    pub account_id: Option<String>,
}

/// One normalized cloud resource. Identity is the address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetNode {
    pub address: String,
    pub resource_type: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub provider: ProviderContext,
    pub cardinality: Cardinality,

    /// Key within an expanded set, e.g. `[0]` or `["blue"]`
    pub instance_key: Option<String>,

    /// Nested billable children, e.g. block devices under an instance
    pub children: Vec<AssetNode>,

    /// Normalized (lowercased-key) resource tags
    pub tags: BTreeMap<String, String>,
}

impl AssetNode {
    pub fn attr(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttributeValue::as_str)
    }

    pub fn attr_int(&self, key: &str) -> Option<i64> {
        self.attr(key).and_then(AttributeValue::as_int)
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(AttributeValue::as_bool)
    }
}

/// Asset graph: owns the assets, keeps the sealed dependency graph.
///
/// Downstream consumers (the cost graph) reach the dependency graph
/// only through this type.
#[derive(Debug)]
pub struct AssetGraph {
    dep: DependencyGraph,
    assets: BTreeMap<String, AssetNode>,
    finalized: bool,
}

impl AssetGraph {
    /// Fails unless the dependency graph is sealed and closed.
    pub fn new_enforced(dep: DependencyGraph) -> Result<Self, GraphError> {
        if !dep.is_sealed() {
            return Err(GraphError::NotSealed);
        }
        dep.must_be_closed()?;
        Ok(Self {
            dep,
            assets: BTreeMap::new(),
            finalized: false,
        })
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Attach one asset. The address must exist in the dependency
    /// graph and must not already carry an asset.
    pub fn add_asset(&mut self, mut asset: AssetNode) -> Result<(), GraphError> {
        if self.finalized {
            return Err(GraphError::Sealed);
        }
        if !self.dep.contains(&asset.address) {
            return Err(GraphError::UnknownAddress(asset.address));
        }
        if self.assets.contains_key(&asset.address) {
            return Err(GraphError::DuplicateAddress(asset.address));
        }
        normalize_tags(&mut asset);
        self.assets.insert(asset.address.clone(), asset);
        Ok(())
    }

    /// Finalize: no further assets may be attached.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn get(&self, address: &str) -> Option<&AssetNode> {
        self.assets.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.assets.contains_key(address)
    }

    /// Assets in canonical order (dependency-graph topological order,
    /// ties by address). Addresses without assets are skipped.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &AssetNode> {
        self.dep
            .topo_order()
            .iter()
            .filter_map(|addr| self.assets.get(addr))
    }

    pub fn dependency_path(&self, address: &str) -> Vec<String> {
        self.dep.dependency_path(address)
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dep
    }
}

fn normalize_tags(asset: &mut AssetNode) {
    let normalized: BTreeMap<String, String> = asset
        .tags
        .iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();
    asset.tags = normalized;
    for child in &mut asset.children {
        normalize_tags(child);
    }
}
