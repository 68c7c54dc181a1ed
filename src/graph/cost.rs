//! Cost graph: cost units attached to asset nodes
//!
//! Constructed only from a finalized asset graph. Units arrive
//! through the pipeline (already normalized by the emission rules)
//! and are stamped with their owning address and category here.
//! Roll-ups by provider, service, category and asset are pessimistic
//! MIN aggregations over the contributing units.

use std::collections::BTreeMap;

use crate::confidence::{AggregateConfidence, MinAggregator};
use crate::mapper::CostUnit;
use crate::money::{Currency, Money};

use super::asset::{AssetGraph, AssetNode};
use super::GraphError;

/// Confidence contributed by a resource nobody can map.
const UNSUPPORTED_CONFIDENCE: f64 = 0.3;

/// One roll-up bucket
#[derive(Debug, Clone)]
pub struct Rollup {
    pub monthly: Money,
    pub confidence: AggregateConfidence,
    pub unit_count: usize,
}

/// Cost units keyed by asset address, in canonical order.
#[derive(Debug)]
pub struct CostGraph {
    assets: AssetGraph,
    units: BTreeMap<String, Vec<CostUnit>>,
    // address -> resource_type with no registered mapper
    unsupported: BTreeMap<String, String>,
    currency: Currency,
}

impl CostGraph {
    /// Fails unless the asset graph is finalized.
    pub fn new_enforced(assets: AssetGraph) -> Result<Self, GraphError> {
        if !assets.is_finalized() {
            return Err(GraphError::NotFinalized);
        }
        Ok(Self {
            assets,
            units: BTreeMap::new(),
            unsupported: BTreeMap::new(),
            currency: Currency::Usd,
        })
    }

    pub fn assets(&self) -> &AssetGraph {
        &self.assets
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Attach normalized units for an asset, stamping address and
    /// category. Units are ordered by component name within the
    /// asset; assets keep the canonical graph order.
    pub fn attach(
        &mut self,
        address: &str,
        category: &str,
        mut units: Vec<CostUnit>,
    ) -> Result<(), GraphError> {
        if !self.assets.contains(address) {
            return Err(GraphError::UnknownAddress(address.to_string()));
        }
        for unit in &mut units {
            unit.address = address.to_string();
            unit.category = category.to_string();
        }
        units.sort_by(|a, b| a.component_name.cmp(&b.component_name));
        self.units.entry(address.to_string()).or_default().extend(units);
        Ok(())
    }

    pub fn record_unsupported(&mut self, address: &str, resource_type: &str) {
        self.unsupported
            .insert(address.to_string(), resource_type.to_string());
    }

    pub fn unsupported(&self) -> &BTreeMap<String, String> {
        &self.unsupported
    }

    pub fn unit_count(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    /// Assets with their units, in canonical order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = (&AssetNode, &[CostUnit])> {
        self.assets.iter_ordered().map(|asset| {
            let units = self
                .units
                .get(&asset.address)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            (asset, units)
        })
    }

    /// All units in canonical order.
    pub fn units_ordered(&self) -> impl Iterator<Item = &CostUnit> {
        self.iter_ordered().flat_map(|(_, units)| units.iter())
    }

    /// Canonical address order for mutation passes (pricing).
    pub fn addresses_ordered(&self) -> Vec<String> {
        self.assets
            .iter_ordered()
            .map(|a| a.address.clone())
            .collect()
    }

    pub fn units_of_mut(&mut self, address: &str) -> Option<&mut Vec<CostUnit>> {
        self.units.get_mut(address)
    }

    pub fn units_of(&self, address: &str) -> &[CostUnit] {
        self.units.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record the estimation currency once pricing has resolved it.
    pub fn set_currency(&mut self, currency: Currency) {
        self.currency = currency;
    }

    /// Pessimistic aggregate for one asset's units.
    pub fn asset_confidence(&self, address: &str) -> AggregateConfidence {
        let mut agg = MinAggregator::new();
        for unit in self.units_of(address) {
            agg.record(
                unit.confidence,
                unit.symbolic_reason
                    .clone()
                    .unwrap_or_else(|| "mapper emission".to_string()),
                format!("{}:{}", address, unit.component_name),
            );
        }
        agg.result()
    }

    /// Project-wide pessimistic aggregate: every unit contributes,
    /// and every unsupported resource drags the result down.
    pub fn aggregate_confidence(&self) -> AggregateConfidence {
        let mut agg = MinAggregator::new();
        for unit in self.units_ordered() {
            agg.record(
                unit.confidence,
                unit.symbolic_reason
                    .clone()
                    .unwrap_or_else(|| "mapper emission".to_string()),
                format!("{}:{}", unit.address, unit.component_name),
            );
        }
        for (address, resource_type) in &self.unsupported {
            agg.record(
                UNSUPPORTED_CONFIDENCE,
                format!("unsupported resource type {resource_type}"),
                address.clone(),
            );
        }
        agg.result()
    }

    fn rollup_by<F>(&self, key_of: F) -> BTreeMap<String, Rollup>
    where
        F: Fn(&CostUnit) -> String,
    {
        let mut monthly: BTreeMap<String, Money> = BTreeMap::new();
        let mut aggs: BTreeMap<String, MinAggregator> = BTreeMap::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();

        for unit in self.units_ordered() {
            let key = key_of(unit);
            let entry = monthly
                .entry(key.clone())
                .or_insert_with(|| Money::zero(self.currency));
            if let Some(amount) = &unit.amount {
                // same-currency by the uniform-snapshot invariant
                if let Ok(sum) = entry.add(amount) {
                    *entry = sum;
                }
            }
            aggs.entry(key.clone()).or_default().record(
                unit.confidence,
                unit.symbolic_reason
                    .clone()
                    .unwrap_or_else(|| "mapper emission".to_string()),
                format!("{}:{}", unit.address, unit.component_name),
            );
            *counts.entry(key).or_insert(0) += 1;
        }

        monthly
            .into_iter()
            .map(|(key, total)| {
                let confidence = aggs.get(&key).map(|a| a.result()).unwrap_or_else(
                    AggregateConfidence::empty,
                );
                let unit_count = counts.get(&key).copied().unwrap_or(0);
                (
                    key,
                    Rollup {
                        monthly: total,
                        confidence,
                        unit_count,
                    },
                )
            })
            .collect()
    }

    pub fn by_provider(&self) -> BTreeMap<String, Rollup> {
        self.rollup_by(|u| u.rate_key.provider_id.clone())
    }

    pub fn by_service(&self) -> BTreeMap<String, Rollup> {
        self.rollup_by(|u| u.rate_key.service.clone())
    }

    pub fn by_category(&self) -> BTreeMap<String, Rollup> {
        self.rollup_by(|u| u.category.clone())
    }

    pub fn by_asset(&self) -> BTreeMap<String, Rollup> {
        self.rollup_by(|u| u.address.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::dependency::DependencyGraph;
    use crate::graph::{AssetNode, Cardinality, ProviderContext};
    use crate::mapper::metrics;
    use crate::pricing::RateKey;
    use rust_decimal::Decimal;

    fn build_graph(addresses: &[&str]) -> CostGraph {
        let mut dep = DependencyGraph::new();
        for a in addresses {
            dep.add_node(a).unwrap();
        }
        dep.seal().unwrap();
        let mut assets = AssetGraph::new_enforced(dep).unwrap();
        for a in addresses {
            assets
                .add_asset(AssetNode {
                    address: a.to_string(),
                    resource_type: "aws_instance".to_string(),
                    attributes: BTreeMap::new(),
                    provider: ProviderContext {
                        provider_id: "aws".to_string(),
                        alias: "aws".to_string(),
                        region: "us-east-1".to_string(),
                        account_id: None,
                    },
                    cardinality: Cardinality::known(1),
                    instance_key: None,
                    children: vec![],
                    tags: BTreeMap::new(),
                })
                .unwrap();
        }
        assets.finalize();
        CostGraph::new_enforced(assets).unwrap()
    }

    fn priced_unit(component: &str, confidence: f64, amount: &str) -> CostUnit {
        let mut unit = CostUnit::concrete(
            component,
            "Hrs",
            RateKey::new("aws", "AmazonEC2", "us-east-1"),
            Decimal::from(730),
            confidence,
            metrics::MONTHLY_HOURS,
        );
        unit.amount = Some(Money::new_from_str(amount, Currency::Usd).unwrap());
        unit.snapshot_id = Some("snap-1".to_string());
        unit
    }

    #[test]
    fn test_requires_finalized_asset_graph() {
        let mut dep = DependencyGraph::new();
        dep.add_node("a").unwrap();
        dep.seal().unwrap();
        let assets = AssetGraph::new_enforced(dep).unwrap();
        // not finalized
        assert!(matches!(
            CostGraph::new_enforced(assets),
            Err(GraphError::NotFinalized)
        ));
    }

    #[test]
    fn test_attach_stamps_and_orders_units() {
        let mut graph = build_graph(&["aws_instance.web"]);
        graph
            .attach(
                "aws_instance.web",
                "compute",
                vec![priced_unit("zeta", 0.9, "1.00"), priced_unit("alpha", 0.9, "2.00")],
            )
            .unwrap();

        let units = graph.units_of("aws_instance.web");
        assert_eq!(units[0].component_name, "alpha");
        assert_eq!(units[0].address, "aws_instance.web");
        assert_eq!(units[0].category, "compute");
    }

    #[test]
    fn test_attach_to_unknown_address_fails() {
        let mut graph = build_graph(&["aws_instance.web"]);
        assert!(matches!(
            graph.attach("aws_instance.nope", "compute", vec![]),
            Err(GraphError::UnknownAddress(_))
        ));
    }

    #[test]
    fn test_aggregate_is_minimum_of_units() {
        let mut graph = build_graph(&["aws_instance.a", "aws_instance.b"]);
        graph
            .attach("aws_instance.a", "compute", vec![priced_unit("hours", 0.95, "70.08")])
            .unwrap();
        graph
            .attach("aws_instance.b", "compute", vec![priced_unit("hours", 0.38, "10.00")])
            .unwrap();

        let agg = graph.aggregate_confidence();
        assert_eq!(agg.value, 0.38);
        assert!(agg.lowest_source.starts_with("aws_instance.b"));
    }

    #[test]
    fn test_unsupported_resources_drag_confidence() {
        let mut graph = build_graph(&["aws_instance.a"]);
        graph
            .attach("aws_instance.a", "compute", vec![priced_unit("hours", 0.95, "70.08")])
            .unwrap();
        graph.record_unsupported("aws_instance.a", "aws_exotic_thing");

        let agg = graph.aggregate_confidence();
        assert_eq!(agg.value, UNSUPPORTED_CONFIDENCE);
    }

    #[test]
    fn test_rollups_sum_amounts_and_take_min_confidence() {
        let mut graph = build_graph(&["aws_instance.a", "aws_instance.b"]);
        graph
            .attach("aws_instance.a", "compute", vec![priced_unit("hours", 0.95, "70.08")])
            .unwrap();
        graph
            .attach("aws_instance.b", "compute", vec![priced_unit("hours", 0.8, "35.04")])
            .unwrap();

        let by_category = graph.by_category();
        let compute = by_category.get("compute").unwrap();
        assert_eq!(compute.monthly.to_display(), "105.12");
        assert_eq!(compute.confidence.value, 0.8);
        assert_eq!(compute.unit_count, 2);

        let by_provider = graph.by_provider();
        assert!(by_provider.contains_key("aws"));
    }
}
