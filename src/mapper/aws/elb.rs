//! Load balancer mapper (ALB/NLB)
//!
//! Fixed hourly charge plus capacity units, which are usage-based.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

/// Consumed load balancer capacity units per month
pub const CAPACITY_UNITS: &str = "capacity_units";

pub struct LoadBalancerMapper;

impl LoadBalancerMapper {
    fn balancer_type(asset: &AssetNode) -> &str {
        asset.attr_str("load_balancer_type").unwrap_or("application")
    }
}

impl ResourceMapper for LoadBalancerMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_lb".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.9,
            high_impact: false,
            category: "network".to_string(),
            cost_components: vec!["load_balancer_hours".to_string(), "capacity_units".to_string()],
            notes: "hourly charge plus LCU/NLCU consumption; classic load balancers are out \
                    of scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        Ok(vec![
            ctx.resolve(asset, metrics::MONTHLY_HOURS),
            ctx.resolve(asset, CAPACITY_UNITS),
        ])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let balancer_type = Self::balancer_type(asset);
        let key = |family: &str| {
            RateKey::new("aws", "AWSELB", &asset.provider.region)
                .with_attr("productFamily", family)
                .with_attr("balancerType", balancer_type)
        };

        let mut units = Vec::with_capacity(2);
        if let Some(hours) = usage.iter().find(|v| v.metric == metrics::MONTHLY_HOURS) {
            units.push(CostUnit::from_usage(
                "load_balancer_hours",
                "Hrs",
                key("Load Balancer"),
                hours,
            ));
        }
        if let Some(capacity) = usage.iter().find(|v| v.metric == CAPACITY_UNITS) {
            units.push(CostUnit::from_usage(
                "capacity_units",
                "LCU-Hrs",
                key("Load Balancer Capacity"),
                capacity,
            ));
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Cardinality, ProviderContext};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn lb() -> AssetNode {
        AssetNode {
            address: "aws_lb.public".to_string(),
            resource_type: "aws_lb".to_string(),
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
        }
    }

    #[test]
    fn test_hours_numeric_capacity_symbolic_by_default() {
        let mapper = LoadBalancerMapper;
        let asset = lb();
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units.len(), 2);
        let hours = units
            .iter()
            .find(|u| u.component_name == "load_balancer_hours")
            .unwrap();
        assert_eq!(hours.quantity, Some(Decimal::from(730)));

        let capacity = units
            .iter()
            .find(|u| u.component_name == "capacity_units")
            .unwrap();
        assert!(capacity.is_symbolic);
    }
}
