//! NAT gateway mapper
//!
//! Hourly charge plus per-GB processing, the latter usage-based.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct NatGatewayMapper;

impl ResourceMapper for NatGatewayMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_nat_gateway".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.9,
            high_impact: false,
            category: "network".to_string(),
            cost_components: vec!["gateway_hours".to_string(), "data_processed".to_string()],
            notes: "hourly charge plus per-GB processing".to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        Ok(vec![
            ctx.resolve(asset, metrics::MONTHLY_HOURS),
            ctx.resolve(asset, metrics::DATA_TRANSFER_GB),
        ])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let key = |family: &str| {
            RateKey::new("aws", "AmazonVPC", &asset.provider.region)
                .with_attr("productFamily", family)
                .with_attr("group", "NGW")
        };

        let mut units = Vec::with_capacity(2);
        if let Some(hours) = usage.iter().find(|v| v.metric == metrics::MONTHLY_HOURS) {
            units.push(CostUnit::from_usage(
                "gateway_hours",
                "Hrs",
                key("NAT Gateway"),
                hours,
            ));
        }
        if let Some(data) = usage.iter().find(|v| v.metric == metrics::DATA_TRANSFER_GB) {
            units.push(CostUnit::from_usage(
                "data_processed",
                "GB",
                key("NAT Gateway Data"),
                data,
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

    #[test]
    fn test_hours_default_data_symbolic() {
        let mapper = NatGatewayMapper;
        let asset = AssetNode {
            address: "aws_nat_gateway.main".to_string(),
            resource_type: "aws_nat_gateway".to_string(),
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
        };
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].quantity, Some(Decimal::from(730)));
        assert!(units[1].is_symbolic);
    }
}
