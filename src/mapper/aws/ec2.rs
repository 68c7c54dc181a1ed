//! EC2 instance mapper
//!
//! On-demand instance hours keyed by instance type, operating system
//! and tenancy. Always-on: hours come from the default policy (730)
//! unless the caller's usage profile says otherwise.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct Ec2InstanceMapper;

impl Ec2InstanceMapper {
    fn operating_system(asset: &AssetNode) -> &str {
        // scanners that resolve the AMI set this; plain plans default
        // to Linux pricing
        asset.attr_str("operating_system").unwrap_or("Linux")
    }

    fn tenancy(asset: &AssetNode) -> &str {
        match asset.attr_str("tenancy") {
            Some("dedicated") => "Dedicated",
            Some("host") => "Host",
            _ => "Shared",
        }
    }
}

impl ResourceMapper for Ec2InstanceMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_instance".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.95,
            high_impact: true,
            category: "compute".to_string(),
            cost_components: vec!["instance_hours".to_string()],
            notes: "on-demand instance hours; reserved and spot pricing are out of scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        Ok(vec![ctx.resolve(asset, metrics::MONTHLY_HOURS)])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let Some(instance_type) = asset.attr_str("instance_type") else {
            return Ok(vec![CostUnit::symbolic(
                "instance_hours",
                "Hrs",
                RateKey::new("aws", "AmazonEC2", &asset.provider.region),
                "instance_type is not set",
                0.5,
            )]);
        };

        let key = RateKey::new("aws", "AmazonEC2", &asset.provider.region)
            .with_attr("instanceType", instance_type)
            .with_attr("operatingSystem", Self::operating_system(asset))
            .with_attr("tenancy", Self::tenancy(asset));

        let hours = usage
            .iter()
            .find(|v| v.metric == metrics::MONTHLY_HOURS)
            .cloned()
            .unwrap_or_else(|| {
                UsageVector::symbolic(metrics::MONTHLY_HOURS, "no usage data for monthly_hours", 0.6)
            });

        Ok(vec![CostUnit::from_usage(
            "instance_hours",
            "Hrs",
            key,
            &hours,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttributeValue, Cardinality, ProviderContext};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn asset(instance_type: Option<&str>) -> AssetNode {
        let mut attributes = BTreeMap::new();
        if let Some(it) = instance_type {
            attributes.insert(
                "instance_type".to_string(),
                AttributeValue::String(it.to_string()),
            );
        }
        AssetNode {
            address: "aws_instance.web".to_string(),
            resource_type: "aws_instance".to_string(),
            attributes,
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
    fn test_emits_one_priceless_numeric_unit() {
        let mapper = Ec2InstanceMapper;
        let asset = asset(Some("m5.large"));
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.component_name, "instance_hours");
        assert_eq!(unit.quantity, Some(Decimal::from(730)));
        assert!(!unit.is_symbolic);
        // mappers never price
        assert!(unit.amount.is_none());
        assert!(unit.snapshot_id.is_none());

        assert_eq!(
            unit.rate_key.attributes.get("instanceType").map(String::as_str),
            Some("m5.large")
        );
        assert_eq!(
            unit.rate_key.attributes.get("operatingSystem").map(String::as_str),
            Some("Linux")
        );
        assert_eq!(
            unit.rate_key.attributes.get("tenancy").map(String::as_str),
            Some("Shared")
        );
    }

    #[test]
    fn test_missing_instance_type_goes_symbolic() {
        let mapper = Ec2InstanceMapper;
        let asset = asset(None);
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert!(units[0].is_symbolic);
        assert_eq!(
            units[0].symbolic_reason.as_deref(),
            Some("instance_type is not set")
        );
    }
}
