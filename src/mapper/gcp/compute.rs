//! Compute Engine instance mapper

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct ComputeInstanceMapper;

impl ResourceMapper for ComputeInstanceMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "google_compute_instance".to_string(),
            cloud: Cloud::Gcp,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.95,
            high_impact: true,
            category: "compute".to_string(),
            cost_components: vec!["instance_hours".to_string()],
            notes: "on-demand machine hours; sustained-use discounts are out of scope"
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
        let Some(machine_type) = asset.attr_str("machine_type") else {
            return Ok(vec![CostUnit::symbolic(
                "instance_hours",
                "Hrs",
                RateKey::new("gcp", "ComputeEngine", &asset.provider.region),
                "machine_type is not set",
                0.5,
            )]);
        };

        let key = RateKey::new("gcp", "ComputeEngine", &asset.provider.region)
            .with_attr("machineType", machine_type)
            .with_attr("provisioningModel", "OnDemand");

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

    #[test]
    fn test_machine_hours_from_default_policy() {
        let mapper = ComputeInstanceMapper;
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "machine_type".to_string(),
            AttributeValue::String("e2-standard-4".to_string()),
        );
        let asset = AssetNode {
            address: "google_compute_instance.app".to_string(),
            resource_type: "google_compute_instance".to_string(),
            attributes,
            provider: ProviderContext {
                provider_id: "google".to_string(),
                alias: "google".to_string(),
                region: "us-central1".to_string(),
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

        assert_eq!(units[0].quantity, Some(Decimal::from(730)));
        assert_eq!(
            units[0].rate_key.attributes.get("machineType").map(String::as_str),
            Some("e2-standard-4")
        );
    }
}
