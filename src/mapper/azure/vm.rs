//! Azure virtual machine mapper
//!
//! One parameterized mapper covers the Linux and Windows resource
//! types; the operating system is part of the rate coordinate.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct VirtualMachineMapper {
    resource_type: &'static str,
    operating_system: &'static str,
}

impl VirtualMachineMapper {
    pub fn linux() -> Self {
        Self {
            resource_type: "azurerm_linux_virtual_machine",
            operating_system: "Linux",
        }
    }

    pub fn windows() -> Self {
        Self {
            resource_type: "azurerm_windows_virtual_machine",
            operating_system: "Windows",
        }
    }
}

impl ResourceMapper for VirtualMachineMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: self.resource_type.to_string(),
            cloud: Cloud::Azure,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.95,
            high_impact: true,
            category: "compute".to_string(),
            cost_components: vec!["instance_hours".to_string()],
            notes: "pay-as-you-go machine hours; reservations and hybrid benefit are out of \
                    scope"
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
        let Some(size) = asset.attr_str("size") else {
            return Ok(vec![CostUnit::symbolic(
                "instance_hours",
                "Hrs",
                RateKey::new("azure", "VirtualMachines", &asset.provider.region),
                "size is not set",
                0.5,
            )]);
        };

        let key = RateKey::new("azure", "VirtualMachines", &asset.provider.region)
            .with_attr("size", size)
            .with_attr("operatingSystem", self.operating_system)
            .with_attr("priority", "Regular");

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
    use std::collections::BTreeMap;

    #[test]
    fn test_os_is_part_of_the_rate_coordinate() {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "size".to_string(),
            AttributeValue::String("Standard_D2s_v5".to_string()),
        );
        let asset = AssetNode {
            address: "azurerm_windows_virtual_machine.app".to_string(),
            resource_type: "azurerm_windows_virtual_machine".to_string(),
            attributes,
            provider: ProviderContext {
                provider_id: "azurerm".to_string(),
                alias: "azurerm".to_string(),
                region: "eastus".to_string(),
                account_id: None,
            },
            cardinality: Cardinality::known(1),
            instance_key: None,
            children: vec![],
            tags: BTreeMap::new(),
        };

        let mapper = VirtualMachineMapper::windows();
        let mut ctx = UsageContext::empty();
        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(
            units[0]
                .rate_key
                .attributes
                .get("operatingSystem")
                .map(String::as_str),
            Some("Windows")
        );
    }
}
