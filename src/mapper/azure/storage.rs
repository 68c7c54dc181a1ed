//! Azure storage account mapper
//!
//! Capacity and transactions, both usage-based; redundancy and tier
//! come from the plan and shape the rate coordinate.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

/// Storage transactions per month
pub const TRANSACTIONS: &str = "transactions";

pub struct StorageAccountMapper;

impl StorageAccountMapper {
    fn redundancy(asset: &AssetNode) -> &str {
        asset.attr_str("account_replication_type").unwrap_or("LRS")
    }

    fn access_tier(asset: &AssetNode) -> &str {
        asset.attr_str("access_tier").unwrap_or("Hot")
    }
}

impl ResourceMapper for StorageAccountMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "azurerm_storage_account".to_string(),
            cloud: Cloud::Azure,
            tier: Tier::Tier2Symbolic,
            cost_behavior: CostBehavior::UsageBased,
            requires_usage: true,
            can_be_symbolic: true,
            confidence_ceiling: 0.8,
            high_impact: false,
            category: "storage".to_string(),
            cost_components: vec!["capacity".to_string(), "transactions".to_string()],
            notes: "blob capacity and transaction charges; file shares and queues are out of \
                    scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        Ok(vec![
            ctx.resolve(asset, metrics::STORAGE_GB),
            ctx.resolve(asset, TRANSACTIONS),
        ])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let key = |family: &str| {
            RateKey::new("azure", "Storage", &asset.provider.region)
                .with_attr("productFamily", family)
                .with_attr("redundancy", Self::redundancy(asset))
                .with_attr("accessTier", Self::access_tier(asset))
        };

        let mut units = Vec::with_capacity(2);
        if let Some(capacity) = usage.iter().find(|v| v.metric == metrics::STORAGE_GB) {
            units.push(CostUnit::from_usage(
                "capacity",
                "GB-Mo",
                key("Capacity"),
                capacity,
            ));
        }
        if let Some(transactions) = usage.iter().find(|v| v.metric == TRANSACTIONS) {
            units.push(CostUnit::from_usage(
                "transactions",
                "10K transactions",
                key("Transactions"),
                transactions,
            ));
        }
        Ok(units)
    }
}
