//! Azure SQL database mapper

use rust_decimal::Decimal;

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct SqlDatabaseMapper;

impl ResourceMapper for SqlDatabaseMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "azurerm_mssql_database".to_string(),
            cloud: Cloud::Azure,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.9,
            high_impact: true,
            category: "database".to_string(),
            cost_components: vec!["compute_hours".to_string(), "storage".to_string()],
            notes: "vCore/DTU compute hours by SKU plus allocated storage; serverless \
                    auto-pause is out of scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        let mut usage = vec![ctx.resolve(asset, metrics::MONTHLY_HOURS)];
        if let Some(size) = asset.attr_int("max_size_gb") {
            usage.push(UsageVector::concrete(
                metrics::STORAGE_GB,
                Decimal::from(size),
                1.0,
            ));
        }
        Ok(usage)
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let Some(sku) = asset.attr_str("sku_name") else {
            return Ok(vec![CostUnit::symbolic(
                "compute_hours",
                "Hrs",
                RateKey::new("azure", "SQLDatabase", &asset.provider.region),
                "sku_name is not set",
                0.5,
            )]);
        };

        let mut units = Vec::new();
        if let Some(hours) = usage.iter().find(|v| v.metric == metrics::MONTHLY_HOURS) {
            let key = RateKey::new("azure", "SQLDatabase", &asset.provider.region)
                .with_attr("skuName", sku);
            units.push(CostUnit::from_usage("compute_hours", "Hrs", key, hours));
        }
        if let Some(storage) = usage.iter().find(|v| v.metric == metrics::STORAGE_GB) {
            let key = RateKey::new("azure", "SQLDatabase", &asset.provider.region)
                .with_attr("productFamily", "Storage");
            units.push(CostUnit::from_usage("storage", "GB-Mo", key, storage));
        }
        Ok(units)
    }
}
