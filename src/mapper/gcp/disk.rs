//! Persistent disk mapper

use rust_decimal::Decimal;

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct ComputeDiskMapper;

impl ResourceMapper for ComputeDiskMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "google_compute_disk".to_string(),
            cloud: Cloud::Gcp,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.9,
            high_impact: false,
            category: "storage".to_string(),
            cost_components: vec!["storage".to_string()],
            notes: "persistent disk GB-months by disk type".to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        let storage = match asset.attr_int("size") {
            Some(size) => UsageVector::concrete(metrics::STORAGE_GB, Decimal::from(size), 1.0),
            None => ctx.resolve(asset, metrics::STORAGE_GB),
        };
        Ok(vec![storage])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let disk_type = asset.attr_str("type").unwrap_or("pd-standard");
        let key = RateKey::new("gcp", "ComputeEngine", &asset.provider.region)
            .with_attr("productFamily", "Storage")
            .with_attr("diskType", disk_type);

        Ok(usage
            .iter()
            .filter(|v| v.metric == metrics::STORAGE_GB)
            .map(|storage| CostUnit::from_usage("storage", "GB-Mo", key.clone(), storage))
            .collect())
    }
}
