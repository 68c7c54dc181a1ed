//! Cloud Storage bucket mapper
//!
//! Same shape as the S3 mapper: storage, class A and class B
//! operations, egress, all usage-based.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub const CLASS_A_OPERATIONS: &str = "class_a_operations";
pub const CLASS_B_OPERATIONS: &str = "class_b_operations";

pub struct StorageBucketMapper;

impl StorageBucketMapper {
    fn storage_class(asset: &AssetNode) -> &str {
        asset.attr_str("storage_class").unwrap_or("STANDARD")
    }
}

impl ResourceMapper for StorageBucketMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "google_storage_bucket".to_string(),
            cloud: Cloud::Gcp,
            tier: Tier::Tier2Symbolic,
            cost_behavior: CostBehavior::UsageBased,
            requires_usage: true,
            can_be_symbolic: true,
            confidence_ceiling: 0.8,
            high_impact: false,
            category: "storage".to_string(),
            cost_components: vec![
                "storage".to_string(),
                "class_a_operations".to_string(),
                "class_b_operations".to_string(),
                "data_transfer".to_string(),
            ],
            notes: "object storage with per-class operation pricing".to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        Ok(vec![
            ctx.resolve(asset, metrics::STORAGE_GB),
            ctx.resolve(asset, CLASS_A_OPERATIONS),
            ctx.resolve(asset, CLASS_B_OPERATIONS),
            ctx.resolve(asset, metrics::DATA_TRANSFER_GB),
        ])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let storage_class = Self::storage_class(asset);
        let key = |family: &str| {
            RateKey::new("gcp", "CloudStorage", &asset.provider.region)
                .with_attr("productFamily", family)
                .with_attr("storageClass", storage_class)
        };

        let mut units = Vec::with_capacity(4);
        for (metric, component, measure, family) in [
            (metrics::STORAGE_GB, "storage", "GB-Mo", "Storage"),
            (CLASS_A_OPERATIONS, "class_a_operations", "1K operations", "Operations"),
            (CLASS_B_OPERATIONS, "class_b_operations", "1K operations", "Operations"),
            (metrics::DATA_TRANSFER_GB, "data_transfer", "GB", "Egress"),
        ] {
            if let Some(vector) = usage.iter().find(|v| v.metric == metric) {
                let mut rate_key = key(family);
                if family == "Operations" {
                    rate_key = rate_key.with_attr("operationClass", component);
                }
                units.push(CostUnit::from_usage(component, measure, rate_key, vector));
            }
        }
        Ok(units)
    }
}
