//! CloudWatch log group mapper
//!
//! Ingestion and archival are both usage-based. A retention policy
//! on the group does not change that; without a profile the units
//! stay symbolic.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

/// GB ingested per month
pub const INGESTED_GB: &str = "ingested_gb";

pub struct CloudWatchLogGroupMapper;

impl ResourceMapper for CloudWatchLogGroupMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_cloudwatch_log_group".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier2Symbolic,
            cost_behavior: CostBehavior::UsageBased,
            requires_usage: true,
            can_be_symbolic: true,
            confidence_ceiling: 0.8,
            high_impact: false,
            category: "observability".to_string(),
            cost_components: vec!["ingestion".to_string(), "storage".to_string()],
            notes: "log ingestion and archival GB; metric filters and insights queries are \
                    out of scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        Ok(vec![
            ctx.resolve(asset, INGESTED_GB),
            ctx.resolve(asset, metrics::STORAGE_GB),
        ])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let key = |group: &str| {
            RateKey::new("aws", "AmazonCloudWatch", &asset.provider.region)
                .with_attr("group", group)
        };

        let mut units = Vec::with_capacity(2);
        if let Some(ingested) = usage.iter().find(|v| v.metric == INGESTED_GB) {
            units.push(CostUnit::from_usage(
                "ingestion",
                "GB",
                key("Ingested Logs"),
                ingested,
            ));
        }
        if let Some(stored) = usage.iter().find(|v| v.metric == metrics::STORAGE_GB) {
            units.push(CostUnit::from_usage(
                "storage",
                "GB-Mo",
                key("Stored Logs"),
                stored,
            ));
        }
        Ok(units)
    }
}
