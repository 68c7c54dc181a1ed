//! DynamoDB table mapper
//!
//! Provisioned tables bill read/write capacity units from the plan's
//! own attributes; on-demand tables are usage-based and stay
//! symbolic without a profile. Storage is usage-based either way.

use rust_decimal::Decimal;

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub const READ_CAPACITY_UNITS: &str = "read_capacity_units";
pub const WRITE_CAPACITY_UNITS: &str = "write_capacity_units";
pub const READ_REQUESTS: &str = "read_requests";
pub const WRITE_REQUESTS: &str = "write_requests";

pub struct DynamoDbTableMapper;

impl DynamoDbTableMapper {
    fn is_provisioned(asset: &AssetNode) -> bool {
        !matches!(asset.attr_str("billing_mode"), Some("PAY_PER_REQUEST"))
    }
}

impl ResourceMapper for DynamoDbTableMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_dynamodb_table".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier2Symbolic,
            cost_behavior: CostBehavior::UsageBased,
            requires_usage: true,
            can_be_symbolic: true,
            confidence_ceiling: 0.85,
            high_impact: false,
            category: "database".to_string(),
            cost_components: vec![
                "read_capacity".to_string(),
                "write_capacity".to_string(),
                "storage".to_string(),
            ],
            notes: "provisioned capacity from plan attributes, on-demand requests from the \
                    usage profile; global tables are out of scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        let mut usage = Vec::new();
        if Self::is_provisioned(asset) {
            for (attr, metric) in [
                ("read_capacity", READ_CAPACITY_UNITS),
                ("write_capacity", WRITE_CAPACITY_UNITS),
            ] {
                usage.push(match asset.attr_int(attr) {
                    Some(units) => UsageVector::concrete(metric, Decimal::from(units), 1.0),
                    None => ctx.resolve(asset, metric),
                });
            }
        } else {
            usage.push(ctx.resolve(asset, READ_REQUESTS));
            usage.push(ctx.resolve(asset, WRITE_REQUESTS));
        }
        usage.push(ctx.resolve(asset, metrics::STORAGE_GB));
        Ok(usage)
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let region = &asset.provider.region;
        let key = |group: &str| {
            RateKey::new("aws", "AmazonDynamoDB", region).with_attr("group", group)
        };

        let mut units = Vec::new();
        for vector in usage {
            let (component, measure, group) = match vector.metric.as_str() {
                READ_CAPACITY_UNITS => ("read_capacity", "RCU-Mo", "DDB-ReadUnits"),
                WRITE_CAPACITY_UNITS => ("write_capacity", "WCU-Mo", "DDB-WriteUnits"),
                READ_REQUESTS => ("read_capacity", "1M requests", "DDB-ReadRequests"),
                WRITE_REQUESTS => ("write_capacity", "1M requests", "DDB-WriteRequests"),
                m if m == metrics::STORAGE_GB => ("storage", "GB-Mo", "DDB-Storage"),
                _ => continue,
            };
            units.push(CostUnit::from_usage(component, measure, key(group), vector));
        }
        Ok(units)
    }
}
