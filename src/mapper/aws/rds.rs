//! RDS instance mapper
//!
//! Instance hours keyed by class, engine and deployment option, plus
//! allocated storage GB-months.

use rust_decimal::Decimal;

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct RdsInstanceMapper;

impl RdsInstanceMapper {
    fn deployment(asset: &AssetNode) -> &'static str {
        if asset.attr_bool("multi_az").unwrap_or(false) {
            "Multi-AZ"
        } else {
            "Single-AZ"
        }
    }
}

impl ResourceMapper for RdsInstanceMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_db_instance".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.9,
            high_impact: true,
            category: "database".to_string(),
            cost_components: vec!["instance_hours".to_string(), "storage".to_string()],
            notes: "on-demand instance hours and allocated storage; backups and IOPS tiers \
                    are out of scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        let mut usage = vec![ctx.resolve(asset, metrics::MONTHLY_HOURS)];
        if let Some(size) = asset.attr_int("allocated_storage") {
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
        let Some(instance_class) = asset.attr_str("instance_class") else {
            return Ok(vec![CostUnit::symbolic(
                "instance_hours",
                "Hrs",
                RateKey::new("aws", "AmazonRDS", &asset.provider.region),
                "instance_class is not set",
                0.5,
            )]);
        };
        let engine = asset.attr_str("engine").unwrap_or("postgres");

        let mut units = Vec::new();
        if let Some(hours) = usage.iter().find(|v| v.metric == metrics::MONTHLY_HOURS) {
            let key = RateKey::new("aws", "AmazonRDS", &asset.provider.region)
                .with_attr("instanceType", instance_class)
                .with_attr("databaseEngine", engine)
                .with_attr("deploymentOption", Self::deployment(asset));
            units.push(CostUnit::from_usage("instance_hours", "Hrs", key, hours));
        }

        if let Some(storage) = usage.iter().find(|v| v.metric == metrics::STORAGE_GB) {
            let key = RateKey::new("aws", "AmazonRDS", &asset.provider.region)
                .with_attr("productFamily", "Database Storage")
                .with_attr("volumeType", asset.attr_str("storage_type").unwrap_or("gp3"))
                .with_attr("deploymentOption", Self::deployment(asset));
            units.push(CostUnit::from_usage("storage", "GB-Mo", key, storage));
        }

        Ok(units)
    }
}
