//! Cloud SQL instance mapper

use rust_decimal::Decimal;

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

pub struct CloudSqlInstanceMapper;

impl ResourceMapper for CloudSqlInstanceMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "google_sql_database_instance".to_string(),
            cloud: Cloud::Gcp,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.9,
            high_impact: true,
            category: "database".to_string(),
            cost_components: vec!["instance_hours".to_string(), "storage".to_string()],
            notes: "instance hours by tier and allocated storage; read replicas are separate \
                    resources"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        let mut usage = vec![ctx.resolve(asset, metrics::MONTHLY_HOURS)];
        if let Some(size) = asset.attr_int("disk_size") {
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
        let Some(tier) = asset.attr_str("tier") else {
            return Ok(vec![CostUnit::symbolic(
                "instance_hours",
                "Hrs",
                RateKey::new("gcp", "CloudSQL", &asset.provider.region),
                "tier is not set",
                0.5,
            )]);
        };
        let engine = asset.attr_str("database_version").unwrap_or("POSTGRES_15");

        let mut units = Vec::new();
        if let Some(hours) = usage.iter().find(|v| v.metric == metrics::MONTHLY_HOURS) {
            let key = RateKey::new("gcp", "CloudSQL", &asset.provider.region)
                .with_attr("tier", tier)
                .with_attr("databaseVersion", engine);
            units.push(CostUnit::from_usage("instance_hours", "Hrs", key, hours));
        }
        if let Some(storage) = usage.iter().find(|v| v.metric == metrics::STORAGE_GB) {
            let key = RateKey::new("gcp", "CloudSQL", &asset.provider.region)
                .with_attr("productFamily", "Storage")
                .with_attr("diskType", asset.attr_str("disk_type").unwrap_or("PD_SSD"));
            units.push(CostUnit::from_usage("storage", "GB-Mo", key, storage));
        }
        Ok(units)
    }
}
