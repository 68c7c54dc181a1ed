//! S3 bucket mapper
//!
//! Fully usage-based: storage, PUT-class requests, GET-class
//! requests and data transfer out. With no usage profile every
//! component stays symbolic; nothing here is guessed.

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

/// Service-specific request metrics
pub const PUT_REQUESTS: &str = "put_requests";
pub const GET_REQUESTS: &str = "get_requests";

pub struct S3BucketMapper;

impl S3BucketMapper {
    fn storage_class(asset: &AssetNode) -> &str {
        asset.attr_str("storage_class").unwrap_or("Standard")
    }
}

impl ResourceMapper for S3BucketMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_s3_bucket".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier2Symbolic,
            cost_behavior: CostBehavior::UsageBased,
            requires_usage: true,
            can_be_symbolic: true,
            confidence_ceiling: 0.8,
            high_impact: false,
            category: "storage".to_string(),
            cost_components: vec![
                "storage".to_string(),
                "put_requests".to_string(),
                "get_requests".to_string(),
                "data_transfer".to_string(),
            ],
            notes: "object storage with tiered GB-month pricing; replication and lifecycle \
                    transitions are out of scope"
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
            ctx.resolve(asset, PUT_REQUESTS),
            ctx.resolve(asset, GET_REQUESTS),
            ctx.resolve(asset, metrics::DATA_TRANSFER_GB),
        ])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let region = &asset.provider.region;
        let storage_class = Self::storage_class(asset);
        let base = |family: &str| {
            RateKey::new("aws", "AmazonS3", region)
                .with_attr("productFamily", family)
                .with_attr("storageClass", storage_class)
        };

        let mut units = Vec::with_capacity(4);
        for (metric, component, measure, family) in [
            (metrics::STORAGE_GB, "storage", "GB-Mo", "Storage"),
            (PUT_REQUESTS, "put_requests", "1K requests", "API Request"),
            (GET_REQUESTS, "get_requests", "1K requests", "API Request"),
            (
                metrics::DATA_TRANSFER_GB,
                "data_transfer",
                "GB",
                "Data Transfer",
            ),
        ] {
            if let Some(vector) = usage.iter().find(|v| v.metric == metric) {
                let mut key = base(family);
                if family == "API Request" {
                    key = key.with_attr("requestClass", component);
                }
                units.push(CostUnit::from_usage(component, measure, key, vector));
            }
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Cardinality, ProviderContext};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn bucket() -> AssetNode {
        AssetNode {
            address: "aws_s3_bucket.logs".to_string(),
            resource_type: "aws_s3_bucket".to_string(),
            attributes: BTreeMap::new(),
            provider: ProviderContext {
                provider_id: "aws".to_string(),
                alias: "aws".to_string(),
                region: "us-east-1".to_string(),
                account_id: None,
            },
            cardinality: Cardinality::known(1),
            instance_key: None,
            children: vec![],
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn test_no_usage_means_four_symbolic_units() {
        let mapper = S3BucketMapper;
        let asset = bucket();
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units.len(), 4);
        for unit in &units {
            assert!(unit.is_symbolic);
            assert!(unit
                .symbolic_reason
                .as_deref()
                .unwrap()
                .contains("no usage data"));
            assert!(unit.amount.is_none());
        }
    }

    #[test]
    fn test_profile_usage_turns_units_numeric() {
        let mapper = S3BucketMapper;
        let asset = bucket();

        let mut profile: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
        let entry = profile.entry("aws_s3_bucket.logs".to_string()).or_default();
        entry.insert(metrics::STORAGE_GB.to_string(), Decimal::from(500));
        entry.insert(PUT_REQUESTS.to_string(), Decimal::from(1_000));

        let mut ctx = UsageContext::new(profile, crate::mapper::defaults::DefaultUsagePolicy::strict());
        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        let storage = units.iter().find(|u| u.component_name == "storage").unwrap();
        assert!(!storage.is_symbolic);
        assert_eq!(storage.quantity, Some(Decimal::from(500)));

        // metrics without profile data stay symbolic
        let transfer = units
            .iter()
            .find(|u| u.component_name == "data_transfer")
            .unwrap();
        assert!(transfer.is_symbolic);
    }
}
