//! Lambda function mapper
//!
//! Entirely usage-based: request count and GB-seconds of compute.
//! GB-seconds derive from requests, average duration and the
//! function's configured memory when all three are known.

use rust_decimal::Decimal;

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

/// Average invocation duration in milliseconds
pub const AVG_DURATION_MS: &str = "avg_duration_ms";

/// Derived compute metric
pub const GB_SECONDS: &str = "gb_seconds";

const DEFAULT_MEMORY_MB: i64 = 128;

pub struct LambdaFunctionMapper;

impl ResourceMapper for LambdaFunctionMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_lambda_function".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier2Symbolic,
            cost_behavior: CostBehavior::UsageBased,
            requires_usage: true,
            can_be_symbolic: true,
            confidence_ceiling: 0.8,
            high_impact: false,
            category: "serverless".to_string(),
            cost_components: vec!["requests".to_string(), "compute".to_string()],
            notes: "request count and GB-second compute; provisioned concurrency is out of \
                    scope"
                .to_string(),
        }
    }

    fn build_usage(
        &self,
        asset: &AssetNode,
        ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        let requests = ctx.resolve(asset, metrics::MONTHLY_REQUESTS);
        let duration = ctx.resolve(asset, AVG_DURATION_MS);

        // GB-seconds = requests x duration_s x memory_gb
        let compute = match (&requests.value, &duration.value) {
            (Some(req), Some(ms)) if !requests.is_symbolic && !duration.is_symbolic => {
                let memory_mb = asset.attr_int("memory_size").unwrap_or(DEFAULT_MEMORY_MB);
                let gb_seconds =
                    req * ms / Decimal::from(1000) * Decimal::from(memory_mb) / Decimal::from(1024);
                UsageVector::concrete(
                    GB_SECONDS,
                    gb_seconds,
                    requests.confidence.min(duration.confidence),
                )
            }
            _ => UsageVector::symbolic(
                GB_SECONDS,
                "no usage data for request volume and duration",
                requests.confidence.min(duration.confidence),
            ),
        };

        Ok(vec![requests, duration, compute])
    }

    fn build_cost_units(
        &self,
        asset: &AssetNode,
        usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        let region = &asset.provider.region;
        let mut units = Vec::with_capacity(2);

        if let Some(requests) = usage.iter().find(|v| v.metric == metrics::MONTHLY_REQUESTS) {
            let key = RateKey::new("aws", "AWSLambda", region).with_attr("group", "AWS-Lambda-Requests");
            units.push(CostUnit::from_usage("requests", "1M requests", key, requests));
        }

        if let Some(compute) = usage.iter().find(|v| v.metric == GB_SECONDS) {
            let key = RateKey::new("aws", "AWSLambda", region).with_attr("group", "AWS-Lambda-Duration");
            units.push(CostUnit::from_usage("compute", "GB-s", key, compute));
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttributeValue, Cardinality, ProviderContext};
    use std::collections::BTreeMap;

    fn function(memory_mb: Option<i64>) -> AssetNode {
        let mut attributes = BTreeMap::new();
        if let Some(m) = memory_mb {
            attributes.insert("memory_size".to_string(), AttributeValue::Int(m));
        }
        AssetNode {
            address: "aws_lambda_function.api".to_string(),
            resource_type: "aws_lambda_function".to_string(),
            attributes,
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
    fn test_no_usage_everything_symbolic() {
        let mapper = LambdaFunctionMapper;
        let asset = function(Some(512));
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.is_symbolic));
    }

    #[test]
    fn test_gb_seconds_derived_from_profile() {
        let mapper = LambdaFunctionMapper;
        let asset = function(Some(512));

        let mut profile: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
        let entry = profile
            .entry("aws_lambda_function.api".to_string())
            .or_default();
        entry.insert(
            metrics::MONTHLY_REQUESTS.to_string(),
            Decimal::from(2_000_000),
        );
        entry.insert(AVG_DURATION_MS.to_string(), Decimal::from(100));

        let mut ctx = UsageContext::new(
            profile,
            crate::mapper::defaults::DefaultUsagePolicy::strict(),
        );
        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();

        let compute = usage.iter().find(|v| v.metric == GB_SECONDS).unwrap();
        // 2M x 0.1s x 0.5GB = 100_000 GB-s
        assert_eq!(compute.value, Some(Decimal::from(100_000)));
        assert!(!compute.is_symbolic);
    }
}
