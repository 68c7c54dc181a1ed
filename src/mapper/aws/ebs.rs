//! EBS volume mapper
//!
//! GB-months keyed by volume type, plus provisioned IOPS for the
//! volume types that bill them separately.

use rust_decimal::Decimal;

use crate::graph::AssetNode;
use crate::mapper::{
    metrics, Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::pricing::RateKey;

/// gp3 includes a 3000 IOPS baseline; only the excess bills.
const GP3_INCLUDED_IOPS: i64 = 3000;

pub struct EbsVolumeMapper;

impl EbsVolumeMapper {
    fn volume_type(asset: &AssetNode) -> &str {
        asset.attr_str("type").unwrap_or("gp3")
    }

    fn billable_iops(asset: &AssetNode) -> Option<i64> {
        let volume_type = Self::volume_type(asset);
        let iops = asset.attr_int("iops")?;
        match volume_type {
            "io1" | "io2" => Some(iops),
            "gp3" => (iops > GP3_INCLUDED_IOPS).then_some(iops - GP3_INCLUDED_IOPS),
            _ => None,
        }
    }
}

impl ResourceMapper for EbsVolumeMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: "aws_ebs_volume".to_string(),
            cloud: Cloud::Aws,
            tier: Tier::Tier1Numeric,
            cost_behavior: CostBehavior::Direct,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 0.9,
            high_impact: false,
            category: "storage".to_string(),
            cost_components: vec!["storage".to_string(), "provisioned_iops".to_string()],
            notes: "volume GB-months plus provisioned IOPS where billed".to_string(),
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

        let mut usage = vec![storage];
        if let Some(iops) = Self::billable_iops(asset) {
            usage.push(UsageVector::concrete(
                metrics::IOPS,
                Decimal::from(iops),
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
        let volume_type = Self::volume_type(asset);
        let storage_key = RateKey::new("aws", "AmazonEC2", &asset.provider.region)
            .with_attr("productFamily", "Storage")
            .with_attr("volumeApiName", volume_type);

        let mut units = Vec::new();
        if let Some(storage) = usage.iter().find(|v| v.metric == metrics::STORAGE_GB) {
            units.push(CostUnit::from_usage("storage", "GB-Mo", storage_key, storage));
        }

        if let Some(iops) = usage.iter().find(|v| v.metric == metrics::IOPS) {
            let iops_key = RateKey::new("aws", "AmazonEC2", &asset.provider.region)
                .with_attr("productFamily", "System Operation")
                .with_attr("volumeApiName", volume_type);
            units.push(CostUnit::from_usage(
                "provisioned_iops",
                "IOPS-Mo",
                iops_key,
                iops,
            ));
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttributeValue, Cardinality, ProviderContext};
    use std::collections::BTreeMap;

    fn asset(attrs: &[(&str, AttributeValue)]) -> AssetNode {
        AssetNode {
            address: "aws_ebs_volume.data".to_string(),
            resource_type: "aws_ebs_volume".to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
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
    fn test_sized_gp3_volume_is_numeric_storage_only() {
        let mapper = EbsVolumeMapper;
        let asset = asset(&[("size", AttributeValue::Int(100))]);
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].quantity, Some(Decimal::from(100)));
        assert!(ctx.assumptions().is_empty());
    }

    #[test]
    fn test_unsized_volume_uses_default_and_records_assumption() {
        let mapper = EbsVolumeMapper;
        let asset = asset(&[]);
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units[0].quantity, Some(Decimal::from(8)));
        assert!(units[0].confidence < 1.0);
        assert_eq!(ctx.assumptions().len(), 1);
        assert_eq!(ctx.assumptions()[0].metric, metrics::STORAGE_GB);
    }

    #[test]
    fn test_io2_bills_provisioned_iops() {
        let mapper = EbsVolumeMapper;
        let asset = asset(&[
            ("size", AttributeValue::Int(500)),
            ("type", AttributeValue::String("io2".to_string())),
            ("iops", AttributeValue::Int(8000)),
        ]);
        let mut ctx = UsageContext::empty();

        let usage = mapper.build_usage(&asset, &mut ctx).unwrap();
        let units = mapper.build_cost_units(&asset, &usage).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[1].component_name, "provisioned_iops");
        assert_eq!(units[1].quantity, Some(Decimal::from(8000)));
    }

    #[test]
    fn test_gp3_only_bills_iops_above_baseline() {
        let mapper = EbsVolumeMapper;
        let within = asset(&[
            ("size", AttributeValue::Int(100)),
            ("iops", AttributeValue::Int(3000)),
        ]);
        assert!(EbsVolumeMapper::billable_iops(&within).is_none());

        let above = asset(&[
            ("size", AttributeValue::Int(100)),
            ("iops", AttributeValue::Int(5000)),
        ]);
        assert_eq!(EbsVolumeMapper::billable_iops(&above), Some(2000));
    }
}
