//! Indirect (zero-cost) resource mapper
//!
//! VPCs, subnets, security groups, IAM roles and their cousins incur
//! no direct charge; their cost shows up on the resources inside
//! them. One parameterized mapper covers all of them: it declares
//! itself Tier3Indirect and emits no cost units.

use super::{
    Cloud, CostBehavior, CostUnit, MapperError, MapperMetadata, ResourceMapper, Tier,
    UsageContext, UsageVector,
};
use crate::graph::AssetNode;

/// Mapper for resources with no direct charge.
pub struct IndirectResourceMapper {
    resource_type: &'static str,
    cloud: Cloud,
    category: &'static str,
    notes: &'static str,
}

impl IndirectResourceMapper {
    pub fn new(
        resource_type: &'static str,
        cloud: Cloud,
        category: &'static str,
        notes: &'static str,
    ) -> Self {
        Self {
            resource_type,
            cloud,
            category,
            notes,
        }
    }
}

impl ResourceMapper for IndirectResourceMapper {
    fn metadata(&self) -> MapperMetadata {
        MapperMetadata {
            resource_type: self.resource_type.to_string(),
            cloud: self.cloud,
            tier: Tier::Tier3Indirect,
            cost_behavior: CostBehavior::Indirect,
            requires_usage: false,
            can_be_symbolic: true,
            confidence_ceiling: 1.0,
            high_impact: false,
            category: self.category.to_string(),
            cost_components: vec!["none".to_string()],
            notes: self.notes.to_string(),
        }
    }

    fn build_usage(
        &self,
        _asset: &AssetNode,
        _ctx: &mut UsageContext,
    ) -> Result<Vec<UsageVector>, MapperError> {
        Ok(vec![])
    }

    fn build_cost_units(
        &self,
        _asset: &AssetNode,
        _usage: &[UsageVector],
    ) -> Result<Vec<CostUnit>, MapperError> {
        Ok(vec![])
    }
}
