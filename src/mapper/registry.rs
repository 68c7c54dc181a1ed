//! Mapper registry keyed by `(cloud, resource_type)`
//!
//! Registration happens once, at process bootstrap, behind a
//! reader/writer lock; after that the registry is read-only in
//! practice. Metadata is validated at the door and re-registration is
//! a fatal error, so a bad catalog aborts startup instead of serving
//! wrong answers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

use super::{Cloud, MapperMetadata, MetadataError, ResourceMapper, Tier};

/// Registration failures; all abort bootstrap
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("mapper already registered for ({cloud}, {resource_type})")]
    Duplicate {
        cloud: &'static str,
        resource_type: String,
    },

    #[error("mapper metadata rejected: {0}")]
    InvalidMetadata(#[from] MetadataError),

    #[error("registry lock poisoned")]
    Poisoned,
}

/// Validated collection of resource mappers.
#[derive(Default)]
pub struct MapperRegistry {
    inner: RwLock<HashMap<(Cloud, String), Arc<dyn ResourceMapper>>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a mapper. Fails on invalid metadata or a duplicate key.
    pub fn register(&self, mapper: Arc<dyn ResourceMapper>) -> Result<(), RegistryError> {
        let metadata = mapper.metadata();
        metadata.validate()?;

        let key = (metadata.cloud, metadata.resource_type.clone());
        let mut map = self.inner.write().map_err(|_| RegistryError::Poisoned)?;
        if map.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                cloud: metadata.cloud.as_str(),
                resource_type: metadata.resource_type,
            });
        }
        debug!(
            cloud = metadata.cloud.as_str(),
            resource_type = %metadata.resource_type,
            tier = ?metadata.tier,
            "mapper registered"
        );
        map.insert(key, mapper);
        Ok(())
    }

    pub fn lookup(&self, cloud: Cloud, resource_type: &str) -> Option<Arc<dyn ResourceMapper>> {
        self.inner
            .read()
            .ok()?
            .get(&(cloud, resource_type.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_metadata<F>(&self, mut keep: F) -> Vec<MapperMetadata>
    where
        F: FnMut(&MapperMetadata) -> bool,
    {
        let mut found: Vec<MapperMetadata> = match self.inner.read() {
            Ok(map) => map
                .values()
                .map(|m| m.metadata())
                .filter(|md| keep(md))
                .collect(),
            Err(_) => Vec::new(),
        };
        found.sort_by(|a, b| {
            (a.cloud.as_str(), &a.resource_type).cmp(&(b.cloud.as_str(), &b.resource_type))
        });
        found
    }

    pub fn by_tier(&self, tier: Tier) -> Vec<MapperMetadata> {
        self.collect_metadata(|md| md.tier == tier)
    }

    pub fn by_category(&self, category: &str) -> Vec<MapperMetadata> {
        self.collect_metadata(|md| md.category == category)
    }

    pub fn by_cloud(&self, cloud: Cloud) -> Vec<MapperMetadata> {
        self.collect_metadata(|md| md.cloud == cloud)
    }

    pub fn high_impact(&self) -> Vec<MapperMetadata> {
        self.collect_metadata(|md| md.high_impact)
    }
}

/// Build the registry with the full built-in catalog. Any rejected
/// mapper aborts bootstrap.
pub fn builtin_registry() -> Result<MapperRegistry, RegistryError> {
    let registry = MapperRegistry::new();

    super::aws::register_all(&registry)?;
    super::gcp::register_all(&registry)?;
    super::azure::register_all(&registry)?;

    debug!(mappers = registry.len(), "built-in mapper catalog loaded");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AssetNode;
    use crate::mapper::{CostBehavior, CostUnit, MapperError, UsageContext, UsageVector};

    struct FakeMapper {
        metadata: MapperMetadata,
    }

    impl ResourceMapper for FakeMapper {
        fn metadata(&self) -> MapperMetadata {
            self.metadata.clone()
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

    fn fake(resource_type: &str, tier: Tier, behavior: CostBehavior) -> Arc<dyn ResourceMapper> {
        Arc::new(FakeMapper {
            metadata: MapperMetadata {
                resource_type: resource_type.to_string(),
                cloud: Cloud::Aws,
                tier,
                cost_behavior: behavior,
                requires_usage: false,
                can_be_symbolic: true,
                confidence_ceiling: 0.9,
                high_impact: false,
                category: "test".to_string(),
                cost_components: vec!["x".to_string()],
                notes: "test mapper".to_string(),
            },
        })
    }

    #[test]
    fn test_reregistration_is_fatal() {
        let registry = MapperRegistry::new();
        registry
            .register(fake("aws_thing", Tier::Tier1Numeric, CostBehavior::Direct))
            .unwrap();

        let err = registry
            .register(fake("aws_thing", Tier::Tier1Numeric, CostBehavior::Direct))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
    }

    #[test]
    fn test_invalid_metadata_rejected_at_the_door() {
        let registry = MapperRegistry::new();
        // Tier3Indirect with direct behavior violates the tier rules
        let err = registry
            .register(fake("aws_bad", Tier::Tier3Indirect, CostBehavior::Direct))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidMetadata(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookups_by_tier_and_cloud() {
        let registry = MapperRegistry::new();
        registry
            .register(fake("aws_a", Tier::Tier1Numeric, CostBehavior::Direct))
            .unwrap();
        registry
            .register(fake("aws_b", Tier::Tier3Indirect, CostBehavior::Indirect))
            .unwrap();

        assert_eq!(registry.by_tier(Tier::Tier1Numeric).len(), 1);
        assert_eq!(registry.by_cloud(Cloud::Aws).len(), 2);
        assert_eq!(registry.by_cloud(Cloud::Gcp).len(), 0);
        assert!(registry.lookup(Cloud::Aws, "aws_a").is_some());
        assert!(registry.lookup(Cloud::Aws, "aws_missing").is_none());
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let registry = builtin_registry().unwrap();
        assert!(!registry.is_empty());
        // every built-in mapper passes its own metadata validation
        for md in registry.by_cloud(Cloud::Aws) {
            assert!(md.validate().is_ok());
        }
    }
}
