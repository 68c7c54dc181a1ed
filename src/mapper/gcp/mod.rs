//! GCP mapper catalog

pub mod cloudsql;
pub mod compute;
pub mod disk;
pub mod storage;

use std::sync::Arc;

use super::indirect::IndirectResourceMapper;
use super::registry::{MapperRegistry, RegistryError};
use super::Cloud;

/// Register every GCP mapper.
pub fn register_all(registry: &MapperRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(compute::ComputeInstanceMapper))?;
    registry.register(Arc::new(disk::ComputeDiskMapper))?;
    registry.register(Arc::new(storage::StorageBucketMapper))?;
    registry.register(Arc::new(cloudsql::CloudSqlInstanceMapper))?;

    for (resource_type, notes) in [
        ("google_compute_network", "VPC networks carry no direct charge"),
        (
            "google_compute_subnetwork",
            "subnetworks carry no direct charge",
        ),
        (
            "google_compute_firewall",
            "firewall rules carry no direct charge",
        ),
    ] {
        registry.register(Arc::new(IndirectResourceMapper::new(
            resource_type,
            Cloud::Gcp,
            "network",
            notes,
        )))?;
    }

    Ok(())
}
