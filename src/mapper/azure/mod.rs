//! Azure mapper catalog

pub mod sql;
pub mod storage;
pub mod vm;

use std::sync::Arc;

use super::indirect::IndirectResourceMapper;
use super::registry::{MapperRegistry, RegistryError};
use super::Cloud;

/// Register every Azure mapper.
pub fn register_all(registry: &MapperRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(vm::VirtualMachineMapper::linux()))?;
    registry.register(Arc::new(vm::VirtualMachineMapper::windows()))?;
    registry.register(Arc::new(storage::StorageAccountMapper))?;
    registry.register(Arc::new(sql::SqlDatabaseMapper))?;

    for (resource_type, notes) in [
        (
            "azurerm_virtual_network",
            "virtual networks carry no direct charge",
        ),
        ("azurerm_subnet", "subnets carry no direct charge"),
        (
            "azurerm_resource_group",
            "resource groups carry no direct charge",
        ),
        (
            "azurerm_network_security_group",
            "network security groups carry no direct charge",
        ),
    ] {
        registry.register(Arc::new(IndirectResourceMapper::new(
            resource_type,
            Cloud::Azure,
            "network",
            notes,
        )))?;
    }

    Ok(())
}
