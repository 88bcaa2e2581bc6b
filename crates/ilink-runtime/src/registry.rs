//! Sink for device metadata discovered at connect time

use ilink_core::{DeviceAddress, DeviceMetadata};
use tracing::info;

use crate::error::RegistryError;

/// Host registry that stores display name, manufacturer and hardware version
pub trait DeviceRegistry: Send + Sync {
    fn update_device(
        &self,
        address: &DeviceAddress,
        metadata: &DeviceMetadata,
    ) -> Result<(), RegistryError>;
}

/// Registry that only logs what it receives
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRegistry;

impl DeviceRegistry for LoggingRegistry {
    fn update_device(
        &self,
        address: &DeviceAddress,
        metadata: &DeviceMetadata,
    ) -> Result<(), RegistryError> {
        info!(
            "Device {}: name={:?} manufacturer={:?} hw_version={:?}",
            address, metadata.name, metadata.manufacturer, metadata.hw_version
        );
        Ok(())
    }
}
