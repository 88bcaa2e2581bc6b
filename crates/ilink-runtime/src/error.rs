//! Coordinator error types

use ilink_ble::SessionError;
use ilink_core::{DeviceAddress, ValidationError};
use thiserror::Error;

/// Device registry could not take an update
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Device {address} is not registered")]
    UnknownDevice { address: DeviceAddress },

    #[error("Registry update failed: {0}")]
    Update(String),
}

/// Errors surfaced to callers of the coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Not able to send command, device is busy. Try again later")]
    Busy,

    #[error("Not connected to {address}")]
    NotConnected { address: DeviceAddress },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<SessionError> for CoordinatorError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Busy => CoordinatorError::Busy,
            SessionError::NotConnected { address } => CoordinatorError::NotConnected { address },
            SessionError::Validation(e) => CoordinatorError::Validation(e),
        }
    }
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
