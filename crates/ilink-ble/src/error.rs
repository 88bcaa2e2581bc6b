//! Error types for the BLE session

use ilink_core::{DeviceAddress, ValidationError};
use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised by a transport link
///
/// These never reach session callers: the session logs them and turns them
/// into boolean outcomes.
#[derive(Error, Debug)]
pub enum BleError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("A device with address {address} could not be found")]
    DeviceNotFound { address: String },

    #[error("Failed to connect to device: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Device not connected")]
    NotConnected,

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: Uuid },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Failed to disconnect: {0}")]
    DisconnectFailed(String),

    #[error("BLE stack error: {0}")]
    Btleplug(#[from] btleplug::Error),
}

/// Errors surfaced to session callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Another write is outstanding on this link
    #[error("Device busy")]
    Busy,

    /// No live link to write to
    #[error("Not connected to {address}")]
    NotConnected { address: DeviceAddress },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for link operations
pub type LinkResult<T> = std::result::Result<T, BleError>;
