//! Error types for the iLink light protocol
//!
//! Validation errors are raised synchronously by whoever builds a command from
//! semantic input. Configuration errors come from loading device settings.

use thiserror::Error;

use crate::config::{MAX_POLL_INTERVAL_SECS, MIN_POLL_INTERVAL_SECS};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// A semantic parameter was outside the domain the device accepts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Brightness must be between 0 and 255, got {value}")]
    Brightness { value: i64 },

    #[error("White temperature level must be between 1 and 5, got {value}")]
    WhiteTempLevel { value: i64 },

    #[error("RGB values must be between 0 and 255, got ({r}, {g}, {b})")]
    RgbChannel { r: i64, g: i64, b: i64 },

    #[error("Scene must be between 1 and 93, got {value}")]
    Scene { value: i64 },

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Device configuration could not be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid device address: {address}")]
    InvalidAddress { address: String },

    #[error(
        "{field} must be between {} and {} seconds, got {value}",
        MIN_POLL_INTERVAL_SECS,
        MAX_POLL_INTERVAL_SECS
    )]
    PollInterval { field: &'static str, value: u64 },

    #[error("Device name must not be empty")]
    EmptyName,
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ValidationError {
    /// Create an invalid value error for a textual key/value update
    pub fn invalid_value<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        ValidationError::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}
