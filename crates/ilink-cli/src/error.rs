//! Error handling for the iLink CLI

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ilink_core::ConfigError),

    #[error("Invalid value: {0}")]
    Validation(#[from] ilink_core::ValidationError),

    #[error("{0}")]
    Coordinator(#[from] ilink_runtime::CoordinatorError),

    #[error("BLE error: {0}")]
    Ble(#[from] ilink_ble::BleError),

    #[error("Configuration file {path} not found")]
    ConfigNotFound { path: PathBuf },

    #[error("No light configured; pass --device <address> or add one to the configuration file")]
    NoDevices,

    #[error("Unknown light: {0}")]
    UnknownDevice(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
