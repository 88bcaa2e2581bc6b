//! Per-device configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::DeviceAddress;
use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Default background poll interval in seconds
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 300;

/// Default poll interval right after a state change, in seconds
pub const DEFAULT_SCAN_INTERVAL_FAST_SECS: u64 = 5;

/// Smallest accepted poll interval in seconds
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;

/// Largest accepted poll interval in seconds
pub const MAX_POLL_INTERVAL_SECS: u64 = 999;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for a single light
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Link-layer address, the immutable key of the device
    pub address: DeviceAddress,
    /// Human-readable name
    pub name: String,
    /// Background poll interval in seconds
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    /// Poll interval used for two ticks after a state change, in seconds
    #[serde(default = "default_scan_interval_fast")]
    pub scan_interval_fast: u64,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_scan_interval_fast() -> u64 {
    DEFAULT_SCAN_INTERVAL_FAST_SECS
}

impl DeviceConfig {
    /// Create a configuration with default poll intervals
    pub fn new(address: DeviceAddress, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            scan_interval: DEFAULT_SCAN_INTERVAL_SECS,
            scan_interval_fast: DEFAULT_SCAN_INTERVAL_FAST_SECS,
        }
    }

    /// Set the background poll interval in seconds
    pub fn with_scan_interval(mut self, secs: u64) -> Self {
        self.scan_interval = secs;
        self
    }

    /// Set the fast poll interval in seconds
    pub fn with_scan_interval_fast(mut self, secs: u64) -> Self {
        self.scan_interval_fast = secs;
        self
    }

    /// Background poll interval
    pub fn normal_poll_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval)
    }

    /// Fast poll interval
    pub fn fast_poll_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_fast)
    }

    /// Check the configuration against the accepted ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        check_interval("scan_interval", self.scan_interval)?;
        check_interval("scan_interval_fast", self.scan_interval_fast)?;
        Ok(())
    }
}

fn check_interval(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if (MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::PollInterval { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> DeviceAddress {
        "11:22:33:44:55:66".parse().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::new(address(), "Desk");
        assert_eq!(config.normal_poll_interval(), Duration::from_secs(300));
        assert_eq!(config.fast_poll_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_bounds() {
        let too_fast = DeviceConfig::new(address(), "Desk").with_scan_interval_fast(4);
        assert_eq!(
            too_fast.validate(),
            Err(ConfigError::PollInterval {
                field: "scan_interval_fast",
                value: 4
            })
        );

        let too_slow = DeviceConfig::new(address(), "Desk").with_scan_interval(1000);
        assert!(too_slow.validate().is_err());

        let edges = DeviceConfig::new(address(), "Desk")
            .with_scan_interval(999)
            .with_scan_interval_fast(5);
        assert!(edges.validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = DeviceConfig::new(address(), "  ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyName));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: DeviceConfig = toml::from_str(
            r#"
            address = "aa-bb-cc-dd-ee-ff"
            name = "Hallway"
            "#,
        )
        .unwrap();
        assert_eq!(config.address.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.scan_interval, DEFAULT_SCAN_INTERVAL_SECS);
        assert_eq!(config.scan_interval_fast, DEFAULT_SCAN_INTERVAL_FAST_SECS);
    }
}
