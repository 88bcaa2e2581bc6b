//! Configuration file handling

use std::fs;
use std::path::{Path, PathBuf};

use ilink_ble::SessionConfig;
use ilink_core::{DeviceAddress, DeviceConfig};
use ilink_runtime::CoordinatorConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

const CONFIG_DIR: &str = "ilink";
const CONFIG_FILE: &str = "ilink.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configured lights
    pub devices: Vec<DeviceConfig>,
    /// Connection and write behaviour
    pub session: SessionConfig,
    /// Debounce and preset timing
    pub coordinator: CoordinatorConfig,
}

/// `<config dir>/ilink/ilink.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the explicit file, or the default file if it exists
    ///
    /// A missing explicit path is an error; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) if !path.exists() => Err(CliError::ConfigNotFound {
                path: path.to_path_buf(),
            }),
            Some(path) => Self::load_from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate every configured light
    pub fn validate(&self) -> Result<()> {
        for device in &self.devices {
            device.validate()?;
        }
        Ok(())
    }

    /// Find a configured light by address or case-insensitive name
    pub fn find_device(&self, query: &str) -> Option<&DeviceConfig> {
        let address = query.parse::<DeviceAddress>().ok();
        self.devices.iter().find(|device| {
            Some(device.address) == address || device.name.eq_ignore_ascii_case(query.trim())
        })
    }

    /// Pick the light a command targets
    ///
    /// Without a selector the first configured light is used. An address that
    /// is not configured gets a device entry with default poll intervals.
    pub fn resolve_device(&self, selector: Option<&str>) -> Result<DeviceConfig> {
        let Some(query) = selector else {
            return self.devices.first().cloned().ok_or(CliError::NoDevices);
        };

        if let Some(device) = self.find_device(query) {
            return Ok(device.clone());
        }

        match query.parse::<DeviceAddress>() {
            Ok(address) => Ok(DeviceConfig::new(address, address.to_string())),
            Err(_) => Err(CliError::UnknownDevice(query.to_string())),
        }
    }
}
