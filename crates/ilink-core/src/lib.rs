//! Core protocol implementation for iLink BLE smart lights
//!
//! This crate has no I/O. It provides:
//!
//! - [`protocol`] - the checksummed command codec and status notification parser
//! - [`types`] - logical light state, state updates and presets
//! - [`config`] - per-device configuration
//! - [`errors`] - validation and configuration errors
//!
//! ## Usage
//!
//! ```rust
//! use ilink_core::{Command, StatusFrame};
//!
//! let command = Command::brightness(128);
//! assert_eq!(command.to_hex(), "55aa0108018076");
//!
//! let frame = hex::decode("55aa098815aaaaaaffffff0105ed6c").unwrap();
//! let status = StatusFrame::parse(&frame).unwrap();
//! assert!(status.power);
//! ```

pub mod address;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod types;

pub use address::DeviceAddress;
pub use config::DeviceConfig;
pub use errors::{ConfigError, ValidationError};
pub use protocol::{
    Advertisement, ColorTempLevel, Command, CommandMode, DeviceMetadata, StatusFrame,
};
pub use types::{LightKey, LogicalState, Preset, Rgb, StateUpdate};
