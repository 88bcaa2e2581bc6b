//! iLink light runtime
//!
//! This crate contains the poll/update coordinator that sits between a
//! caller and the BLE session:
//! - `LightCoordinator`: background polling, debounced writes and the merged logical state
//! - `PollSchedule`: the normal/fast poll cadence
//! - `DeviceRegistry`: where discovered device metadata is reported

pub mod config;
pub mod coordinator;
pub mod error;
pub mod poll;
pub mod registry;

pub use config::CoordinatorConfig;
pub use coordinator::{LightCoordinator, UpdateOutcome};
pub use error::{CoordinatorError, RegistryError, Result};
pub use poll::{PollMode, PollSchedule};
pub use registry::{DeviceRegistry, LoggingRegistry};

// Re-export the types callers need alongside the coordinator
pub use ilink_ble::{Session, SessionConfig};
pub use ilink_core::{DeviceConfig, LogicalState, Preset, StateUpdate};
