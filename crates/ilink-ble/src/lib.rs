//! Bluetooth Low Energy session engine for iLink smart lights
//!
//! This crate owns the single radio link to a light and hides its
//! flakiness from callers.
//!
//! ## Architecture
//!
//! - [`config`] - Session timing and retry settings
//! - [`error`] - Transport and session error types
//! - [`protocol`] - GATT service and characteristic UUIDs
//! - [`link`] - Transport traits the session drives
//! - [`state`] - Explicit session connection state
//! - [`session`] - Connect coalescing, write arbitration and deferred disconnects
//! - [`platform`] - btleplug implementation of the transport traits
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ilink_ble::{BtleplugProvider, Session, SessionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = BtleplugProvider::new().await?;
//! let address = "AA:BB:CC:DD:EE:FF".parse()?;
//! let session = Session::new(address, Arc::new(provider), SessionConfig::default());
//!
//! if session.connect().await {
//!     session.set_brightness(128).await?;
//! }
//! session.disconnect(false, true).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod platform;
pub mod protocol;
pub mod session;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Public API exports
pub use config::SessionConfig;
pub use error::{BleError, LinkResult, SessionError};
pub use link::{LightLink, LinkProvider, NotificationSender};
pub use platform::{BtleplugLink, BtleplugProvider};
pub use protocol::{
    ILINK_COMMAND_CHARACTERISTIC_UUID, ILINK_SERVICE_UUID, ILINK_STATUS_CHARACTERISTIC_UUID,
};
pub use session::{Session, StatusObserver};
pub use state::{LinkActivity, SessionState};
