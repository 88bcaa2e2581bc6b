//! Transport abstraction the session drives
//!
//! A [`LinkProvider`] turns a device address into a [`LightLink`]: one
//! GATT connection handle exposing the connect/write/subscribe/disconnect
//! primitives. The btleplug implementation lives in [`crate::platform`];
//! tests use the scripted transport from `testing`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ilink_core::{Advertisement, DeviceAddress};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::LinkResult;

/// Channel raw notification payloads are forwarded into
pub type NotificationSender = mpsc::UnboundedSender<Vec<u8>>;

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// One physical connection handle to a light
#[async_trait]
pub trait LightLink: Send + Sync + fmt::Debug {
    /// Establish the GATT connection and discover services
    async fn connect(&self) -> LinkResult<()>;

    /// Tear down the GATT connection
    async fn disconnect(&self) -> LinkResult<()>;

    /// Live state of the underlying connection
    fn is_connected(&self) -> bool;

    /// Write to a characteristic
    async fn write(&self, characteristic: Uuid, data: &[u8], with_response: bool)
        -> LinkResult<()>;

    /// Forward every notification on `characteristic` into `sink`
    async fn subscribe(&self, characteristic: Uuid, sink: NotificationSender) -> LinkResult<()>;
}

/// Resolves addresses to connection handles
#[async_trait]
pub trait LinkProvider: Send + Sync {
    /// Resolve an address to a connection handle without connecting it
    async fn resolve(&self, address: &DeviceAddress) -> LinkResult<Arc<dyn LightLink>>;

    /// Latest advertisement seen for `address`, if any
    async fn advertisement(&self, address: &DeviceAddress) -> Option<Advertisement>;
}
