//! GATT layout of iLink lights
//!
//! ```text
//! [Service] 0000a032  vendor
//!   [Characteristic] 0000a042  notify       status notifications
//!   [Characteristic] 0000a040  write        commands
//!   [Characteristic] 0000a041  read
//!   [Characteristic] 0000a043  notify
//!   [Characteristic] 0000a044  write-without-response, write
//! ```

use uuid::Uuid;

/// Vendor service advertised by the light
pub const ILINK_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000a032_0000_1000_8000_00805f9b34fb);

/// Characteristic commands are written to (with response)
pub const ILINK_COMMAND_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000a040_0000_1000_8000_00805f9b34fb);

/// Characteristic the light sends status notifications on
pub const ILINK_STATUS_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000a042_0000_1000_8000_00805f9b34fb);
