//! iLink wire protocol
//!
//! Commands are built in [`command`], status notifications are decoded in
//! [`status`]. Frames travel as raw bytes; the hex rendering exists for logs
//! and tests.

pub mod advertisement;
pub mod color_temp;
pub mod command;
pub mod status;

pub use advertisement::{Advertisement, DeviceMetadata};
pub use color_temp::ColorTempLevel;
pub use command::{checksum, verify_checksum, Command, CommandMode};
pub use status::StatusFrame;
