//! Status notification decoding
//!
//! ```text
//!  0 1 2 3 4   5 6 7   8 9    10  11  12 13 14
//! 55aa098815 | r g b | temp | bri | on | ...
//! ```
//!
//! Bytes 8-9 hold a code for the white temperature level, byte 10 the raw
//! brightness and byte 11 the power flag. The trailer is not interpreted.

use serde::{Deserialize, Serialize};

use crate::protocol::color_temp::ColorTempLevel;
use crate::types::Rgb;

/// Header identifying a status notification
pub const STATUS_HEADER: [u8; 5] = [0x55, 0xAA, 0x09, 0x88, 0x15];

/// Shortest buffer that carries every status field
const MIN_STATUS_LEN: usize = 12;

const RGB_OFFSET: usize = 5;
const TEMP_CODE_OFFSET: usize = 8;
const BRIGHTNESS_OFFSET: usize = 10;
const POWER_OFFSET: usize = 11;

/// Telemetry reported by the light in a status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFrame {
    /// Whether the light is on
    pub power: bool,
    /// Raw brightness, 0 to 255
    pub brightness: u8,
    /// White temperature level, `None` if the device sent an unknown code
    pub color_temp_level: Option<ColorTempLevel>,
    /// Current RGB color
    pub rgb: Rgb,
}

impl StatusFrame {
    /// Whether a notification buffer carries a status frame
    pub fn is_status(data: &[u8]) -> bool {
        data.starts_with(&STATUS_HEADER)
    }

    /// Parse a notification, returning `None` for anything that is not a status frame
    pub fn parse(data: &[u8]) -> Option<Self> {
        if !Self::is_status(data) || data.len() < MIN_STATUS_LEN {
            return None;
        }

        let rgb = Rgb::new(
            data[RGB_OFFSET],
            data[RGB_OFFSET + 1],
            data[RGB_OFFSET + 2],
        );
        let code = [data[TEMP_CODE_OFFSET], data[TEMP_CODE_OFFSET + 1]];

        Some(Self {
            // only exactly 1 means on
            power: data[POWER_OFFSET] == 1,
            brightness: data[BRIGHTNESS_OFFSET],
            color_temp_level: level_from_code(code),
            rgb,
        })
    }
}

fn level_from_code(code: [u8; 2]) -> Option<ColorTempLevel> {
    match code {
        [0xFF, 0x00] => Some(ColorTempLevel::COLD_WHITE),
        [0xB4, 0x64] => Some(ColorTempLevel::NATURE_LIGHT),
        [0xFF, 0xFF] => Some(ColorTempLevel::SUN_LIGHT),
        [0x4B, 0xC8] => Some(ColorTempLevel::SUN_SET),
        [0x00, 0xFF] => Some(ColorTempLevel::CANDLE_LIGHT),
        _ => None,
    }
}
