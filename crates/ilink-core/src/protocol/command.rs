//! Command frame encoding
//!
//! Every command is laid out as
//!
//! ```text
//! HEADER(2) | MODE(1) | OPCODE(2) | PAYLOAD(n) | CHECKSUM(1)
//! ```
//!
//! where `CHECKSUM = 0xFF - (sum of all preceding bytes mod 256)`. The
//! checksum is the only integrity check the protocol has: there are no
//! sequence numbers and no acknowledgements.

use std::fmt;

use crate::errors::ValidationError;
use crate::protocol::color_temp::ColorTempLevel;

// ----------------------------------------------------------------------------
// Wire Constants
// ----------------------------------------------------------------------------

/// Frame header shared by all commands
pub const FRAME_HEADER: [u8; 2] = [0x55, 0xAA];

/// Highest scene id the light knows
pub const MAX_SCENE_ID: i64 = 93;

/// Operation codes
pub mod opcode {
    /// Power on/off
    pub const SWITCH: [u8; 2] = [0x08, 0x05];
    /// White brightness
    pub const DIM: [u8; 2] = [0x08, 0x01];
    /// RGB color
    pub const RGB: [u8; 2] = [0x08, 0x02];
    /// White temperature level
    pub const WHITE_TEMP: [u8; 2] = [0x08, 0x09];
    /// Status notification request
    pub const STATUS: [u8; 2] = [0x08, 0x15];
    /// Built-in scene
    pub const SCENE: [u8; 2] = [0x0E, 0x20];
}

const SWITCH_ON: u8 = 0x01;
const SWITCH_OFF: u8 = 0x00;
const STATUS_ALL: u8 = 0x06;
const SCENE_SUFFIX: [u8; 2] = [0xFF, 0x32];

/// Command family selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandMode {
    /// Power, white brightness, white temperature and status
    Standard = 0x01,
    /// RGB color and scenes
    Rgb = 0x03,
}

// ----------------------------------------------------------------------------
// Checksum
// ----------------------------------------------------------------------------

/// Checksum over the given bytes: `0xFF - (sum mod 256)`
pub fn checksum(bytes: &[u8]) -> u8 {
    0xFF - bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Check that the last byte of `frame` is the checksum of everything before it
pub fn verify_checksum(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((last, body)) if !body.is_empty() => checksum(body) == *last,
        _ => false,
    }
}

// ----------------------------------------------------------------------------
// Command
// ----------------------------------------------------------------------------

/// A complete, checksummed command frame ready to be written to the light
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Command(Vec<u8>);

impl Command {
    fn build(mode: CommandMode, opcode: [u8; 2], payload: &[u8]) -> Self {
        let mut frame = Vec::with_capacity(FRAME_HEADER.len() + 3 + payload.len() + 1);
        frame.extend_from_slice(&FRAME_HEADER);
        frame.push(mode as u8);
        frame.extend_from_slice(&opcode);
        frame.extend_from_slice(payload);
        frame.push(checksum(&frame));
        Self(frame)
    }

    /// Turn the light on
    pub fn on() -> Self {
        Self::build(CommandMode::Standard, opcode::SWITCH, &[SWITCH_ON])
    }

    /// Turn the light off
    pub fn off() -> Self {
        Self::build(CommandMode::Standard, opcode::SWITCH, &[SWITCH_OFF])
    }

    /// Ask the light to send a status notification
    pub fn status() -> Self {
        Self::build(CommandMode::Standard, opcode::STATUS, &[STATUS_ALL])
    }

    /// Set white brightness; the value is clamped into `1..=255`
    pub fn brightness(value: i64) -> Self {
        let value = value.clamp(1, 0xFF) as u8;
        Self::build(CommandMode::Standard, opcode::DIM, &[value])
    }

    /// Select a white temperature level; the value is clamped into `1..=5`
    pub fn white_temp(level: i64) -> Self {
        let level = ColorTempLevel::clamped(level);
        Self::build(CommandMode::Standard, opcode::WHITE_TEMP, &[level.get()])
    }

    /// Set an RGB color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::build(CommandMode::Rgb, opcode::RGB, &[r, g, b])
    }

    /// Start one of the built-in scenes, `1..=93`
    pub fn scene(id: i64) -> Result<Self, ValidationError> {
        if !(1..=MAX_SCENE_ID).contains(&id) {
            return Err(ValidationError::Scene { value: id });
        }
        let payload = [id as u8, SCENE_SUFFIX[0], SCENE_SUFFIX[1]];
        Ok(Self::build(CommandMode::Rgb, opcode::SCENE, &payload))
    }

    /// Raw frame bytes as written to the command characteristic
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lower-case hex rendering of the frame
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Command family of this frame
    pub fn mode(&self) -> CommandMode {
        if self.0[2] == CommandMode::Rgb as u8 {
            CommandMode::Rgb
        } else {
            CommandMode::Standard
        }
    }

    /// Operation code of this frame
    pub fn opcode(&self) -> [u8; 2] {
        [self.0[3], self.0[4]]
    }

    /// Payload between opcode and checksum
    pub fn payload(&self) -> &[u8] {
        &self.0[5..self.0.len() - 1]
    }

    /// Trailing checksum byte
    pub fn checksum(&self) -> u8 {
        self.0[self.0.len() - 1]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({})", self.to_hex())
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_frames() {
        assert_eq!(Command::status().to_hex(), "55aa01081506dc");
        assert_eq!(Command::on().to_hex(), "55aa01080501f1");
        assert_eq!(Command::off().to_hex(), "55aa01080500f2");
    }

    #[test]
    fn test_white_temp_codes() {
        // level byte followed by checksum
        let expected = ["01ed", "02ec", "03eb", "04ea", "05e9"];
        for (level, suffix) in (1..=5).zip(expected) {
            let hex = Command::white_temp(level).to_hex();
            assert!(hex.starts_with("55aa010809"), "{hex}");
            assert!(hex.ends_with(suffix), "level {level}: {hex}");
        }
    }

    #[test]
    fn test_brightness_clamps() {
        assert_eq!(Command::brightness(-5), Command::brightness(1));
        assert_eq!(Command::brightness(0), Command::brightness(1));
        assert_eq!(Command::brightness(9999), Command::brightness(255));
        assert_eq!(Command::brightness(0x80).payload(), &[0x80]);
    }

    #[test]
    fn test_white_temp_clamps() {
        assert_eq!(Command::white_temp(0), Command::white_temp(1));
        assert_eq!(Command::white_temp(9), Command::white_temp(5));
    }

    #[test]
    fn test_rgb_uses_rgb_mode() {
        let command = Command::rgb(0x12, 0x34, 0x56);
        assert_eq!(command.mode(), CommandMode::Rgb);
        assert_eq!(command.opcode(), opcode::RGB);
        assert_eq!(command.payload(), &[0x12, 0x34, 0x56]);
        assert!(verify_checksum(command.as_bytes()));
    }

    #[test]
    fn test_scene_domain() {
        assert!(Command::scene(0).is_err());
        assert!(Command::scene(94).is_err());
        assert!(Command::scene(1).is_ok());
        assert!(Command::scene(93).is_ok());

        let command = Command::scene(7).unwrap();
        assert_eq!(command.mode(), CommandMode::Rgb);
        assert_eq!(command.payload(), &[0x07, 0xFF, 0x32]);
    }

    #[test]
    fn test_verify_checksum_rejects_tampering() {
        let mut frame = Command::on().as_bytes().to_vec();
        assert!(verify_checksum(&frame));
        frame[5] ^= 0x01;
        assert!(!verify_checksum(&frame));
        assert!(!verify_checksum(&[]));
        assert!(!verify_checksum(&[0xFF]));
    }
}
