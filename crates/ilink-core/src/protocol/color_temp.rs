//! White color temperature levels
//!
//! The light only knows five white temperatures. Kelvin values coming from
//! callers are quantised onto those five buckets, so a Kelvin round trip is
//! idempotent but not lossless.

use serde::{Deserialize, Serialize};

/// Coldest temperature the light can produce
pub const MAX_KELVIN: u32 = 6000;

/// Warmest temperature the light can produce
pub const MIN_KELVIN: u32 = 3000;

/// Level used when nothing else applies
const FALLBACK_LEVEL: u8 = 3;

/// Reference Kelvin for each level, coldest first
const LEVEL_KELVIN: [(u8, u32); 5] = [
    (1, 6000), // cold white
    (2, 5000), // nature light
    (3, 4000), // sun light
    (4, 3500), // sun set
    (5, 3000), // candle light
];

/// One of the five white temperature levels, 1 (coldest) to 5 (warmest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ColorTempLevel(u8);

impl ColorTempLevel {
    pub const COLD_WHITE: Self = Self(1);
    pub const NATURE_LIGHT: Self = Self(2);
    pub const SUN_LIGHT: Self = Self(3);
    pub const SUN_SET: Self = Self(4);
    pub const CANDLE_LIGHT: Self = Self(5);

    /// Create a level, rejecting values outside `1..=5`
    pub fn new(level: i64) -> Option<Self> {
        (1..=5).contains(&level).then(|| Self(level as u8))
    }

    /// Create a level, clamping into `1..=5`
    pub fn clamped(level: i64) -> Self {
        Self(level.clamp(1, 5) as u8)
    }

    /// Quantise a Kelvin temperature onto the nearest level at or below it
    pub fn from_kelvin(kelvin: u32) -> Self {
        let kelvin = kelvin.clamp(MIN_KELVIN, MAX_KELVIN);
        LEVEL_KELVIN
            .iter()
            .find(|(_, reference)| kelvin >= *reference)
            .map(|(level, _)| Self(*level))
            .unwrap_or(Self(FALLBACK_LEVEL))
    }

    /// Reference Kelvin of this level
    pub fn kelvin(self) -> u32 {
        LEVEL_KELVIN[(self.0 - 1) as usize].1
    }

    /// Numeric level, 1 to 5
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ColorTempLevel {
    fn default() -> Self {
        Self(FALLBACK_LEVEL)
    }
}

impl TryFrom<u8> for ColorTempLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value as i64).ok_or_else(|| format!("invalid color temperature level {value}"))
    }
}

impl From<ColorTempLevel> for u8 {
    fn from(level: ColorTempLevel) -> Self {
        level.0
    }
}
