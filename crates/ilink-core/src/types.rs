//! Value types shared by the session and the coordinator

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::protocol::color_temp::ColorTempLevel;
use crate::protocol::command::MAX_SCENE_ID;
use crate::protocol::status::StatusFrame;

// ----------------------------------------------------------------------------
// RGB Color
// ----------------------------------------------------------------------------

/// An RGB color triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from wide channel values, rejecting anything outside `0..=255`
    pub fn from_channels(r: i64, g: i64, b: i64) -> Result<Self, ValidationError> {
        match (u8::try_from(r), u8::try_from(g), u8::try_from(b)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
            _ => Err(ValidationError::RgbChannel { r, g, b }),
        }
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ValidationError;

    /// Accepts `#rrggbb`, `rrggbb` and `r,g,b`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ValidationError::invalid_value(LightKey::Rgb.as_str(), s);

        if s.contains(',') {
            let channels = s
                .split(',')
                .map(|part| part.trim().parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| invalid())?;
            return match channels.as_slice() {
                [r, g, b] => Rgb::from_channels(*r, *g, *b),
                _ => Err(invalid()),
            };
        }

        let digits = s.strip_prefix('#').unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| invalid())?;
        match bytes.as_slice() {
            [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
            _ => Err(invalid()),
        }
    }
}

// ----------------------------------------------------------------------------
// Logical State
// ----------------------------------------------------------------------------

/// The state of a light as exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalState {
    /// Whether the light is on
    pub power: bool,
    /// Raw brightness, 0 to 255
    pub brightness: u8,
    /// White temperature in Kelvin, always one of the five reference values
    pub color_temp_kelvin: u32,
    /// RGB color
    pub rgb: Rgb,
    /// Last scene started through this coordinator
    pub scene: Option<u8>,
}

impl Default for LogicalState {
    fn default() -> Self {
        Self {
            power: true,
            brightness: 0xFF,
            color_temp_kelvin: ColorTempLevel::SUN_LIGHT.kelvin(),
            rgb: Rgb::WHITE,
            scene: None,
        }
    }
}

impl LogicalState {
    /// Merge telemetry reported by the device
    ///
    /// An unknown temperature code leaves the stored Kelvin untouched.
    pub fn apply_status(&mut self, status: &StatusFrame) {
        if let Some(level) = status.color_temp_level {
            self.color_temp_kelvin = level.kelvin();
        }
        self.brightness = status.brightness;
        self.power = status.power;
        self.rgb = status.rgb;
    }

    /// Record a state change the device just accepted
    pub fn apply_update(&mut self, update: &StateUpdate) {
        match *update {
            StateUpdate::Power(on) => self.power = on,
            StateUpdate::Brightness(value) => self.brightness = value.clamp(0, 0xFF) as u8,
            StateUpdate::ColorTemp(kelvin) => {
                self.color_temp_kelvin = ColorTempLevel::from_kelvin(kelvin).kelvin();
                self.scene = None;
            }
            StateUpdate::Rgb(rgb) => {
                self.rgb = rgb;
                self.scene = None;
            }
            StateUpdate::Scene(id) => self.scene = u8::try_from(id).ok(),
        }
    }
}

// ----------------------------------------------------------------------------
// State Updates
// ----------------------------------------------------------------------------

/// Keys of the logical state that callers can change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKey {
    Power,
    Brightness,
    #[serde(rename = "color_temp_kelvin")]
    ColorTemp,
    #[serde(rename = "rgb_color")]
    Rgb,
    Scene,
}

impl LightKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightKey::Power => "power",
            LightKey::Brightness => "brightness",
            LightKey::ColorTemp => "color_temp_kelvin",
            LightKey::Rgb => "rgb_color",
            LightKey::Scene => "scene",
        }
    }
}

impl fmt::Display for LightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "power" => Ok(LightKey::Power),
            "brightness" => Ok(LightKey::Brightness),
            "color_temp_kelvin" | "color_temp" => Ok(LightKey::ColorTemp),
            "rgb_color" | "rgb" => Ok(LightKey::Rgb),
            "scene" => Ok(LightKey::Scene),
            other => Err(format!("unknown light key: {other}")),
        }
    }
}

/// A requested change to one key of the logical state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateUpdate {
    /// Turn on or off
    Power(bool),
    /// Raw brightness, must be within `0..=255`
    Brightness(i64),
    /// White temperature in Kelvin, quantised onto the five levels
    ColorTemp(u32),
    /// RGB color
    Rgb(Rgb),
    /// Built-in scene, must be within `1..=93`
    Scene(i64),
}

impl StateUpdate {
    /// Key this update changes
    pub fn key(&self) -> LightKey {
        match self {
            StateUpdate::Power(_) => LightKey::Power,
            StateUpdate::Brightness(_) => LightKey::Brightness,
            StateUpdate::ColorTemp(_) => LightKey::ColorTemp,
            StateUpdate::Rgb(_) => LightKey::Rgb,
            StateUpdate::Scene(_) => LightKey::Scene,
        }
    }

    /// Check the requested value against the device's domain
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            StateUpdate::Brightness(value) if !(0..=0xFF).contains(&value) => {
                Err(ValidationError::Brightness { value })
            }
            StateUpdate::Scene(value) if !(1..=MAX_SCENE_ID).contains(&value) => {
                Err(ValidationError::Scene { value })
            }
            _ => Ok(()),
        }
    }

    /// Build an update from a textual key and value
    ///
    /// Returns `Ok(None)` for keys that don't name a light attribute.
    pub fn from_key_value(key: &str, value: &str) -> Result<Option<Self>, ValidationError> {
        let Ok(key) = key.parse::<LightKey>() else {
            return Ok(None);
        };
        let raw = value.trim();
        let invalid = || ValidationError::invalid_value(key.as_str(), raw);

        let update = match key {
            LightKey::Power => match raw.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => StateUpdate::Power(true),
                "off" | "false" | "0" => StateUpdate::Power(false),
                _ => return Err(invalid()),
            },
            LightKey::Brightness => StateUpdate::Brightness(raw.parse().map_err(|_| invalid())?),
            LightKey::ColorTemp => StateUpdate::ColorTemp(raw.parse().map_err(|_| invalid())?),
            LightKey::Rgb => StateUpdate::Rgb(raw.parse()?),
            LightKey::Scene => StateUpdate::Scene(raw.parse().map_err(|_| invalid())?),
        };
        update.validate()?;
        Ok(Some(update))
    }
}

// ----------------------------------------------------------------------------
// Presets
// ----------------------------------------------------------------------------

/// Lighting presets built from two dependent updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Sun light temperature at full brightness, the brightest the light gets
    Full,
    /// Candle light at a very low brightness
    Sleep,
}

impl Preset {
    /// Updates to apply, in order
    pub fn updates(&self) -> [StateUpdate; 2] {
        match self {
            Preset::Full => [
                StateUpdate::ColorTemp(ColorTempLevel::SUN_LIGHT.kelvin()),
                StateUpdate::Brightness(255),
            ],
            Preset::Sleep => [
                StateUpdate::ColorTemp(ColorTempLevel::CANDLE_LIGHT.kelvin()),
                StateUpdate::Brightness(4),
            ],
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "100%" => Ok(Preset::Full),
            "sleep" => Ok(Preset::Sleep),
            other => Err(format!("unknown preset: {other}")),
        }
    }
}
