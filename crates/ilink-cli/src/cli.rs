//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Light to control: configured name or address (defaults to the first configured light)
    #[arg(short, long, global = true)]
    pub device: Option<String>,

    /// Seconds to listen for advertisements before connecting
    #[arg(long, global = true, default_value_t = 5)]
    pub listen: u64,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Request and print the light's current state
    Status,
    /// Turn the light on
    On,
    /// Turn the light off
    Off,
    /// Set raw brightness
    Brightness {
        /// Brightness, 0-255
        value: i64,
    },
    /// Set white temperature
    Temp {
        /// Temperature in Kelvin, quantised onto the light's five levels
        kelvin: u32,
    },
    /// Set RGB color
    Rgb { r: i64, g: i64, b: i64 },
    /// Start a built-in scene
    Scene {
        /// Scene id, 1-93
        id: i64,
    },
    /// Apply a lighting preset
    Preset {
        /// `full` (or `100%`) or `sleep`
        name: String,
    },
    /// Set one attribute by key
    Set {
        /// power, brightness, color_temp_kelvin, rgb_color or scene
        key: String,
        value: String,
    },
    /// Poll the light and print every state change as JSON
    Watch,
    /// List configured lights
    Devices,
    /// Print the effective configuration as TOML
    Config,
}
