use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ACTIVE_COLOR: Rgba = Rgba::new(0xff, 0x00, 0x00, 0xff);
pub const DEFAULT_MARKER_SIZE: MarkerSize = MarkerSize { width: 50, height: 50 };

/// Error types for configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration in {path}: {reason}")]
    InvalidFormat { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("color '{0}' must start with '#'")]
    MissingPrefix(String),

    #[error("color '{value}' has {digits} hex digits, expected 6 (#RRGGBB) or 8 (#RRGGBBAA)")]
    InvalidLength { value: String, digits: usize },

    #[error("color '{value}' contains non-hex digit '{digit}'")]
    InvalidDigit { value: String, digit: char },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("size '{0}' must look like <width>x<height>")]
    MissingSeparator(String),

    #[error("size '{value}' has an invalid dimension '{part}'")]
    InvalidDimension { value: String, part: String },

    #[error("size '{0}' must not have a zero dimension")]
    Zero(String),
}

/// An 8-bit straight-alpha color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Rgba {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self { red, green, blue, alpha }
    }

    /// Channels premultiplied by alpha and widened to 16 bits, as the RENDER
    /// extension expects them.
    pub fn premultiplied16(&self) -> [u16; 4] {
        let scale = |c: u8| -> u16 {
            let c = (c as u32 * self.alpha as u32 + 127) / 255;
            (c * 0x101) as u16
        };
        [
            scale(self.red),
            scale(self.green),
            scale(self.blue),
            self.alpha as u16 * 0x101,
        ]
    }

    /// A premultiplied ARGB pixel value for a 32-bit TrueColor visual.
    pub fn argb_pixel(&self) -> u32 {
        let [r, g, b, a] = self.premultiplied16();
        ((a as u32 >> 8) << 24) | ((r as u32 >> 8) << 16) | ((g as u32 >> 8) << 8) | (b as u32 >> 8)
    }
}

impl FromStr for Rgba {
    type Err = ColorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value
            .strip_prefix('#')
            .ok_or_else(|| ColorError::MissingPrefix(value.to_string()))?;

        if let Some(digit) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidDigit { value: value.to_string(), digit });
        }
        if digits.len() != 6 && digits.len() != 8 {
            return Err(ColorError::InvalidLength { value: value.to_string(), digits: digits.len() });
        }

        // Every char is an ASCII hex digit, so byte slicing is on char boundaries.
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(0);
        let alpha = if digits.len() == 8 { channel(6) } else { 0xff };
        Ok(Self::new(channel(0), channel(2), channel(4), alpha))
    }
}

impl TryFrom<String> for Rgba {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.red, self.green, self.blue, self.alpha)
    }
}

/// Size of the marker drawn on the active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct MarkerSize {
    pub width: u16,
    pub height: u16,
}

impl FromStr for MarkerSize {
    type Err = SizeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (w, h) = value
            .split_once(['x', 'X'])
            .ok_or_else(|| SizeError::MissingSeparator(value.to_string()))?;

        let dimension = |part: &str| {
            part.trim().parse::<u16>().map_err(|_| SizeError::InvalidDimension {
                value: value.to_string(),
                part: part.to_string(),
            })
        };
        let (width, height) = (dimension(w)?, dimension(h)?);
        if width == 0 || height == 0 {
            return Err(SizeError::Zero(value.to_string()));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for MarkerSize {
    type Error = SizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for MarkerSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Values read from the TOML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub active_color: Option<Rgba>,
    pub inactive_color: Option<Rgba>,
    pub marker_size: Option<MarkerSize>,
}

/// Values given on the command line. They take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub active_color: Option<Rgba>,
    pub inactive_color: Option<Rgba>,
    pub marker_size: Option<MarkerSize>,
}

/// Validated settings the engine runs with. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub active_color: Rgba,
    /// Inactive windows are only marked when a color is configured for them.
    pub inactive_color: Option<Rgba>,
    pub marker: MarkerSize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            active_color: DEFAULT_ACTIVE_COLOR,
            inactive_color: None,
            marker: DEFAULT_MARKER_SIZE,
        }
    }
}

impl Configuration {
    /// Defaults, overlaid by the file, overlaid by the command line.
    pub fn resolve(file: Option<FileConfig>, overrides: Overrides) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            active_color: overrides.active_color.or(file.active_color).unwrap_or(defaults.active_color),
            inactive_color: overrides.inactive_color.or(file.inactive_color),
            marker: overrides.marker_size.or(file.marker_size).unwrap_or(defaults.marker),
        }
    }

    /// Load the file (explicit path, or the default location) and merge.
    pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) => Some(load_file(path)?),
            None => match default_path() {
                Some(path) if path.exists() => Some(load_file(&path)?),
                _ => None,
            },
        };
        Ok(Self::resolve(file, overrides))
    }

    pub fn track_inactive(&self) -> bool {
        self.inactive_color.is_some()
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("xfce-rs").join("focusmark.toml"))
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound { path: path.display().to_string() });
    }

    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}
