//! Subtitle styling options for the add-subtitles job.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Named colours accepted for `subtitle_color`. Anything else is read as a hex literal.
const NAMED_COLORS: &[(&str, &str)] = &[
    ("white", "FFFFFF"),
    ("black", "000000"),
    ("red", "FF0000"),
    ("green", "00FF00"),
    ("blue", "0000FF"),
    ("yellow", "FFFF00"),
    ("cyan", "00FFFF"),
    ("magenta", "FF00FF"),
    ("orange", "FFA500"),
    ("purple", "800080"),
    ("pink", "FFC0CB"),
    ("gray", "808080"),
    ("grey", "808080"),
];

/// Invalid subtitle option.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubtitleOptionError {
    #[error("Unknown subtitle color '{0}': expected a color name or a 6-digit hex value")]
    InvalidColor(String),

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// How the text is decorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleStyle {
    /// Text with an outline and no background
    #[default]
    Outline,
    /// Text on an opaque box
    Boxed,
}

impl SubtitleStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleStyle::Outline => "outline",
            SubtitleStyle::Boxed => "boxed",
        }
    }
}

impl fmt::Display for SubtitleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subtitle track format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleFormat {
    /// Container-native text track (`mov_text` in MP4); styling is left to the player
    #[default]
    MovText,
    /// Styled ASS overlay rendered by libass (or muxed as an ASS track into MKV)
    Ass,
}

impl SubtitleFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleFormat::MovText => "mov_text",
            SubtitleFormat::Ass => "ass",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A colour given by name or hex literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SubtitleColor(pub String);

impl SubtitleColor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Resolve to an uppercase `RRGGBB` string.
    pub fn to_rgb_hex(&self) -> Result<String, SubtitleOptionError> {
        let raw = self.0.trim();
        let lowered = raw.to_ascii_lowercase();
        if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == lowered) {
            return Ok((*hex).to_string());
        }

        let literal = raw
            .strip_prefix('#')
            .or_else(|| raw.strip_prefix("0x"))
            .unwrap_or(raw);
        if literal.len() == 6 && literal.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(literal.to_ascii_uppercase())
        } else {
            Err(SubtitleOptionError::InvalidColor(self.0.clone()))
        }
    }

    /// Resolve to an ASS colour (`&H00BBGGRR`, alpha first, blue-green-red order).
    pub fn to_ass_colour(&self) -> Result<String, SubtitleOptionError> {
        let rgb = self.to_rgb_hex()?;
        Ok(format!("&H00{}{}{}", &rgb[4..6], &rgb[2..4], &rgb[0..2]))
    }
}

impl Default for SubtitleColor {
    fn default() -> Self {
        Self("white".to_string())
    }
}

/// Full set of styling parameters for burning or muxing subtitles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleOptions {
    pub subtitle_color: SubtitleColor,
    pub subtitle_style: SubtitleStyle,
    /// Muxed stream track instead of burned pixels
    pub use_soft_subtitles: bool,
    pub subtitle_format: SubtitleFormat,
    /// Font height as a percentage of the video height
    pub font_size_percentage: f64,
    /// Bottom margin as a percentage of the video height
    pub margin_percentage: f64,
}

impl Default for SubtitleOptions {
    fn default() -> Self {
        Self {
            subtitle_color: SubtitleColor::default(),
            subtitle_style: SubtitleStyle::default(),
            use_soft_subtitles: false,
            subtitle_format: SubtitleFormat::default(),
            font_size_percentage: 5.0,
            margin_percentage: 5.0,
        }
    }
}

impl SubtitleOptions {
    /// Check colour and percentages before any tool is invoked.
    pub fn validate(&self) -> Result<(), SubtitleOptionError> {
        self.subtitle_color.to_rgb_hex()?;
        check_range("font_size_percentage", self.font_size_percentage, 0.1, 100.0)?;
        check_range("margin_percentage", self.margin_percentage, 0.0, 100.0)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), SubtitleOptionError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(SubtitleOptionError::OutOfRange { field, value, min, max })
    }
}
