use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ThemeResult<T> = std::result::Result<T, ThemeError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThemeError {
    #[error("unknown color mode choice: {0:?} (expected system, light or dark)")]
    UnknownChoice(String),
}

/// The user's explicit color-mode preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeChoice {
    pub const ALL: [ThemeChoice; 3] = [ThemeChoice::System, ThemeChoice::Light, ThemeChoice::Dark];

    pub const fn as_str(self) -> &'static str {
        match self {
            ThemeChoice::System => "system",
            ThemeChoice::Light => "light",
            ThemeChoice::Dark => "dark",
        }
    }

    /// The mode this choice pins, or `None` when it follows the OS.
    pub const fn explicit_mode(self) -> Option<EffectiveMode> {
        match self {
            ThemeChoice::System => None,
            ThemeChoice::Light => Some(EffectiveMode::Light),
            ThemeChoice::Dark => Some(EffectiveMode::Dark),
        }
    }

    /// Parses a persisted value. Only `light` and `dark` are ever stored, so
    /// `system` (or anything else) reads as no preference.
    pub fn from_persisted(raw: &str) -> Option<ThemeChoice> {
        match raw.trim().parse::<ThemeChoice>() {
            Ok(choice @ (ThemeChoice::Light | ThemeChoice::Dark)) => Some(choice),
            _ => None,
        }
    }
}

impl FromStr for ThemeChoice {
    type Err = ThemeError;

    fn from_str(raw: &str) -> ThemeResult<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "system" => Ok(ThemeChoice::System),
            "light" => Ok(ThemeChoice::Light),
            "dark" => Ok(ThemeChoice::Dark),
            _ => Err(ThemeError::UnknownChoice(raw.to_string())),
        }
    }
}

impl fmt::Display for ThemeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mode actually rendered at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveMode {
    #[default]
    Light,
    Dark,
}

impl EffectiveMode {
    pub const fn from_prefers_dark(prefers_dark: bool) -> Self {
        if prefers_dark {
            EffectiveMode::Dark
        } else {
            EffectiveMode::Light
        }
    }

    /// Value for the root element's `data-theme` attribute.
    pub const fn data_theme(self) -> &'static str {
        match self {
            EffectiveMode::Light => "light",
            EffectiveMode::Dark => "dark",
        }
    }

    /// Glyph shown on the menu trigger.
    pub const fn glyph(self) -> &'static str {
        match self {
            EffectiveMode::Light => "☀️",
            EffectiveMode::Dark => "🌙",
        }
    }
}

impl fmt::Display for EffectiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.data_theme())
    }
}
