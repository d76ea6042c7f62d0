use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #rgb, #rrggbb or #rrggbbaa")]
pub struct InvalidColor(pub String);

/// Fill/stroke color of an annotation, as a CSS hex string.
///
/// Values read back from storage are taken as-is; values entered by a user go
/// through [`Color::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn parse(value: &str) -> Result<Self, InvalidColor> {
        static HEX_REGEX: OnceLock<Regex> = OnceLock::new();
        let hex = HEX_REGEX.get_or_init(|| {
            Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
                .expect("Invalid color regex")
        });

        let value = value.trim();
        if hex.is_match(value) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(InvalidColor(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self(PALETTE[0].value.to_string())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named palette entry offered by the metadata form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub value: &'static str,
}

impl Swatch {
    pub fn color(&self) -> Color {
        Color(self.value.to_string())
    }
}

/// The fixed palette; the first entry is the default.
pub const PALETTE: [Swatch; 8] = [
    Swatch { name: "Blue", value: "#088888" },
    Swatch { name: "Red", value: "#dc2626" },
    Swatch { name: "Green", value: "#16a34a" },
    Swatch { name: "Yellow", value: "#ca8a04" },
    Swatch { name: "Purple", value: "#9333ea" },
    Swatch { name: "Orange", value: "#ea580c" },
    Swatch { name: "Pink", value: "#db2777" },
    Swatch { name: "Gray", value: "#6b7280" },
];
