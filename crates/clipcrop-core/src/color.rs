//! RGBA color type with CSS-style hex parsing.
//!
//! Colors arrive from callers as hex strings (`#rgb`, `#rrggbb`, or
//! `#rrggbbaa`). Parsing happens once at the pipeline entry point, so the
//! pixel stages only ever see validated channel values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when a color string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid color string: {0}")]
pub struct ParseColorError(pub String);

/// An RGBA color with 8-bit channels, non-premultiplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    /// Create an opaque color from RGB channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color from RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Channel values as an RGBA array.
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ParseColorError(s.to_string()))?;

        let parse2 = |chunk: &str| {
            u8::from_str_radix(chunk, 16).map_err(|_| ParseColorError(s.to_string()))
        };

        match hex.len() {
            // #rgb - each digit doubled
            3 => {
                let mut channels = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c
                        .to_digit(16)
                        .ok_or_else(|| ParseColorError(s.to_string()))? as u8;
                    channels[i] = v * 16 + v;
                }
                Ok(Color::rgb(channels[0], channels[1], channels[2]))
            }
            6 => Ok(Color::rgb(
                parse2(&hex[0..2])?,
                parse2(&hex[2..4])?,
                parse2(&hex[4..6])?,
            )),
            8 => Ok(Color::rgba(
                parse2(&hex[0..2])?,
                parse2(&hex[2..4])?,
                parse2(&hex[4..6])?,
                parse2(&hex[6..8])?,
            )),
            _ => Err(ParseColorError(s.to_string())),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_six_digit() {
        let c: Color = "#ff8000".parse().unwrap();
        assert_eq!(c, Color::rgb(255, 128, 0));
    }

    #[test]
    fn test_parse_three_digit() {
        let c: Color = "#f80".parse().unwrap();
        assert_eq!(c, Color::rgb(255, 136, 0));
    }

    #[test]
    fn test_parse_eight_digit_alpha() {
        let c: Color = "#00000080".parse().unwrap();
        assert_eq!(c, Color::rgba(0, 0, 0, 128));
    }

    #[test]
    fn test_parse_rejects_missing_hash() {
        assert!("ffffff".parse::<Color>().is_err());
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!("#ffff".parse::<Color>().is_err());
        assert!("#fffffffff".parse::<Color>().is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!("#zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["#ffffff", "#123456", "#12345678"] {
            let c: Color = s.parse().unwrap();
            assert_eq!(c.to_string(), s);
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(Color::WHITE, Color::rgb(255, 255, 255));
        assert_eq!(Color::TRANSPARENT.a, 0);
    }
}
