//! Colors for style records.
//!
//! Stored as straight (non-premultiplied) linear RGB in `[0, 1]` plus alpha.
//! Serialized as `#rrggbb` / `#rrggbbaa` hex strings.

use crate::error::ColorParseError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(text: &str) -> Result<Color, ColorParseError> {
        let digits = text
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(text.to_string()))?;

        let nibble = |c: char| -> Result<u8, ColorParseError> {
            c.to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| ColorParseError::BadDigit(text.to_string()))
        };

        let chars: Vec<char> = digits.chars().collect();
        let bytes: Vec<u8> = match chars.len() {
            3 => chars
                .iter()
                .map(|&c| nibble(c).map(|n| n * 17))
                .collect::<Result<_, _>>()?,
            6 | 8 => chars
                .chunks(2)
                .map(|pair| -> Result<u8, ColorParseError> {
                    Ok(nibble(pair[0])? * 16 + nibble(pair[1])?)
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(ColorParseError::BadLength(text.to_string())),
        };

        let alpha = bytes.get(3).map(|&a| a as f32 / 255.0).unwrap_or(1.0);
        Ok(Color::rgba(
            bytes[0] as f32 / 255.0,
            bytes[1] as f32 / 255.0,
            bytes[2] as f32 / 255.0,
            alpha,
        ))
    }

    pub fn to_hex(&self) -> String {
        let to8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", to8(self.r), to8(self.g), to8(self.b))
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                to8(self.r),
                to8(self.g),
                to8(self.b),
                to8(self.a)
            )
        }
    }

    /// Linear mix toward `other` by `t` (alpha is mixed too)
    pub fn mix(&self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color::rgba(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    pub fn with_alpha(&self, a: f32) -> Color {
        Color::rgba(self.r, self.g, self.b, a)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> String {
        color.to_hex()
    }
}
