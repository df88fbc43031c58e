//! Colors and the card theme.
//!
//! The default theme reproduces the blue/indigo gradient used for every preview.
//! Callers may override the background (which re-derives the whole gradient from
//! one base color) and the title color.

use std::fmt;
use std::str::FromStr;

use palette::{Hsl, IntoColor, Srgb};
use thiserror::Error;

// ============================================================================
// Color
// ============================================================================

/// Error returned when a string is not a `#rgb` / `#rrggbb` hex color.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a hex color (expected #rgb or #rrggbb)")]
pub struct InvalidColor(pub String);

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Creates a color from its 8-bit channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses a hex color. The leading `#` is optional.
    pub fn parse(value: &str) -> Result<Self, InvalidColor> {
        let trimmed = value.trim();
        let rgb = Srgb::<u8>::from_str(trimmed).map_err(|_| InvalidColor(trimmed.to_string()))?;
        Ok(Self::rgb(rgb.red, rgb.green, rgb.blue))
    }

    /// Formats the color as `#rrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Rotates the hue by the given number of degrees.
    pub fn rotate_hue(self, degrees: f32) -> Self {
        let mut hsl = self.to_hsl();
        hsl.hue += degrees;
        Self::from_hsl(hsl)
    }

    /// Darkens the color by reducing its HSL lightness.
    pub fn darken(self, amount: f32) -> Self {
        let mut hsl = self.to_hsl();
        hsl.lightness = (hsl.lightness - amount).max(0.0);
        Self::from_hsl(hsl)
    }

    fn to_hsl(self) -> Hsl {
        let rgb = Srgb::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        );
        rgb.into_color()
    }

    fn from_hsl(hsl: Hsl) -> Self {
        let rgb: Srgb = hsl.into_color();
        Self::rgb(to_channel(rgb.red), to_channel(rgb.green), to_channel(rgb.blue))
    }
}

impl FromStr for Color {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn to_channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

// ============================================================================
// Theme
// ============================================================================

/// First gradient stop (blue).
pub const GRADIENT_START: Color = Color::rgb(0x3b, 0x82, 0xf6);
/// Middle gradient stop (indigo).
pub const GRADIENT_MIDDLE: Color = Color::rgb(0x4f, 0x46, 0xe5);
/// Last gradient stop (dark blue).
pub const GRADIENT_END: Color = Color::rgb(0x1e, 0x40, 0xaf);

/// Colors used to paint a preview card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Background gradient stops at offsets 0, 0.5 and 1.
    pub gradient: [Color; 3],
    /// Title text.
    pub title: Color,
    /// Description text.
    pub body: Color,
    /// Author line.
    pub muted: Color,
    /// Footer site name.
    pub accent: Color,
    /// Category pill background.
    pub badge_fill: Color,
    /// Category pill text.
    pub badge_text: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            gradient: [GRADIENT_START, GRADIENT_MIDDLE, GRADIENT_END],
            title: Color::rgb(0x1e, 0x29, 0x3b),
            body: Color::rgb(0x47, 0x55, 0x69),
            muted: Color::rgb(0x64, 0x74, 0x8b),
            accent: Color::rgb(0x3b, 0x82, 0xf6),
            badge_fill: Color::rgb(0xdb, 0xea, 0xfe),
            badge_text: Color::rgb(0x1e, 0x40, 0xaf),
        }
    }
}

impl Theme {
    /// Applies optional background and text color overrides to the default theme.
    ///
    /// A background override becomes the first gradient stop; the other two stops
    /// are derived from it so the diagonal sweep keeps its shape.
    pub fn with_overrides(background: Option<Color>, text: Option<Color>) -> Self {
        let mut theme = Self::default();
        if let Some(base) = background {
            theme.gradient = [base, base.rotate_hue(15.0), base.darken(0.15)];
        }
        if let Some(text) = text {
            theme.title = text;
        }
        theme
    }
}

// ============================================================================
// Tests
// ============================================================================
