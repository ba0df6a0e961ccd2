//! Colors for annotation strokes and text.
//!
//! Colors arrive from the toolbar as CSS hex strings and are stored with a
//! fractional alpha so that highlighter strokes keep their exact translucency
//! through a save/load cycle.

use peniko::Color;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Alpha applied to highlighter strokes.
pub const HIGHLIGHTER_ALPHA: f64 = 0.3;

/// Serializable RGBA color with alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(deserialize_with = "deserialize_alpha")]
    pub a: f64,
}

fn deserialize_alpha<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(f64::deserialize(deserializer)?.clamp(0.0, 1.0))
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self {
            r,
            g,
            b,
            a: a.clamp(0.0, 1.0),
        }
    }

    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn black() -> Self {
        Self::opaque(0, 0, 0)
    }

    /// Translucent yellow used when a highlighter color cannot be parsed.
    pub fn fallback_highlight() -> Self {
        Self::new(255, 255, 0, HIGHLIGHTER_ALPHA)
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: f64) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// CSS `rgba(r,g,b,a)` notation.
    pub fn to_css(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }

    /// `#rrggbb` notation (alpha is dropped).
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::black()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl From<Rgba> for Color {
    fn from(color: Rgba) -> Self {
        let alpha = (color.a * 255.0).round() as u8;
        Color::from_rgba8(color.r, color.g, color.b, alpha)
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. Returns `None` for anything else.
pub fn parse_hex(color: &str) -> Option<Rgba> {
    let hex = color.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();

    match hex.len() {
        3 => {
            let r = channel(0..1)? * 17;
            let g = channel(1..2)? * 17;
            let b = channel(2..3)? * 17;
            Some(Rgba::opaque(r, g, b))
        }
        6 => Some(Rgba::opaque(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        8 => {
            let a = f64::from(channel(6..8)?) / 255.0;
            Some(Rgba::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, a))
        }
        _ => None,
    }
}

/// Highlighter stroke color: the configured hex color at a fixed alpha.
///
/// Malformed input falls back to translucent yellow.
pub fn highlighter_color(hex: &str, alpha: f64) -> Rgba {
    match parse_hex(hex) {
        Some(color) => color.with_alpha(alpha),
        None => {
            log::warn!("Invalid highlighter color {:?}, using fallback", hex);
            Rgba::fallback_highlight().with_alpha(alpha)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_six_digit_hex() {
        assert_eq!(parse_hex("#FF0000"), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(parse_hex("#00ff7f"), Some(Rgba::opaque(0, 255, 127)));
    }

    #[test]
    fn test_parse_short_hex() {
        assert_eq!(parse_hex("#fa0"), Some(Rgba::opaque(255, 170, 0)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_hex("FF0000"), None);
        assert_eq!(parse_hex("#GG0000"), None);
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn test_highlighter_color_red() {
        let color = highlighter_color("#FF0000", HIGHLIGHTER_ALPHA);
        assert_eq!(color.to_css(), "rgba(255,0,0,0.3)");
    }

    #[test]
    fn test_highlighter_color_fallback() {
        let color = highlighter_color("not-a-color", HIGHLIGHTER_ALPHA);
        assert_eq!(color.to_css(), "rgba(255,255,0,0.3)");
    }

    #[test]
    fn test_peniko_conversion() {
        let color: Color = Rgba::new(10, 20, 30, 1.0).into();
        let rgba = color.to_rgba8();
        assert_eq!((rgba.r, rgba.g, rgba.b, rgba.a), (10, 20, 30, 255));
    }

    #[test]
    fn test_alpha_clamped_on_load() {
        let color: Rgba = serde_json::from_str(r#"{"r":0,"g":0,"b":0,"a":5.0}"#).unwrap();
        assert_eq!(color.to_css(), "rgba(0,0,0,1)");
        let color: Rgba = serde_json::from_str(r#"{"r":1,"g":2,"b":3,"a":-0.5}"#).unwrap();
        assert_eq!(color.a, 0.0);
    }

    #[test]
    fn test_hex_output() {
        assert_eq!(Rgba::opaque(255, 0, 16).to_hex(), "#ff0010");
    }
}
