//! Colors
//!
//! Linear RGBA color used by materials, labels and exporters. Parses the
//! `0xRRGGBB` integers found in config files and the CSS strings
//! (`#rgb`, `#rrggbb`, `rgb(..)`, `rgba(..)`) used for label and road styles.

use serde::{Deserialize, Serialize};

/// RGBA color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Build from a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self::rgb(
            ((hex >> 16) & 0xff) as f32 / 255.0,
            ((hex >> 8) & 0xff) as f32 / 255.0,
            (hex & 0xff) as f32 / 255.0,
        )
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a: a.clamp(0.0, 1.0), ..self }
    }

    /// Parse a CSS color string. Returns `None` for anything unrecognized.
    pub fn parse_css(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return Self::parse_hex_digits(hex);
        }

        let lower = text.to_ascii_lowercase();
        let (body, has_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
            (rest.strip_suffix(')')?, true)
        } else if let Some(rest) = lower.strip_prefix("rgb(") {
            (rest.strip_suffix(')')?, false)
        } else {
            return match lower.as_str() {
                "white" => Some(Self::WHITE),
                "black" => Some(Self::BLACK),
                "transparent" => Some(Self::BLACK.with_alpha(0.0)),
                _ => Self::parse_hex_digits(&lower),
            };
        };

        let parts: Vec<f32> = body
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .ok()?;
        match (parts.as_slice(), has_alpha) {
            ([r, g, b], false) => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
            ([r, g, b, a], true) => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0).with_alpha(*a)),
            _ => None,
        }
    }

    /// Parse a CSS color, falling back to `fallback` when it is not valid.
    pub fn parse_css_or(text: &str, fallback: Color) -> Self {
        Self::parse_css(text).unwrap_or(fallback)
    }

    fn parse_hex_digits(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                let expand = |n: u32| (n << 4) | n;
                Some(Self::from_hex(
                    (expand((v >> 8) & 0xf) << 16) | (expand((v >> 4) & 0xf) << 8) | expand(v & 0xf),
                ))
            }
            6 => Some(Self::from_hex(u32::from_str_radix(hex, 16).ok()?)),
            _ => None,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// 8-bit RGBA, used when writing textures and frame buffers.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// `rgb(r,g,b)` for SVG style attributes (alpha written separately).
    pub fn to_css_rgb(self) -> String {
        let [r, g, b, _] = self.to_rgba8();
        format!("rgb({r},{g},{b})")
    }

    pub fn scale_rgb(self, factor: f32) -> Self {
        Self {
            r: self.r * factor,
            g: self.g * factor,
            b: self.b * factor,
            a: self.a,
        }
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}
