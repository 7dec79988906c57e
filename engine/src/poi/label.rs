//! Label Rendering
//!
//! Rasterizes POI names into RGBA billboard textures with a built-in 5x7
//! pixel font. Bold widens every stroke by one font pixel; italic shears
//! rows to the right toward the top of the glyph. The surface is sized to
//! the measured text plus padding and the text is centered vertically.

use glam::Vec2;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::config::LabelConfig;
use crate::scene::Color;

/// Glyph size in font pixels.
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
/// Gap between glyphs in font pixels.
const GLYPH_GAP: u32 = 1;
/// Horizontal italic shear per font row, in font pixels.
const ITALIC_SHEAR: f32 = 0.25;

// ============================================================================
// STYLE
// ============================================================================

/// How the connector from marker to label is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStyle {
    #[default]
    Solid,
    Dashed,
}

/// Label appearance shared by every POI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    pub background: bool,
    /// CSS color; invalid strings fall back to the configured background
    pub background_color: String,
    pub bold: bool,
    pub italic: bool,
    pub connector: ConnectorStyle,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            background: true,
            background_color: LabelConfig::default().background_color,
            bold: true,
            italic: false,
            connector: ConnectorStyle::Solid,
        }
    }
}

/// A rendered label texture.
#[derive(Clone, Debug)]
pub struct LabelImage {
    pub image: RgbaImage,
    pub width: u32,
    pub height: u32,
}

impl LabelImage {
    /// Sprite size in world units.
    pub fn world_size(&self, scale: f32) -> Vec2 {
        Vec2::new(self.width as f32 * scale, self.height as f32 * scale)
    }
}

// ============================================================================
// PIXEL FONT
// ============================================================================
// Each glyph is 5x7 pixels stored as row bitmasks, top row first.
// Bit 4 is the leftmost column.

pub fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111],
        '3' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b01110, 0b10000, 0b11110, 0b10001, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],
        ' ' => [0; 7],
        '.' => [0, 0, 0, 0, 0, 0, 0b00100],
        ',' => [0, 0, 0, 0, 0, 0b00100, 0b01000],
        ':' => [0, 0b00100, 0, 0, 0, 0b00100, 0],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        '+' => [0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '#' => [0b01010, 0b11111, 0b01010, 0b01010, 0b01010, 0b11111, 0b01010],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00100, 0, 0b00100],
        '\'' => [0b00100, 0b00100, 0, 0, 0, 0, 0],
        // Unknown = filled box
        _ => [0b11111; 7],
    }
}

// ============================================================================
// RENDERER
// ============================================================================

/// Text rasterizer bound to the label section of the config.
#[derive(Clone, Debug)]
pub struct LabelRenderer {
    config: LabelConfig,
}

impl LabelRenderer {
    pub fn new(config: LabelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    fn advance(&self, style: &LabelStyle) -> u32 {
        let stroke = if style.bold { GLYPH_W + 1 } else { GLYPH_W };
        (stroke + GLYPH_GAP) * self.config.font_scale.max(1)
    }

    fn italic_extra(&self, style: &LabelStyle) -> f32 {
        if style.italic {
            (GLYPH_H - 1) as f32 * ITALIC_SHEAR * self.config.font_scale.max(1) as f32
        } else {
            0.0
        }
    }

    /// Width of `text` in texels under `style` (no padding).
    pub fn measure(&self, text: &str, style: &LabelStyle) -> f32 {
        let count = text.chars().count() as u32;
        if count == 0 {
            return 0.0;
        }
        let gap = GLYPH_GAP * self.config.font_scale.max(1);
        (count * self.advance(style) - gap) as f32 + self.italic_extra(style)
    }

    /// Rasterize `text` into a padded RGBA surface.
    pub fn render(&self, text: &str, style: &LabelStyle) -> LabelImage {
        let scale = self.config.font_scale.max(1);
        let pad = self.config.padding;
        let width = self.measure(text, style).ceil() as u32 + pad * 2;
        let height = self.config.line_height + pad * 2;

        let background = if style.background {
            let fallback = Color::parse_css_or(&self.config.background_color, Color::BLACK.with_alpha(0.5));
            Color::parse_css_or(&style.background_color, fallback)
        } else {
            Color::BLACK.with_alpha(0.0)
        };
        let text_color = Color::parse_css_or(&self.config.text_color, Color::WHITE);

        let mut image = RgbaImage::from_pixel(width, height, Rgba(background.to_rgba8()));

        let glyph_height = GLYPH_H * scale;
        let top = height.saturating_sub(glyph_height) / 2;
        let stroke_extra = u32::from(style.bold);
        let shear = if style.italic { ITALIC_SHEAR * scale as f32 } else { 0.0 };

        for (index, c) in text.chars().enumerate() {
            let origin_x = pad + index as u32 * self.advance(style);
            for (row, bits) in glyph(c).iter().enumerate() {
                let row = row as u32;
                let offset = ((GLYPH_H - 1 - row) as f32 * shear).round() as u32;
                for col in 0..GLYPH_W {
                    if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let x0 = origin_x + offset + col * scale;
                    let x1 = x0 + (1 + stroke_extra) * scale;
                    let y0 = top + row * scale;
                    fill_rect(&mut image, x0, y0, x1, y0 + scale, text_color);
                }
            }
        }

        LabelImage {
            image,
            width,
            height,
        }
    }
}

/// Source-over fill of `[x0, x1) × [y0, y1)`, clipped to the image.
fn fill_rect(image: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Color) {
    let x1 = x1.min(image.width());
    let y1 = y1.min(image.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let dst = image.get_pixel_mut(x, y);
            *dst = blend_over(*dst, color);
        }
    }
}

/// Alpha-composite `src` over `dst`.
pub fn blend_over(dst: Rgba<u8>, src: Color) -> Rgba<u8> {
    let sa = src.a.clamp(0.0, 1.0);
    let [dr, dg, db, da] = dst.0.map(|v| v as f32 / 255.0);
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mix = |s: f32, d: f32| (s * sa + d * da * (1.0 - sa)) / out_a;
    Rgba(
        Color {
            r: mix(src.r, dr),
            g: mix(src.g, dg),
            b: mix(src.b, db),
            a: out_a,
        }
        .to_rgba8(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> LabelRenderer {
        LabelRenderer::new(LabelConfig::default())
    }

    #[test]
    fn test_surface_is_text_plus_padding() {
        let r = renderer();
        let style = LabelStyle::default();
        let label = r.render("HQ", &style);
        assert_eq!(label.width, r.measure("HQ", &style).ceil() as u32 + 16);
        assert_eq!(label.height, 36 + 16);
        assert_eq!(label.image.dimensions(), (label.width, label.height));
    }

    #[test]
    fn test_bold_and_italic_widen_text() {
        let r = renderer();
        let regular = LabelStyle {
            bold: false,
            ..LabelStyle::default()
        };
        let bold = LabelStyle::default();
        let italic = LabelStyle {
            italic: true,
            ..regular.clone()
        };
        assert!(r.measure("Depot", &bold) > r.measure("Depot", &regular));
        assert!(r.measure("Depot", &italic) > r.measure("Depot", &regular));
        assert_eq!(r.measure("", &bold), 0.0);
    }

    #[test]
    fn test_background_fill_and_text_pixels() {
        let r = renderer();
        let label = r.render("I", &LabelStyle::default());
        // Corner is the translucent background
        assert_eq!(label.image.get_pixel(0, 0).0, [0, 0, 0, 128]);
        // Top bar of the I glyph is white
        let top = (label.height - 7 * 4) / 2;
        assert_eq!(label.image.get_pixel(8 + 4, top).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_no_background_is_transparent() {
        let style = LabelStyle {
            background: false,
            ..LabelStyle::default()
        };
        let label = renderer().render(" ", &style);
        assert!(label.image.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_invalid_background_uses_default() {
        let style = LabelStyle {
            background_color: "not a color".to_string(),
            ..LabelStyle::default()
        };
        let label = renderer().render("A", &style);
        assert_eq!(label.image.get_pixel(0, 0).0, [0, 0, 0, 128]);
    }

    #[test]
    fn test_world_size_uses_scale() {
        let label = renderer().render("A", &LabelStyle::default());
        let size = label.world_size(0.15);
        assert!((size.y - 52.0 * 0.15).abs() < 1e-5);
    }
}
