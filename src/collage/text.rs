//! Text rasterisation for titles and text decorations.
//!
//! Text is rendered to an RGBA bitmap once, when created or edited, and from
//! then on behaves like any other image object on the surface.

use crate::color::Color;
use crate::error::{Error, Result};
use ab_glyph::{FontArc, PxScale};
use image::imageops;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use std::path::Path;
use std::sync::Arc;

/// Glow or shadow drawn beneath the glyphs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextEffect {
    None,
    /// Soft dark shadow offset down-right.
    Shadow,
    /// Blurred halo in the text colour.
    Neon,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextSpec {
    pub text: String,
    pub color: Color,
    pub size: f32,
    pub bold: bool,
    pub effect: TextEffect,
}

impl TextSpec {
    /// Decoration defaults: 50 px bold with a drop shadow, or a glow when
    /// `neon` is set.
    pub fn decoration(text: impl Into<String>, color: Color, neon: bool) -> Self {
        Self {
            text: text.into(),
            color,
            size: 50.0,
            bold: true,
            effect: if neon {
                TextEffect::Neon
            } else {
                TextEffect::Shadow
            },
        }
    }
}

/// Shared font handle.
#[derive(Clone)]
pub struct TextRenderer {
    font: Arc<FontArc>,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer").finish_non_exhaustive()
    }
}

impl TextRenderer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(bytes).map_err(|e| Error::Font(e.to_string()))?;
        Ok(Self {
            font: Arc::new(font),
        })
    }

    /// Load a TTF/OTF file, or fall back to the proportional font bundled
    /// with egui when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                log::info!("Loading font {}", path.display());
                Self::from_bytes(std::fs::read(path)?)
            }
            None => Self::builtin(),
        }
    }

    pub fn builtin() -> Result<Self> {
        let defs = egui::FontDefinitions::default();
        let data = defs
            .font_data
            .get("Ubuntu-Light")
            .or_else(|| defs.font_data.values().next())
            .ok_or_else(|| Error::Font("no bundled font available".into()))?;
        Self::from_bytes(data.font.to_vec())
    }

    /// Rasterise `spec`. The bitmap includes a margin for the effect.
    pub fn render(&self, spec: &TextSpec) -> RgbaImage {
        let scale = PxScale::from(spec.size.max(1.0));
        let text = if spec.text.is_empty() { " " } else { &spec.text };
        let (tw, th) = imageproc::drawing::text_size(scale, self.font.as_ref(), text);
        let margin = match spec.effect {
            TextEffect::None => 2,
            TextEffect::Shadow => 8,
            TextEffect::Neon => 24,
        };
        let bold_extra = u32::from(spec.bold) * (spec.size / 25.0).ceil() as u32;
        let w = tw + bold_extra + margin * 2;
        let h = th + margin * 2;

        let mut coverage = GrayImage::new(w, h);
        let strokes = if spec.bold { bold_extra + 1 } else { 1 };
        for dx in 0..strokes {
            imageproc::drawing::draw_text_mut(
                &mut coverage,
                Luma([255]),
                (margin + dx) as i32,
                margin as i32,
                scale,
                self.font.as_ref(),
                text,
            );
        }

        let mut out = RgbaImage::new(w, h);
        match spec.effect {
            TextEffect::None => {}
            TextEffect::Shadow => {
                let blurred = imageops::blur(&coverage, 2.5);
                let shadow = colorize(&blurred, Color::BLACK, 0.3);
                imageops::overlay(&mut out, &shadow, 2, 2);
            }
            TextEffect::Neon => {
                let blurred = imageops::blur(&coverage, 10.0);
                let glow = colorize(&blurred, spec.color, 1.0);
                imageops::overlay(&mut out, &glow, 0, 0);
                imageops::overlay(&mut out, &glow, 0, 0);
            }
        }
        imageops::overlay(&mut out, &colorize(&coverage, spec.color, 1.0), 0, 0);
        out
    }
}

fn colorize(coverage: &GrayImage, color: Color, opacity: f32) -> RgbaImage {
    RgbaImage::from_fn(coverage.width(), coverage.height(), |x, y| {
        let cov = coverage.get_pixel(x, y)[0] as f32 / 255.0;
        let a = (cov * opacity * color.a as f32).round().clamp(0.0, 255.0) as u8;
        Rgba([color.r, color.g, color.b, a])
    })
}
