//! Photo style filters.
//!
//! Each style is a fixed recipe of per-pixel operations applied to an RGBA
//! buffer. Alpha is never changed, so filtered cut-outs stay cut out.

use crate::color::Color;
use image::{Rgba, RgbaImage};

/// Named style recipes offered in the editor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StyleFilter {
    /// No filter.
    #[default]
    Original,
    /// Paints the image over with the theme background, leaving its shape.
    Sketchbook,
    /// Pencil outline on white.
    Sketch,
    /// Contrasty black and white.
    Noir,
    /// Faded sepia with grain.
    Vintage,
    /// Sharpened, punchy colours.
    Cartoon,
    /// 8-bit mosaic.
    Pixel,
}

impl StyleFilter {
    pub const ALL: [StyleFilter; 7] = [
        StyleFilter::Original,
        StyleFilter::Sketchbook,
        StyleFilter::Sketch,
        StyleFilter::Noir,
        StyleFilter::Vintage,
        StyleFilter::Cartoon,
        StyleFilter::Pixel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StyleFilter::Original => "Original",
            StyleFilter::Sketchbook => "Sketchbook",
            StyleFilter::Sketch => "Sketch",
            StyleFilter::Noir => "Noir",
            StyleFilter::Vintage => "Retro",
            StyleFilter::Cartoon => "Cartoon",
            StyleFilter::Pixel => "Pixel",
        }
    }

    /// Filtered copy of `src`. `background` feeds the sketchbook tint.
    pub fn apply(self, src: &RgbaImage, background: Color) -> RgbaImage {
        let mut img = src.clone();
        match self {
            StyleFilter::Original => {}
            StyleFilter::Sketchbook => tint(&mut img, background, 1.0),
            StyleFilter::Sketch => {
                grayscale(&mut img);
                contrast(&mut img, 0.4);
                img = convolve3(&img, &EDGE_DETECT);
                brightness(&mut img, 0.2);
                invert(&mut img);
            }
            StyleFilter::Noir => {
                grayscale(&mut img);
                contrast(&mut img, 0.3);
                brightness(&mut img, -0.1);
            }
            StyleFilter::Vintage => {
                sepia(&mut img);
                noise(&mut img, 50.0);
                contrast(&mut img, -0.15);
                brightness(&mut img, 0.1);
            }
            StyleFilter::Cartoon => {
                img = convolve3(&img, &SHARPEN);
                saturation(&mut img, 0.7);
                contrast(&mut img, 0.15);
            }
            StyleFilter::Pixel => {
                pixelate(&mut img, 8);
                saturation(&mut img, 0.5);
            }
        }
        img
    }
}

const EDGE_DETECT: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
const SHARPEN: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn map_rgb(img: &mut RgbaImage, f: impl Fn(f32) -> f32) {
    for px in img.pixels_mut() {
        for c in 0..3 {
            px[c] = clamp_u8(f(px[c] as f32));
        }
    }
}

/// Average of the three channels.
pub fn grayscale(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let avg = (px[0] as u32 + px[1] as u32 + px[2] as u32) / 3;
        let v = avg as u8;
        px[0] = v;
        px[1] = v;
        px[2] = v;
    }
}

/// `amount` in -1..=1; 0 leaves the image unchanged.
pub fn contrast(img: &mut RgbaImage, amount: f32) {
    let c = (amount * 255.0).floor();
    let factor = 259.0 * (c + 255.0) / (255.0 * (259.0 - c));
    map_rgb(img, |v| factor * (v - 128.0) + 128.0);
}

/// `amount` in -1..=1, as a fraction of full scale.
pub fn brightness(img: &mut RgbaImage, amount: f32) {
    let delta = (amount * 255.0).round();
    map_rgb(img, |v| v + delta);
}

pub fn invert(img: &mut RgbaImage) {
    map_rgb(img, |v| 255.0 - v);
}

pub fn sepia(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        px[0] = clamp_u8(r * 0.393 + g * 0.769 + b * 0.189);
        px[1] = clamp_u8(r * 0.349 + g * 0.686 + b * 0.168);
        px[2] = clamp_u8(r * 0.272 + g * 0.534 + b * 0.131);
    }
}

/// Grain of up to ±`amount`/2 per pixel. Deterministic per position so
/// re-rendering the same image gives the same result.
pub fn noise(img: &mut RgbaImage, amount: f32) {
    for (x, y, px) in img.enumerate_pixels_mut() {
        let n = (hash01(x, y) - 0.5) * amount;
        for c in 0..3 {
            px[c] = clamp_u8(px[c] as f32 + n);
        }
    }
}

fn hash01(x: u32, y: u32) -> f32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    (h & 0xFFFF) as f32 / 65535.0
}

/// Push each channel away from (positive) or towards (negative) the
/// brightest channel of the pixel.
pub fn saturation(img: &mut RgbaImage, amount: f32) {
    let adjust = -amount;
    for px in img.pixels_mut() {
        let max = px[0].max(px[1]).max(px[2]) as f32;
        for c in 0..3 {
            let v = px[c] as f32;
            if v != max {
                px[c] = clamp_u8(v + (max - v) * adjust);
            }
        }
    }
}

/// Fill each `block`×`block` cell with its top-left pixel.
pub fn pixelate(img: &mut RgbaImage, block: u32) {
    let block = block.max(1);
    let (w, h) = img.dimensions();
    for by in (0..h).step_by(block as usize) {
        for bx in (0..w).step_by(block as usize) {
            let src = *img.get_pixel(bx, by);
            for y in by..(by + block).min(h) {
                for x in bx..(bx + block).min(w) {
                    let alpha = img.get_pixel(x, y)[3];
                    img.put_pixel(x, y, Rgba([src[0], src[1], src[2], alpha]));
                }
            }
        }
    }
}

/// Blend towards `color` by `alpha` (1.0 replaces the colour entirely).
pub fn tint(img: &mut RgbaImage, color: Color, alpha: f32) {
    let target = [color.r as f32, color.g as f32, color.b as f32];
    for px in img.pixels_mut() {
        for c in 0..3 {
            let v = px[c] as f32;
            px[c] = clamp_u8(v + (target[c] - v) * alpha);
        }
    }
}

/// 3×3 convolution over RGB, alpha kept from `src`.
///
/// `filter3x3` only writes the interior, so the one-pixel border repeats its
/// nearest interior neighbour. Images under 3×3 are returned unchanged.
pub fn convolve3(src: &RgbaImage, kernel: &[f32; 9]) -> RgbaImage {
    let (w, h) = src.dimensions();
    if w < 3 || h < 3 {
        return src.clone();
    }
    let filtered: RgbaImage = image::imageops::filter3x3(src, kernel);
    RgbaImage::from_fn(w, h, |x, y| {
        let inner = filtered.get_pixel(x.clamp(1, w - 2), y.clamp(1, h - 2));
        Rgba([inner[0], inner[1], inner[2], src.get_pixel(x, y)[3]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([(x * 16) as u8, (y * 16) as u8, 90, (x * 8 + 100) as u8])
        })
    }

    #[test]
    fn original_is_identity() {
        let img = gradient();
        assert_eq!(StyleFilter::Original.apply(&img, Color::WHITE), img);
    }

    #[test]
    fn every_style_preserves_alpha_and_size() {
        let img = gradient();
        for style in StyleFilter::ALL {
            let out = style.apply(&img, Color::rgb(1, 2, 3));
            assert_eq!(out.dimensions(), img.dimensions(), "{style:?}");
            for (a, b) in img.pixels().zip(out.pixels()) {
                assert_eq!(a[3], b[3], "{style:?} changed alpha");
            }
        }
    }

    #[test]
    fn sketchbook_paints_with_background() {
        let bg = Color::from_hex("#fce7f3").unwrap();
        let out = StyleFilter::Sketchbook.apply(&gradient(), bg);
        assert!(out
            .pixels()
            .all(|p| p[0] == bg.r && p[1] == bg.g && p[2] == bg.b));
    }

    #[test]
    fn noir_is_monochrome() {
        let out = StyleFilter::Noir.apply(&gradient(), Color::WHITE);
        assert!(out.pixels().all(|p| p[0] == p[1] && p[1] == p[2]));
    }

    #[test]
    fn sketch_of_flat_image_is_white() {
        let flat = RgbaImage::from_pixel(8, 8, Rgba([120, 60, 30, 255]));
        let out = StyleFilter::Sketch.apply(&flat, Color::WHITE);
        // No edges inside a flat area: interior pixels invert to near white.
        assert!(out.get_pixel(4, 4)[0] > 200);
    }

    #[test]
    fn convolve3_keeps_alpha_and_fills_the_border() {
        let img = gradient();
        let identity = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let same = convolve3(&img, &identity);
        assert_eq!(same.get_pixel(5, 5), img.get_pixel(5, 5));
        // Border pixels take the colour of the nearest interior pixel.
        assert_eq!(same.get_pixel(0, 0)[0], img.get_pixel(1, 1)[0]);
        assert_eq!(same.get_pixel(0, 0)[3], img.get_pixel(0, 0)[3]);

        let flat = RgbaImage::from_pixel(6, 6, Rgba([90, 90, 90, 40]));
        let edges = convolve3(&flat, &EDGE_DETECT);
        assert!(edges.pixels().all(|p| p[0] == 0 && p[3] == 40));

        let tiny = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        assert_eq!(convolve3(&tiny, &SHARPEN), tiny);
    }

    #[test]
    fn contrast_zero_changes_nothing() {
        let mut img = gradient();
        contrast(&mut img, 0.0);
        assert_eq!(img, gradient());
    }

    #[test]
    fn pixelate_copies_block_origin() {
        let mut img = gradient();
        pixelate(&mut img, 8);
        assert_eq!(img.get_pixel(7, 7)[0], 0);
        assert_eq!(img.get_pixel(9, 3)[0], 128);
    }

    #[test]
    fn noise_is_deterministic() {
        let mut a = gradient();
        let mut b = gradient();
        noise(&mut a, 50.0);
        noise(&mut b, 50.0);
        assert_eq!(a, b);
    }
}
