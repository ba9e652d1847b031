//! Flattening the surface into a single bitmap.

use super::{Collage, SurfaceObject};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Object pixels after flip, scale and rotation, with the canvas position of
/// the result's top-left corner.
pub fn rasterize(obj: &SurfaceObject) -> (RgbaImage, i64, i64) {
    let (w, h) = obj.size();
    let (w, h) = (w.round().max(1.0) as u32, h.round().max(1.0) as u32);

    let mut img = if (w, h) == obj.bitmap.dimensions() {
        obj.bitmap.as_ref().clone()
    } else {
        imageops::resize(obj.bitmap.as_ref(), w, h, FilterType::Triangle)
    };
    if obj.transform.flip_x {
        imageops::flip_horizontal_in_place(&mut img);
    }

    let angle = obj.transform.angle.rem_euclid(360.0);
    if angle != 0.0 {
        // Pad to the diagonal so the corners survive the turn.
        let side = ((w as f32).hypot(h as f32)).ceil() as u32;
        let mut square = RgbaImage::new(side, side);
        imageops::overlay(
            &mut square,
            &img,
            i64::from((side - w) / 2),
            i64::from((side - h) / 2),
        );
        img = rotate_about_center(
            &square,
            angle.to_radians(),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        );
    }

    let c = obj.transform.center;
    let x = (c.x - img.width() as f32 / 2.0).round() as i64;
    let y = (c.y - img.height() as f32 / 2.0).round() as i64;
    (img, x, y)
}

/// Theme background plus every object, in stacking order.
pub fn flatten(collage: &Collage) -> RgbaImage {
    let layout = collage.layout();
    let mut canvas = RgbaImage::from_pixel(
        layout.canvas_width.round() as u32,
        layout.canvas_height.round() as u32,
        collage.theme().background.to_rgba(),
    );
    for obj in collage.objects() {
        let (img, x, y) = rasterize(obj);
        imageops::overlay(&mut canvas, &img, x, y);
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collage::{CollageOptions, TextRenderer};
    use crate::layout::LayoutMode;

    fn collage() -> Collage {
        let mut c = Collage::new(CollageOptions::default(), TextRenderer::builtin().unwrap());
        let colours = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];
        c.install_photos(
            colours
                .iter()
                .map(|[r, g, b]| Some(RgbaImage::from_pixel(80, 60, Rgba([*r, *g, *b, 255]))))
                .collect(),
        );
        c
    }

    #[test]
    fn photos_land_in_their_slots() {
        let c = collage();
        let out = flatten(&c);
        assert_eq!(out.dimensions(), (865, 735));
        assert_eq!(out.get_pixel(225, 245), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(640, 245), &Rgba([0, 255, 0, 255]));
        assert_eq!(out.get_pixel(225, 560), &Rgba([0, 0, 255, 255]));
        assert_eq!(out.get_pixel(640, 560), &Rgba([255, 255, 0, 255]));
        // Padding shows the theme background.
        let bg = c.theme().background.to_rgba();
        assert_eq!(out.get_pixel(5, 670), &bg);
    }

    #[test]
    fn vertical_strip_has_its_own_canvas() {
        let mut c = collage();
        c.set_layout(LayoutMode::Vertical);
        let out = flatten(&c);
        assert_eq!(out.dimensions(), (450, 1365));
        assert_eq!(out.get_pixel(225, 560), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn flip_mirrors_columns() {
        let mut c = Collage::new(CollageOptions::default(), TextRenderer::builtin().unwrap());
        let half = RgbaImage::from_fn(80, 60, |x, _| {
            if x < 40 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        c.install_photos(vec![Some(half)]);
        let id = c.slots().occupant(0).unwrap();
        c.select(Some(id));
        c.flip_selected().unwrap();
        let (img, x, y) = rasterize(c.object(id).unwrap());
        assert_eq!((x, y), (25, 95));
        assert_eq!(img.get_pixel(10, 150)[2], 255);
        assert_eq!(img.get_pixel(390, 150)[0], 255);
    }

    #[test]
    fn rotation_keeps_the_centre() {
        let mut c = collage();
        let id = c.add_sticker(RgbaImage::from_pixel(100, 40, Rgba([9, 9, 9, 255])));
        let before = c.object(id).unwrap().transform.center;
        let obj = c.object(id).unwrap().clone();
        let mut turned = obj.clone();
        turned.transform.angle = 45.0;
        let (img, x, y) = rasterize(&turned);
        let cx = x as f32 + img.width() as f32 / 2.0;
        let cy = y as f32 + img.height() as f32 / 2.0;
        assert!((cx - before.x).abs() <= 1.0 && (cy - before.y).abs() <= 1.0);
        assert!(img.width() > obj.size().0 as u32);
    }
}
