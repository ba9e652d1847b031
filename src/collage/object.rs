//! Objects held by the collage surface.

use super::text::TextSpec;
use crate::filters::StyleFilter;
use crate::layout::Point;
use image::RgbaImage;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Placement of an object. Rotation and scaling pivot on `center`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub center: Point,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Clockwise, in degrees.
    pub angle: f32,
    pub flip_x: bool,
}

impl Transform {
    pub fn at(center: Point, scale: f32) -> Self {
        Self {
            center,
            scale_x: scale,
            scale_y: scale,
            angle: 0.0,
            flip_x: false,
        }
    }
}

/// Interactive handles attached to an object when it is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controls {
    pub delete: bool,
    pub resize: bool,
    pub rotate: bool,
}

impl Controls {
    /// Free decorations get the full set, including the delete handle.
    pub const DECORATION: Controls = Controls {
        delete: true,
        resize: true,
        rotate: true,
    };
    pub const NONE: Controls = Controls {
        delete: false,
        resize: false,
        rotate: false,
    };

    pub fn any(&self) -> bool {
        self.delete || self.resize || self.rotate
    }
}

/// Handle kinds, for hit-testing and drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Delete,
    Resize,
    Rotate,
}

/// Offsets of the handles from the object's top-right / bottom-right /
/// top-centre corners, and their hit radius.
pub const DELETE_OFFSET: (f32, f32) = (16.0, 16.0);
pub const ROTATE_OFFSET: f32 = 30.0;
pub const CONTROL_RADIUS: f32 = 12.0;

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    /// Collage title; never selectable.
    Title,
    /// Captured photo bound to a layout slot.
    Photo { slot: usize },
    Sticker,
    Text(TextSpec),
}

impl ObjectKind {
    pub fn is_photo(&self) -> bool {
        matches!(self, ObjectKind::Photo { .. })
    }

    pub fn is_decoration(&self) -> bool {
        matches!(self, ObjectKind::Sticker | ObjectKind::Text(_))
    }
}

/// Pixels of an image object.
#[derive(Clone, Debug)]
pub struct ImageContent {
    /// Unfiltered pixels currently shown (a cut-out after background removal).
    pub base: Arc<RgbaImage>,
    /// Pixels before background removal, kept so the removal can be undone.
    pub original: Option<Arc<RgbaImage>>,
    pub style: StyleFilter,
}

#[derive(Clone, Debug)]
pub struct SurfaceObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub transform: Transform,
    pub controls: Controls,
    pub selectable: bool,
    pub(crate) image: Option<ImageContent>,
    pub(crate) bitmap: Arc<RgbaImage>,
    /// Bumped whenever `bitmap` changes.
    pub(crate) revision: u64,
}

impl SurfaceObject {
    pub fn bitmap(&self) -> &Arc<RgbaImage> {
        &self.bitmap
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn image(&self) -> Option<&ImageContent> {
        self.image.as_ref()
    }

    pub fn has_original(&self) -> bool {
        self.image.as_ref().is_some_and(|i| i.original.is_some())
    }

    pub fn slot(&self) -> Option<usize> {
        match self.kind {
            ObjectKind::Photo { slot } => Some(slot),
            _ => None,
        }
    }

    /// Displayed width and height.
    pub fn size(&self) -> (f32, f32) {
        (
            self.bitmap.width() as f32 * self.transform.scale_x.abs(),
            self.bitmap.height() as f32 * self.transform.scale_y.abs(),
        )
    }

    /// Top-left of the unrotated box.
    pub fn top_left(&self) -> Point {
        let (w, h) = self.size();
        Point::new(
            self.transform.center.x - w / 2.0,
            self.transform.center.y - h / 2.0,
        )
    }

    /// Move so the unrotated box starts at `p`.
    pub fn set_top_left(&mut self, p: Point) {
        let (w, h) = self.size();
        self.transform.center = Point::new(p.x + w / 2.0, p.y + h / 2.0);
    }

    /// Canvas point → object-local point (origin at centre, unrotated).
    pub fn to_local(&self, p: Point) -> Point {
        let (sin, cos) = self.transform.angle.to_radians().sin_cos();
        let dx = p.x - self.transform.center.x;
        let dy = p.y - self.transform.center.y;
        Point::new(dx * cos + dy * sin, -dx * sin + dy * cos)
    }

    /// Object-local point → canvas point.
    pub fn to_canvas(&self, local: Point) -> Point {
        let (sin, cos) = self.transform.angle.to_radians().sin_cos();
        Point::new(
            self.transform.center.x + local.x * cos - local.y * sin,
            self.transform.center.y + local.x * sin + local.y * cos,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        let (w, h) = self.size();
        let l = self.to_local(p);
        l.x.abs() <= w / 2.0 && l.y.abs() <= h / 2.0
    }

    /// Corners in canvas space, clockwise from top-left.
    pub fn corners(&self) -> [Point; 4] {
        let (w, h) = self.size();
        let (hw, hh) = (w / 2.0, h / 2.0);
        [
            self.to_canvas(Point::new(-hw, -hh)),
            self.to_canvas(Point::new(hw, -hh)),
            self.to_canvas(Point::new(hw, hh)),
            self.to_canvas(Point::new(-hw, hh)),
        ]
    }

    /// Canvas position of `control`, if the object carries it.
    pub fn control_position(&self, control: Control) -> Option<Point> {
        let (w, h) = self.size();
        let (hw, hh) = (w / 2.0, h / 2.0);
        let local = match control {
            Control::Delete if self.controls.delete => {
                Point::new(hw + DELETE_OFFSET.0, -hh + DELETE_OFFSET.1)
            }
            Control::Resize if self.controls.resize => Point::new(hw, hh),
            Control::Rotate if self.controls.rotate => Point::new(0.0, -hh - ROTATE_OFFSET),
            _ => return None,
        };
        Some(self.to_canvas(local))
    }

    pub fn control_at(&self, p: Point) -> Option<Control> {
        [Control::Delete, Control::Rotate, Control::Resize]
            .into_iter()
            .find(|&c| {
                self.control_position(c)
                    .is_some_and(|pos| pos.distance_sq(p) <= CONTROL_RADIUS * CONTROL_RADIUS)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(angle: f32) -> SurfaceObject {
        SurfaceObject {
            id: ObjectId(1),
            kind: ObjectKind::Sticker,
            transform: Transform {
                angle,
                ..Transform::at(Point::new(100.0, 100.0), 0.5)
            },
            controls: Controls::DECORATION,
            selectable: true,
            image: None,
            bitmap: Arc::new(RgbaImage::new(200, 100)),
            revision: 0,
        }
    }

    #[test]
    fn size_and_box_follow_scale() {
        let o = object(0.0);
        assert_eq!(o.size(), (100.0, 50.0));
        assert_eq!(o.top_left(), Point::new(50.0, 75.0));
        assert!(o.contains(Point::new(149.0, 124.0)));
        assert!(!o.contains(Point::new(151.0, 100.0)));
    }

    #[test]
    fn rotation_turns_the_hit_box() {
        let o = object(90.0);
        // Rotated a quarter turn the 100×50 box becomes 50×100.
        assert!(o.contains(Point::new(100.0, 145.0)));
        assert!(!o.contains(Point::new(145.0, 100.0)));
        let back = o.to_local(o.to_canvas(Point::new(12.0, -7.0)));
        assert!((back.x - 12.0).abs() < 1e-3 && (back.y + 7.0).abs() < 1e-3);
    }

    #[test]
    fn delete_handle_sits_off_the_top_right_corner() {
        let o = object(0.0);
        let pos = o.control_position(Control::Delete).unwrap();
        assert_eq!(pos, Point::new(166.0, 91.0));
        assert_eq!(o.control_at(Point::new(168.0, 93.0)), Some(Control::Delete));
        assert_eq!(o.control_at(Point::new(150.0, 125.0)), Some(Control::Resize));
        assert_eq!(o.control_at(Point::new(100.0, 45.0)), Some(Control::Rotate));
    }

    #[test]
    fn photos_have_no_handles() {
        let mut o = object(0.0);
        o.kind = ObjectKind::Photo { slot: 2 };
        o.controls = Controls::NONE;
        assert_eq!(o.control_position(Control::Delete), None);
        assert_eq!(o.control_at(Point::new(166.0, 91.0)), None);
        assert_eq!(o.slot(), Some(2));
    }
}
