//! Collage layouts: canvas size and the four slot positions per mode.
//!
//! Layouts are pure lookup tables derived from [`LayoutMetrics`]. Slot index
//! `i` always corresponds to `positions[i]`, whatever the mode, so switching
//! modes moves photos without changing which slot they occupy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of slots in every layout.
pub const SLOT_COUNT: usize = 4;

/// A point in canvas pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Axis-aligned rectangle, half-open on the right and bottom edges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }

    /// Grow by `amount` on every side.
    pub fn inflate(&self, amount: f32) -> Rect {
        Rect {
            left: self.left - amount,
            top: self.top - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }
}

/// Named arrangement of the four slots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// 2×2 matrix.
    #[default]
    Grid,
    /// Single column strip.
    Vertical,
}

impl LayoutMode {
    pub const ALL: [LayoutMode; 2] = [LayoutMode::Grid, LayoutMode::Vertical];

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutMode::Grid => "grid",
            LayoutMode::Vertical => "vertical",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            LayoutMode::Grid => LayoutMode::Vertical,
            LayoutMode::Vertical => LayoutMode::Grid,
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" | "2x2" => Ok(LayoutMode::Grid),
            "vertical" | "strip" => Ok(LayoutMode::Vertical),
            other => Err(format!("unknown layout '{other}' (expected grid or vertical)")),
        }
    }
}

/// Constants every layout is computed from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    pub photo_width: f32,
    pub photo_height: f32,
    /// Outer border around the whole collage.
    pub padding: f32,
    /// Space between neighbouring photos.
    pub gap: f32,
    /// Band above the photos reserved for the title.
    pub header_height: f32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            photo_width: 400.0,
            photo_height: 300.0,
            padding: 25.0,
            gap: 15.0,
            header_height: 70.0,
        }
    }
}

/// Resolved layout for one mode.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layout {
    pub mode: LayoutMode,
    pub canvas_width: f32,
    pub canvas_height: f32,
    /// Top-left corner of each slot, indexed by slot.
    pub positions: [Point; SLOT_COUNT],
    #[serde(skip)]
    pub metrics: LayoutMetrics,
}

impl Layout {
    /// Canonical rectangle of slot `index`.
    pub fn slot_rect(&self, index: usize) -> Rect {
        let pos = self.positions[index];
        Rect {
            left: pos.x,
            top: pos.y,
            width: self.metrics.photo_width,
            height: self.metrics.photo_height,
        }
    }

    /// Drop target of slot `index`: the slot rectangle grown by half the gap.
    pub fn hit_rect(&self, index: usize) -> Rect {
        self.slot_rect(index).inflate(self.metrics.gap / 2.0)
    }

    /// Centre of the title band.
    pub fn title_anchor(&self) -> Point {
        Point::new(
            self.canvas_width / 2.0,
            self.metrics.padding + self.metrics.header_height / 2.0,
        )
    }
}

/// Compute canvas size and slot positions for `mode`.
pub fn compute_layout(mode: LayoutMode, m: &LayoutMetrics) -> Layout {
    let start_x = m.padding;
    let start_y = m.padding + m.header_height;
    let step_x = m.photo_width + m.gap;
    let step_y = m.photo_height + m.gap;

    let (canvas_width, canvas_height, positions) = match mode {
        LayoutMode::Grid => (
            m.padding * 2.0 + m.photo_width * 2.0 + m.gap,
            m.padding * 2.0 + m.header_height + m.photo_height * 2.0 + m.gap,
            [
                Point::new(start_x, start_y),
                Point::new(start_x + step_x, start_y),
                Point::new(start_x, start_y + step_y),
                Point::new(start_x + step_x, start_y + step_y),
            ],
        ),
        LayoutMode::Vertical => (
            m.padding * 2.0 + m.photo_width,
            m.padding * 2.0 + m.header_height + m.photo_height * 4.0 + m.gap * 3.0,
            [
                Point::new(start_x, start_y),
                Point::new(start_x, start_y + step_y),
                Point::new(start_x, start_y + step_y * 2.0),
                Point::new(start_x, start_y + step_y * 3.0),
            ],
        ),
    };

    Layout {
        mode,
        canvas_width,
        canvas_height,
        positions,
        metrics: *m,
    }
}
