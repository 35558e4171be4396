//! Bounding-box geometry: points, boxes, and resize handles.
//!
//! All coordinates are double-precision image-pixel values. Precision is
//! never truncated here; rounding is an export-time concern.

use serde::{Deserialize, Serialize};

/// Default minimum width/height for a valid bounding box, in pixels.
pub const DEFAULT_MIN_BOX_SIZE: f64 = 3.0;

/// Hit radius for grabbing a resize handle (in image pixels).
pub const HANDLE_HIT_RADIUS: f64 = 8.0;

/// A point in image-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One of the eight resize handles of a bounding box, by compass position.
///
/// North is the top edge (y_min side, image coordinates grow downward).
/// Corner handles move two coordinates, edge handles one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Handle {
    /// All eight handles, corners first so hit-testing prefers them on ties.
    pub const fn all() -> [Handle; 8] {
        [
            Handle::NorthWest,
            Handle::NorthEast,
            Handle::SouthWest,
            Handle::SouthEast,
            Handle::North,
            Handle::East,
            Handle::South,
            Handle::West,
        ]
    }

    /// Whether dragging this handle moves the left edge (x_min).
    pub const fn touches_x_min(self) -> bool {
        matches!(self, Handle::West | Handle::NorthWest | Handle::SouthWest)
    }

    /// Whether dragging this handle moves the right edge (x_max).
    pub const fn touches_x_max(self) -> bool {
        matches!(self, Handle::East | Handle::NorthEast | Handle::SouthEast)
    }

    /// Whether dragging this handle moves the top edge (y_min).
    pub const fn touches_y_min(self) -> bool {
        matches!(self, Handle::North | Handle::NorthWest | Handle::NorthEast)
    }

    /// Whether dragging this handle moves the bottom edge (y_max).
    pub const fn touches_y_max(self) -> bool {
        matches!(self, Handle::South | Handle::SouthWest | Handle::SouthEast)
    }

    /// Short compass name for logging.
    pub const fn name(self) -> &'static str {
        match self {
            Handle::North => "N",
            Handle::NorthEast => "NE",
            Handle::East => "E",
            Handle::SouthEast => "SE",
            Handle::South => "S",
            Handle::SouthWest => "SW",
            Handle::West => "W",
            Handle::NorthWest => "NW",
        }
    }
}

/// An axis-aligned bounding box in image-pixel coordinates.
///
/// Stored as the two extreme corners. A well-formed box satisfies
/// `x_min < x_max` and `y_min < y_max` and lies within its image; the
/// struct itself does not enforce this so that in-progress edits can be
/// represented. [`BoundingBox::is_ordered`] and [`BoundingBox::fits_within`]
/// check the invariants explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Create a box from explicit extents.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Create a normalized box from two opposite corners in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x_min: a.x.min(b.x),
            y_min: a.y.min(b.y),
            x_max: a.x.max(b.x),
            y_max: a.y.max(b.y),
        }
    }

    /// Box width.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Box height.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Box area.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point of the box.
    pub fn center(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Check if a point lies inside the box (inclusive edges).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    /// All four coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x_min.is_finite()
            && self.y_min.is_finite()
            && self.x_max.is_finite()
            && self.y_max.is_finite()
    }

    /// Extents are strictly ordered (positive width and height).
    pub fn is_ordered(&self) -> bool {
        self.x_min < self.x_max && self.y_min < self.y_max
    }

    /// Both dimensions meet the minimum size.
    pub fn meets_min_size(&self, min_size: f64) -> bool {
        self.width() >= min_size && self.height() >= min_size
    }

    /// The box lies within an image of the given dimensions.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.x_min >= 0.0
            && self.y_min >= 0.0
            && self.x_max <= f64::from(image_width)
            && self.y_max <= f64::from(image_height)
    }

    /// Clamp all four coordinates into the image rectangle.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Self {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        Self {
            x_min: self.x_min.clamp(0.0, w),
            y_min: self.y_min.clamp(0.0, h),
            x_max: self.x_max.clamp(0.0, w),
            y_max: self.y_max.clamp(0.0, h),
        }
    }

    /// Translate the box by a delta without any clamping.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x_min: self.x_min + dx,
            y_min: self.y_min + dy,
            x_max: self.x_max + dx,
            y_max: self.y_max + dy,
        }
    }

    /// Translate the box, shifting (not shrinking) so it stays inside the
    /// image. The effective delta is reduced when the requested one would
    /// push an edge outside.
    pub fn translate_clamped(&self, dx: f64, dy: f64, image_width: u32, image_height: u32) -> Self {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        let dx = dx.clamp(-self.x_min, w - self.x_max);
        let dy = dy.clamp(-self.y_min, h - self.y_max);
        self.translate(dx, dy)
    }

    /// Resize by dragging one handle by a cumulative pointer delta.
    ///
    /// Applied in order: touched coordinates get the delta, are clamped to
    /// the image rectangle, then pulled back so neither dimension drops
    /// below `min_size` (a handle cannot cross the opposite edge).
    /// Untouched coordinates are left exactly as they were.
    pub fn resized(
        &self,
        handle: Handle,
        dx: f64,
        dy: f64,
        image_width: u32,
        image_height: u32,
        min_size: f64,
    ) -> Self {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        let mut out = *self;

        if handle.touches_x_min() {
            let x = (self.x_min + dx).clamp(0.0, w);
            out.x_min = x.min(self.x_max - min_size);
        }
        if handle.touches_x_max() {
            let x = (self.x_max + dx).clamp(0.0, w);
            out.x_max = x.max(self.x_min + min_size);
        }
        if handle.touches_y_min() {
            let y = (self.y_min + dy).clamp(0.0, h);
            out.y_min = y.min(self.y_max - min_size);
        }
        if handle.touches_y_max() {
            let y = (self.y_max + dy).clamp(0.0, h);
            out.y_max = y.max(self.y_min + min_size);
        }

        out
    }

    /// Position of a resize handle on the box outline.
    pub fn handle_position(&self, handle: Handle) -> Point {
        let cx = (self.x_min + self.x_max) / 2.0;
        let cy = (self.y_min + self.y_max) / 2.0;
        match handle {
            Handle::North => Point::new(cx, self.y_min),
            Handle::NorthEast => Point::new(self.x_max, self.y_min),
            Handle::East => Point::new(self.x_max, cy),
            Handle::SouthEast => Point::new(self.x_max, self.y_max),
            Handle::South => Point::new(cx, self.y_max),
            Handle::SouthWest => Point::new(self.x_min, self.y_max),
            Handle::West => Point::new(self.x_min, cy),
            Handle::NorthWest => Point::new(self.x_min, self.y_min),
        }
    }

    /// Find the handle under a pointer position, if any.
    ///
    /// Returns the nearest handle within `radius`; corners win ties with
    /// edge midpoints because they come first in [`Handle::all`].
    pub fn hit_test_handle(&self, pos: Point, radius: f64) -> Option<Handle> {
        let mut best: Option<(Handle, f64)> = None;
        for handle in Handle::all() {
            let dist = self.handle_position(handle).distance_to(&pos);
            if dist <= radius && best.map_or(true, |(_, d)| dist < d) {
                best = Some((handle, dist));
            }
        }
        best.map(|(handle, _)| handle)
    }
}
