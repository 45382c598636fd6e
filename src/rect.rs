//! Pixel-space geometry shared by the layer store and the undo capture.

/// A rectangle defined in pixel coordinates.
///
/// Used for dirty regions and for the extent of captured pixel patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RectPx {
    /// X offset from the left edge of the canvas
    pub x: u32,
    /// Y offset from the top edge of the canvas
    pub y: u32,
    /// Width of the rectangle
    pub width: u32,
    /// Height of the rectangle
    pub height: u32,
}

impl RectPx {
    /// Creates a new rectangle with the given position and dimensions.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates a rectangle starting at origin (0, 0) with the given dimensions.
    pub fn from_size(size: SizePx) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Returns true if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Smallest rectangle containing both. Empty rectangles are ignored.
    pub fn union(&self, other: &RectPx) -> RectPx {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        RectPx::new(x, y, right - x, bottom - y)
    }

    /// Overlap of both rectangles, or `None` if they are disjoint.
    pub fn intersect(&self, other: &RectPx) -> Option<RectPx> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(RectPx::new(x, y, right - x, bottom - y))
    }

    /// Clips the rectangle to a canvas of the given size.
    pub fn clip_to(&self, size: SizePx) -> Option<RectPx> {
        self.intersect(&RectPx::from_size(size))
    }

    /// Bounding box of a circle, clipped to a canvas of `size`.
    ///
    /// Clipping happens before the conversion to pixels, so centers far off
    /// the canvas (or not finite at all) give `None`.
    pub(crate) fn around(cx: f32, cy: f32, radius: f32, size: SizePx) -> Option<RectPx> {
        if !(cx.is_finite() && cy.is_finite() && radius.is_finite()) {
            return None;
        }
        let x0 = (cx - radius).floor().max(0.0);
        let y0 = (cy - radius).floor().max(0.0);
        let x1 = (cx + radius).ceil().min(size.width as f32);
        let y1 = (cy + radius).ceil().min(size.height as f32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(RectPx::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }
}

/// A 2D size in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SizePx {
    pub width: u32,
    pub height: u32,
}

impl SizePx {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
