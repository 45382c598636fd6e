//! Stroke traversal: turns stroke points into evenly spaced dabs.
//!
//! Points are joined by straight segments. The smoothing flag is carried so
//! journals round-trip, but curves are not fitted.

use super::Engine;
use crate::error::{InvariantViolation, Result};
use crate::layer::{Dab, LayerStore};
use crate::rect::{RectPx, SizePx};

/// State of the stroke in progress.
#[derive(Debug, Clone)]
pub(super) struct Stroke {
    layer: u32,
    smooth: bool,
    mirror_x: bool,
    /// Active layer replaced by this stroke, if it switched layers.
    switched_from: Option<u32>,
    last: (f32, f32),
    /// Distance travelled since the last dab.
    carry: f64,
    previous: Option<(f32, f32)>,
    previous_mirrored: Option<(f32, f32)>,
    dirty: RectPx,
}

impl Stroke {
    pub(super) fn new(layer: u32, smooth: bool, mirror_x: bool, x: f32, y: f32) -> Self {
        Self {
            layer,
            smooth,
            mirror_x,
            switched_from: None,
            last: (x, y),
            carry: 0.0,
            previous: None,
            previous_mirrored: None,
            dirty: RectPx::default(),
        }
    }

    pub(super) fn with_switched_from(mut self, previous: Option<u32>) -> Self {
        self.switched_from = previous;
        self
    }

    pub(super) fn layer(&self) -> u32 {
        self.layer
    }

    pub(super) fn switched_from(&self) -> Option<u32> {
        self.switched_from
    }

    /// Union of everything painted so far.
    pub(super) fn dirty(&self) -> RectPx {
        self.dirty
    }

    /// Dab positions on the segment from the last point to `(x, y)`, `step`
    /// pixels apart along the whole stroke.
    ///
    /// Only dabs inside `reach` are returned, plus the one just before, so a
    /// smudge dab entering the canvas still has somewhere to pick up from.
    fn advance(&mut self, x: f32, y: f32, step: f32, reach: &Reach) -> Vec<(f32, f32)> {
        if !(x.is_finite() && y.is_finite()) {
            return Vec::new();
        }
        let (x0, y0) = (self.last.0 as f64, self.last.1 as f64);
        let (dx, dy) = (x as f64 - x0, y as f64 - y0);
        let length = dx.hypot(dy);
        let step = step as f64;
        self.last = (x, y);
        if !length.is_finite() || length <= 0.0 {
            return Vec::new();
        }

        let first = step - self.carry;
        if first > length {
            self.carry += length;
            return Vec::new();
        }
        let last_index = ((length - first) / step).floor();
        self.carry = length - (first + last_index * step);

        let Some((t0, t1)) = reach.clip(x0, y0, dx, dy) else {
            return Vec::new();
        };
        let from = (((t0 * length - first) / step).ceil() - 1.0).max(0.0);
        let to = ((t1 * length - first) / step).floor().min(last_index);
        if to < from {
            return Vec::new();
        }
        let cap = ((t1 - t0) * length / step).ceil() + 3.0;
        let count = (to - from + 1.0).min(cap) as u64;

        (0..count)
            .map(|k| {
                let d = first + (from + k as f64) * step;
                ((x0 + dx * d / length) as f32, (y0 + dy * d / length) as f32)
            })
            .collect()
    }
}

/// Region where a dab center can still touch the canvas.
#[derive(Debug, Clone, Copy)]
struct Reach {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Reach {
    fn around_canvas(size: SizePx, margin: f64) -> Self {
        Self {
            min_x: -margin,
            min_y: -margin,
            max_x: size.width as f64 + margin,
            max_y: size.height as f64 + margin,
        }
    }

    /// Parameter range of the segment `(x0, y0) + t * (dx, dy)`, `t` in
    /// `[0, 1]`, that lies inside. Liang-Barsky.
    fn clip(&self, x0: f64, y0: f64, dx: f64, dy: f64) -> Option<(f64, f64)> {
        let mut t0: f64 = 0.0;
        let mut t1: f64 = 1.0;
        let edges = [
            (-dx, x0 - self.min_x),
            (dx, self.max_x - x0),
            (-dy, y0 - self.min_y),
            (dy, self.max_y - y0),
        ];
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
        (t0 <= t1).then_some((t0, t1))
    }
}

impl<L: LayerStore> Engine<L> {
    /// Distance between dabs for the current tool, never below one pixel.
    fn dab_step(&self) -> f32 {
        (self.tool.spacing() * self.tool.diameter() as f32).max(1.0)
    }

    pub(super) fn stroke_to(&mut self, x: f32, y: f32) -> Result<()> {
        let step = self.dab_step();
        // mirrored dabs land at `width - x`, which stays inside the same reach
        let margin = self.tool.diameter() as f64 / 2.0 + 1.0;
        let reach = Reach::around_canvas(self.layers.size(), margin);
        let stroke = self.stroke.as_mut().ok_or(InvariantViolation::NoStroke)?;
        if stroke.smooth {
            log::trace!("smoothing requested, traversing linearly");
        }
        for (px, py) in stroke.advance(x, y, step, &reach) {
            self.paint_at(px, py);
        }
        Ok(())
    }

    /// Stamps one dab at `(x, y)` and its mirror image if mirroring.
    pub(super) fn paint_at(&mut self, x: f32, y: f32) {
        let width = self.layers.size().width as f32;
        let Some(stroke) = self.stroke.as_mut() else {
            return;
        };

        let dab = Dab {
            x,
            y,
            previous: stroke.previous,
            tool: self.tool,
            color: self.color,
        };
        if let Some(rect) = self.layers.paint_dab(&dab) {
            stroke.dirty = stroke.dirty.union(&rect);
        }
        stroke.previous = Some((x, y));

        if stroke.mirror_x {
            let mx = width - x;
            let mirrored = Dab {
                x: mx,
                previous: stroke.previous_mirrored,
                ..dab
            };
            if let Some(rect) = self.layers.paint_dab(&mirrored) {
                stroke.dirty = stroke.dirty.union(&rect);
            }
            stroke.previous_mirrored = Some((mx, y));
        }
    }
}
