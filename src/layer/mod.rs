//! The pixel layer model the engine edits.
//!
//! The engine never touches pixels directly. It drives a [`LayerStore`],
//! which owns a fixed number of RGBA layers plus their opacity, visibility,
//! draw order and the active layer. Strokes do not paint into the active
//! layer itself but into an *editing surface*, a working copy of it that is
//! flattened into the layer when the stroke ends and reverted when it is
//! cancelled.
//!
//! [`Canvas`] is the in-memory implementation. Hosts with their own
//! compositor implement the trait over their own storage.
//!
//! Callers validate indices before calling in; implementations may assume
//! every layer index is below [`LayerStore::layer_count`] and that orders are
//! permutations.

mod brush;
mod canvas;

pub use brush::{Dab, source_over, to_pixel};
pub use canvas::Canvas;

use image::{Rgba, RgbaImage};

use crate::command::BlitTransform;
use crate::rect::{RectPx, SizePx};

// ============================================================================
// LayerStore
// ============================================================================

pub trait LayerStore {
    fn size(&self) -> SizePx;

    fn layer_count(&self) -> u32;

    /// Replaces every layer with `layer_count` transparent layers of `size`,
    /// in natural order, all opaque and visible, with layer 0 active.
    fn resize(&mut self, layer_count: u32, size: SizePx);

    fn layer_image(&self, index: u32) -> &RgbaImage;

    /// Copies `rect` out of a layer.
    fn copy_region(&self, index: u32, rect: RectPx) -> RgbaImage {
        image::imageops::crop_imm(self.layer_image(index), rect.x, rect.y, rect.width, rect.height)
            .to_image()
    }

    /// Writes `pixels` into a layer with its top-left at `(x, y)`.
    ///
    /// The editing surface is left alone; see [`LayerStore::refresh_editing`].
    fn set_layer_region(&mut self, index: u32, x: u32, y: u32, pixels: &RgbaImage);

    fn clear_layer(&mut self, index: u32, color: Rgba<u8>);

    /// Composites `src` onto `dst` at the opacity of `src`, then clears `src`.
    fn merge_layers(&mut self, src: u32, dst: u32);

    /// Replaces a layer with `image` placed by `transform` over transparency.
    fn blit_layer(&mut self, index: u32, image: &RgbaImage, transform: &BlitTransform);

    /// Draw order, bottom first.
    fn layer_order(&self) -> Vec<u32>;

    fn set_layer_order(&mut self, order: &[u32]);

    fn layer_opacity(&self, index: u32) -> f32;

    fn set_layer_opacity(&mut self, index: u32, opacity: f32);

    fn layer_visible(&self, index: u32) -> bool;

    fn set_layer_visible(&mut self, index: u32, visible: bool);

    fn active_layer(&self) -> u32;

    /// Selects the layer strokes paint into and reloads the editing surface.
    fn set_active_layer(&mut self, index: u32);

    fn is_editing(&self) -> bool;

    /// Creates the editing surface from the active layer.
    fn begin_editing(&mut self);

    fn end_editing(&mut self);

    /// Stamps one dab onto the editing surface, returning what it touched.
    fn paint_dab(&mut self, dab: &Dab) -> Option<RectPx>;

    /// Commits the editing surface into the active layer over `rect`.
    fn flatten_editing(&mut self, rect: RectPx);

    /// Throws away editing-surface changes over `rect`.
    fn revert_editing(&mut self, rect: RectPx);

    /// Reloads `rect` of the editing surface after the active layer was
    /// written behind its back.
    fn refresh_editing(&mut self, rect: RectPx);

    /// Rebuilds every derived surface from the layers.
    fn rebuild_caches(&mut self);

    /// Adds `rect` to the dirty region.
    fn invalidate(&mut self, rect: RectPx);

    /// Returns and resets the accumulated dirty region.
    fn take_dirty(&mut self) -> Option<RectPx>;
}
