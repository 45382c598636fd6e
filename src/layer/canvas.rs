//! In-memory [`LayerStore`] on `image` buffers.

use image::{Rgba, RgbaImage};

use super::brush::{self, Dab, source_over};
use super::LayerStore;
use crate::command::BlitTransform;
use crate::rect::{RectPx, SizePx};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Clone)]
struct Layer {
    image: RgbaImage,
    opacity: f32,
    visible: bool,
}

impl Layer {
    fn new(size: SizePx) -> Self {
        Self {
            image: RgbaImage::new(size.width, size.height),
            opacity: 1.0,
            visible: true,
        }
    }
}

/// Layers, their draw state and an editing surface, all in memory.
///
/// Straight (non-premultiplied) alpha throughout.
///
/// ```
/// use paint_journal::{Canvas, LayerStore, SizePx};
///
/// let mut canvas = Canvas::new(3, SizePx::new(64, 48));
/// canvas.set_layer_opacity(1, 0.5);
/// assert_eq!(canvas.layer_count(), 3);
/// assert!(canvas.is_editing());
/// ```
#[derive(Debug, Clone)]
pub struct Canvas {
    size: SizePx,
    layers: Vec<Layer>,
    order: Vec<u32>,
    active: u32,
    editing: Option<RgbaImage>,
    dirty: Option<RectPx>,
}

impl Canvas {
    /// A canvas of transparent layers with the editing surface enabled.
    pub fn new(layer_count: u32, size: SizePx) -> Self {
        let mut canvas = Self {
            size,
            layers: Vec::new(),
            order: Vec::new(),
            active: 0,
            editing: None,
            dirty: None,
        };
        canvas.resize(layer_count, size);
        canvas.begin_editing();
        canvas
    }

    /// The working copy strokes paint into, if editing.
    pub fn editing_surface(&self) -> Option<&RgbaImage> {
        self.editing.as_ref()
    }

    /// Flattens the visible layers in draw order.
    ///
    /// The active layer is taken from the editing surface, so an in-progress
    /// stroke shows up.
    pub fn composite(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.size.width, self.size.height);
        for &index in &self.order {
            let layer = &self.layers[index as usize];
            if !layer.visible {
                continue;
            }
            let source = match &self.editing {
                Some(editing) if index == self.active => editing,
                _ => &layer.image,
            };
            for (dst, src) in out.pixels_mut().zip(source.pixels()) {
                source_over(dst, *src, layer.opacity);
            }
        }
        out
    }

    fn layer_mut(&mut self, index: u32) -> &mut Layer {
        &mut self.layers[index as usize]
    }

    fn full_rect(&self) -> RectPx {
        RectPx::from_size(self.size)
    }

    /// Keeps the editing surface in step after a whole-layer write.
    fn sync_editing(&mut self, index: u32) {
        if index == self.active {
            self.refresh_editing(self.full_rect());
        }
        self.invalidate(self.full_rect());
    }

    fn copy_into(dst: &mut RgbaImage, src: &RgbaImage, rect: RectPx) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                dst.put_pixel(x, y, *src.get_pixel(x, y));
            }
        }
    }
}

impl LayerStore for Canvas {
    fn size(&self) -> SizePx {
        self.size
    }

    fn layer_count(&self) -> u32 {
        self.layers.len() as u32
    }

    fn resize(&mut self, layer_count: u32, size: SizePx) {
        self.size = size;
        self.layers = (0..layer_count).map(|_| Layer::new(size)).collect();
        self.order = (0..layer_count).collect();
        self.active = 0;
        if self.editing.is_some() {
            self.begin_editing();
        }
        self.invalidate(self.full_rect());
    }

    fn layer_image(&self, index: u32) -> &RgbaImage {
        &self.layers[index as usize].image
    }

    fn set_layer_region(&mut self, index: u32, x: u32, y: u32, pixels: &RgbaImage) {
        image::imageops::replace(&mut self.layer_mut(index).image, pixels, x as i64, y as i64);
        self.invalidate(RectPx::new(x, y, pixels.width(), pixels.height()));
    }

    fn clear_layer(&mut self, index: u32, color: Rgba<u8>) {
        for pixel in self.layer_mut(index).image.pixels_mut() {
            *pixel = color;
        }
        self.sync_editing(index);
    }

    fn merge_layers(&mut self, src: u32, dst: u32) {
        let blank = RgbaImage::new(self.size.width, self.size.height);
        let source = std::mem::replace(&mut self.layer_mut(src).image, blank);
        let opacity = self.layers[src as usize].opacity;
        for (d, s) in self.layer_mut(dst).image.pixels_mut().zip(source.pixels()) {
            source_over(d, *s, opacity);
        }
        self.sync_editing(src);
        self.sync_editing(dst);
    }

    fn blit_layer(&mut self, index: u32, image: &RgbaImage, transform: &BlitTransform) {
        let mut target = RgbaImage::new(self.size.width, self.size.height);
        blit_transformed(&mut target, image, transform);
        self.layer_mut(index).image = target;
        self.sync_editing(index);
    }

    fn layer_order(&self) -> Vec<u32> {
        self.order.clone()
    }

    fn set_layer_order(&mut self, order: &[u32]) {
        self.order = order.to_vec();
        self.invalidate(self.full_rect());
    }

    fn layer_opacity(&self, index: u32) -> f32 {
        self.layers[index as usize].opacity
    }

    fn set_layer_opacity(&mut self, index: u32, opacity: f32) {
        self.layer_mut(index).opacity = opacity;
        self.invalidate(self.full_rect());
    }

    fn layer_visible(&self, index: u32) -> bool {
        self.layers[index as usize].visible
    }

    fn set_layer_visible(&mut self, index: u32, visible: bool) {
        self.layer_mut(index).visible = visible;
        self.invalidate(self.full_rect());
    }

    fn active_layer(&self) -> u32 {
        self.active
    }

    fn set_active_layer(&mut self, index: u32) {
        if index == self.active {
            return;
        }
        self.active = index;
        if self.editing.is_some() {
            self.begin_editing();
        }
    }

    fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    fn begin_editing(&mut self) {
        self.editing = self
            .layers
            .get(self.active as usize)
            .map(|layer| layer.image.clone());
    }

    fn end_editing(&mut self) {
        self.editing = None;
    }

    fn paint_dab(&mut self, dab: &Dab) -> Option<RectPx> {
        let rect = brush::paint_dab(self.editing.as_mut()?, dab)?;
        self.invalidate(rect);
        Some(rect)
    }

    fn flatten_editing(&mut self, rect: RectPx) {
        let Some(rect) = rect.clip_to(self.size) else {
            return;
        };
        if let Some(editing) = &self.editing {
            Self::copy_into(&mut self.layers[self.active as usize].image, editing, rect);
        }
    }

    fn revert_editing(&mut self, rect: RectPx) {
        self.refresh_editing(rect);
        self.invalidate(rect);
    }

    fn refresh_editing(&mut self, rect: RectPx) {
        let Some(rect) = rect.clip_to(self.size) else {
            return;
        };
        let Some(layer) = self.layers.get(self.active as usize) else {
            return;
        };
        if let Some(editing) = self.editing.as_mut() {
            Self::copy_into(editing, &layer.image, rect);
        }
    }

    fn rebuild_caches(&mut self) {
        if self.editing.is_some() {
            self.begin_editing();
        }
        self.invalidate(self.full_rect());
    }

    fn invalidate(&mut self, rect: RectPx) {
        let Some(rect) = rect.clip_to(self.size) else {
            return;
        };
        self.dirty = Some(match self.dirty {
            Some(dirty) => dirty.union(&rect),
            None => rect,
        });
    }

    fn take_dirty(&mut self) -> Option<RectPx> {
        self.dirty.take()
    }
}

// ============================================================================
// Transformed blit
// ============================================================================

/// Draws `src` onto `dst` rotated and scaled about its anchor, with the
/// anchor landing on `(transform.x, transform.y)`. Nearest-neighbour.
fn blit_transformed(dst: &mut RgbaImage, src: &RgbaImage, transform: &BlitTransform) {
    if transform.scale <= 0.0 || !transform.scale.is_finite() {
        return;
    }
    let (sin, cos) = transform.angle.sin_cos();
    let forward = |sx: f32, sy: f32| {
        let lx = (sx - transform.anchor_x) * transform.scale;
        let ly = (sy - transform.anchor_y) * transform.scale;
        (
            lx * cos - ly * sin + transform.x,
            lx * sin + ly * cos + transform.y,
        )
    };

    let (w, h) = (src.width() as f32, src.height() as f32);
    let corners = [forward(0.0, 0.0), forward(w, 0.0), forward(0.0, h), forward(w, h)];
    let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0);
    let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0);
    let max_x = corners
        .iter()
        .map(|c| c.0)
        .fold(f32::NEG_INFINITY, f32::max)
        .ceil()
        .min(dst.width() as f32);
    let max_y = corners
        .iter()
        .map(|c| c.1)
        .fold(f32::NEG_INFINITY, f32::max)
        .ceil()
        .min(dst.height() as f32);

    let mut y = min_y;
    while y < max_y {
        let mut x = min_x;
        while x < max_x {
            // inverse mapping of the destination pixel center
            let dx = x + 0.5 - transform.x;
            let dy = y + 0.5 - transform.y;
            let sx = (dx * cos + dy * sin) / transform.scale + transform.anchor_x;
            let sy = (-dx * sin + dy * cos) / transform.scale + transform.anchor_y;
            if sx >= 0.0 && sy >= 0.0 && sx < w && sy < h {
                let pixel = *src.get_pixel(sx as u32, sy as u32);
                source_over(dst.get_pixel_mut(x as u32, y as u32), pixel, 1.0);
            }
            x += 1.0;
        }
        y += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolSettings;
    use palette::Srgba;

    fn canvas() -> Canvas {
        Canvas::new(2, SizePx::new(8, 8))
    }

    #[test]
    fn new_canvas_is_transparent_and_editing() {
        let canvas = canvas();
        assert_eq!(canvas.layer_order(), vec![0, 1]);
        assert!(canvas.layer_image(1).pixels().all(|p| *p == TRANSPARENT));
        assert_eq!(canvas.editing_surface().unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn strokes_stay_on_editing_surface_until_flattened() {
        let mut canvas = canvas();
        let dab = Dab {
            x: 4.0,
            y: 4.0,
            previous: None,
            tool: ToolSettings::soft_brush(4, 1.0, 0.1),
            color: Srgba::new(0.0, 0.0, 1.0, 1.0),
        };
        let rect = canvas.paint_dab(&dab).unwrap();
        assert_eq!(canvas.layer_image(0).get_pixel(4, 4), &TRANSPARENT);

        canvas.flatten_editing(rect);
        assert_eq!(canvas.layer_image(0).get_pixel(4, 4), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn revert_restores_editing_surface() {
        let mut canvas = canvas();
        let dab = Dab {
            x: 4.0,
            y: 4.0,
            previous: None,
            tool: ToolSettings::soft_brush(4, 1.0, 0.1),
            color: Srgba::new(0.0, 0.0, 1.0, 1.0),
        };
        let rect = canvas.paint_dab(&dab).unwrap();
        canvas.revert_editing(rect);
        assert_eq!(canvas.editing_surface().unwrap(), canvas.layer_image(0));
    }

    #[test]
    fn merge_blends_then_clears_source() {
        let mut canvas = canvas();
        canvas.clear_layer(0, Rgba([0, 0, 0, 255]));
        canvas.clear_layer(1, Rgba([200, 0, 0, 255]));
        canvas.set_layer_opacity(1, 0.5);

        canvas.merge_layers(1, 0);
        assert_eq!(canvas.layer_image(0).get_pixel(3, 3), &Rgba([100, 0, 0, 255]));
        assert_eq!(canvas.layer_image(1).get_pixel(3, 3), &TRANSPARENT);
    }

    #[test]
    fn clear_of_active_layer_reaches_editing_surface() {
        let mut canvas = canvas();
        canvas.clear_layer(0, Rgba([1, 2, 3, 4]));
        assert_eq!(canvas.editing_surface().unwrap().get_pixel(0, 0), &Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn translated_blit_replaces_layer() {
        let mut canvas = canvas();
        canvas.clear_layer(1, Rgba([9, 9, 9, 255]));
        let stamp = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 0, 255]));
        canvas.blit_layer(1, &stamp, &BlitTransform::translate(3.0, 4.0));

        let layer = canvas.layer_image(1);
        assert_eq!(layer.get_pixel(3, 4), &Rgba([255, 255, 0, 255]));
        assert_eq!(layer.get_pixel(4, 5), &Rgba([255, 255, 0, 255]));
        assert_eq!(layer.get_pixel(5, 4), &TRANSPARENT);
        assert_eq!(layer.get_pixel(0, 0), &TRANSPARENT);
    }

    #[test]
    fn composite_respects_visibility_and_order() {
        let mut canvas = canvas();
        canvas.clear_layer(0, Rgba([255, 0, 0, 255]));
        canvas.clear_layer(1, Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.composite().get_pixel(0, 0), &Rgba([0, 255, 0, 255]));

        canvas.set_layer_order(&[1, 0]);
        assert_eq!(canvas.composite().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));

        canvas.set_layer_visible(0, false);
        assert_eq!(canvas.composite().get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn dirty_region_accumulates() {
        let mut canvas = canvas();
        canvas.take_dirty();
        canvas.invalidate(RectPx::new(1, 1, 2, 2));
        canvas.invalidate(RectPx::new(5, 5, 10, 10));
        assert_eq!(canvas.take_dirty(), Some(RectPx::new(1, 1, 7, 7)));
        assert_eq!(canvas.take_dirty(), None);
    }
}
