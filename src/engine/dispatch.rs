//! Effect handlers, one per command kind.

use super::Engine;
use super::stroke::Stroke;
use crate::blob::IMAGE_SEGMENT;
use crate::command::{BlitTransform, Command, MAX_LAYERS};
use crate::error::{InvariantViolation, Result, SegmentError};
use crate::layer::{LayerStore, to_pixel};
use crate::rect::SizePx;

impl<L: LayerStore> Engine<L> {
    pub(super) fn dispatch(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::ColorSelect(color) => {
                self.color = *color;
            }
            Command::ToolSelect(tool) => {
                self.tool = *tool;
            }
            Command::CanvasResize {
                layer_count,
                width,
                height,
            } => self.resize(*layer_count, *width, *height)?,
            Command::LayerBlit { index, transform } => self.blit(*index, transform)?,
            Command::LayerClear { index, color } => {
                self.check_layer(*index)?;
                self.layers.clear_layer(*index, to_pixel(*color));
            }
            Command::LayerMerge { src, dst } => {
                self.check_layer(*src)?;
                self.check_layer(*dst)?;
                if src == dst {
                    return Err(InvariantViolation::MergeIntoSelf(*src).into());
                }
                self.layers.merge_layers(*src, *dst);
            }
            Command::LayerSelect { index } => {
                self.check_layer(*index)?;
                if self.stroke.is_some() {
                    return Err(InvariantViolation::StrokeActive.into());
                }
                self.layers.set_active_layer(*index);
            }
            Command::LayerOpacity { index, opacity } => {
                self.check_layer(*index)?;
                self.layers.set_layer_opacity(*index, *opacity);
            }
            Command::LayerOrder(order) => {
                self.check_order(order)?;
                self.layers.set_layer_order(order);
            }
            Command::LayerVisibility { index, visible } => {
                self.check_layer(*index)?;
                self.layers.set_layer_visible(*index, *visible);
            }
            Command::StrokeBegin {
                layer,
                smooth,
                mirror_x,
                x,
                y,
            } => {
                if self.stroke.is_some() {
                    return Err(InvariantViolation::StrokeActive.into());
                }
                let layer = u32::from(*layer);
                self.check_layer(layer)?;
                let active = self.layers.active_layer();
                let switched_from = (active != layer).then_some(active);
                if switched_from.is_some() {
                    log::debug!("stroke on layer {layer} while layer {active} is active, selecting it");
                    self.layers.set_active_layer(layer);
                }
                if !self.layers.is_editing() {
                    self.layers.begin_editing();
                }
                self.stroke = Some(
                    Stroke::new(layer, *smooth, *mirror_x, *x, *y).with_switched_from(switched_from),
                );
                self.paint_at(*x, *y);
            }
            Command::StrokeMove { x, y } => self.stroke_to(*x, *y)?,
            Command::StrokeEnd => {
                let stroke = self.stroke.take().ok_or(InvariantViolation::NoStroke)?;
                if !stroke.dirty().is_empty() {
                    self.layers.flatten_editing(stroke.dirty());
                }
            }
        }
        Ok(())
    }

    pub(super) fn check_layer(&self, index: u32) -> Result<(), InvariantViolation> {
        let count = self.layers.layer_count();
        if index >= count {
            return Err(InvariantViolation::LayerOutOfRange { index, count });
        }
        Ok(())
    }

    /// An order must name every layer exactly once.
    fn check_order(&self, order: &[u32]) -> Result<(), InvariantViolation> {
        let count = self.layers.layer_count() as usize;
        let mut seen = vec![false; count];
        let valid = order.len() == count
            && order.iter().all(|&index| match seen.get_mut(index as usize) {
                Some(slot) if !*slot => {
                    *slot = true;
                    true
                }
                _ => false,
            });
        if !valid {
            return Err(InvariantViolation::InvalidLayerOrder(order.to_vec()));
        }
        Ok(())
    }

    fn resize(&mut self, layer_count: u32, width: u32, height: u32) -> Result<()> {
        if self.stroke.is_some() {
            return Err(InvariantViolation::StrokeActive.into());
        }
        if layer_count == 0 || width == 0 || height == 0 {
            return Err(InvariantViolation::EmptyCanvas.into());
        }
        if layer_count > MAX_LAYERS {
            return Err(InvariantViolation::TooManyLayers {
                count: layer_count,
                max: MAX_LAYERS,
            }
            .into());
        }
        self.layers.resize(layer_count, SizePx::new(width, height));
        log::info!("canvas resized to {layer_count} layers of {width}x{height}");
        Ok(())
    }

    /// Reads the staged image at the blob cursor and blits it.
    fn blit(&mut self, index: u32, transform: &BlitTransform) -> Result<()> {
        self.check_layer(index)?;
        let (header, payload) = self.streams.take_blob()?;
        if header.kind != IMAGE_SEGMENT {
            return Err(SegmentError::UnexpectedKind {
                expected: IMAGE_SEGMENT,
                found: header.kind,
            }
            .into());
        }
        let image = image::load_from_memory(&payload)?.to_rgba8();
        self.layers.blit_layer(index, &image, transform);
        Ok(())
    }
}
