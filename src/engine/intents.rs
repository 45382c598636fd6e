//! User-level editing operations.
//!
//! Each intent builds the commands for one user action, executes and queues
//! them, and where the action is undoable wraps it in an edit.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use super::{Dirty, Engine};
use crate::blob::IMAGE_SEGMENT;
use crate::command::{BlitTransform, Command, ToolSettings};
use crate::error::{InvariantViolation, Result};
use crate::layer::LayerStore;
use crate::rect::RectPx;

impl<L: LayerStore> Engine<L> {
    /// After-side regions for an edit that redo can replay from the journal.
    ///
    /// With journal writing on there is nothing to capture; with it off the
    /// after pixels have to be kept instead.
    fn replay_fallback(&self, dirty: Vec<Dirty>) -> Vec<Dirty> {
        if self.write_enabled { Vec::new() } else { dirty }
    }

    fn whole_layer(&self, layer: u32) -> Dirty {
        Dirty::new(layer, RectPx::from_size(self.layers.size()))
    }

    // ========================================================================
    // Standing context
    // ========================================================================

    /// Selects the stroke color. Journaled with the next commit.
    pub fn color_select(&mut self, r: f32, g: f32, b: f32, a: f32) -> Result<()> {
        self.execute_and_save(Command::color_select(r, g, b, a))
    }

    /// Selects the stroke tool. Journaled with the next commit.
    pub fn tool_select(&mut self, tool: ToolSettings) -> Result<()> {
        self.execute_and_save(Command::tool_select(tool))
    }

    // ========================================================================
    // Strokes
    // ========================================================================

    /// Starts a stroke on `layer`.
    ///
    /// The standing color and tool are saved ahead of the stroke so that the
    /// journaled stroke replays the same way on its own.
    pub fn stroke_begin(&mut self, layer: u8, smooth: bool, mirror_x: bool, x: f32, y: f32) -> Result<()> {
        if self.open_edit.is_some() {
            return Err(InvariantViolation::ReentrantEdit.into());
        }
        if self.stroke.is_some() {
            return Err(InvariantViolation::StrokeActive.into());
        }
        self.execute_and_save(Command::ColorSelect(self.color))?;
        self.execute_and_save(Command::ToolSelect(self.tool))?;
        self.execute_and_save(Command::stroke_begin(layer, smooth, mirror_x, x, y))
    }

    pub fn stroke_move(&mut self, x: f32, y: f32) -> Result<()> {
        self.execute_and_save(Command::stroke_move(x, y))
    }

    /// Finishes the stroke and records it as one undoable edit.
    ///
    /// Only the pixels under the stroke are kept for undo. Redo replays the
    /// stroke's commands from the journal. A stroke that switched the active
    /// layer also records the switch, so undo selects the old layer again.
    pub fn stroke_end(&mut self) -> Result<()> {
        let stroke = self.stroke.as_ref().ok_or(InvariantViolation::NoStroke)?;
        let layer = stroke.layer();
        let switched_from = stroke.switched_from();
        let dirty: Vec<_> = Some(Dirty::new(layer, stroke.dirty()))
            .filter(|dirty| !dirty.rect.is_empty())
            .into_iter()
            .collect();
        let after = self.replay_fallback(dirty.clone());

        self.bracketed(true, &dirty, &after, |engine, edit| {
            if let Some(previous) = switched_from {
                edit.before_mut().set_active_layer(previous)?;
                edit.after_mut().set_active_layer(layer)?;
            }
            engine.execute_and_save(Command::stroke_end())
        })
    }

    /// Abandons the stroke.
    ///
    /// The editing surface is reverted and the stroke's queued commands are
    /// dropped, including the color and tool saved ahead of it. The color and
    /// tool stay selected. A layer switched to by the stroke is switched back.
    pub fn stroke_cancel(&mut self) -> Result<()> {
        let stroke = self.stroke.take().ok_or(InvariantViolation::NoStroke)?;
        if !stroke.dirty().is_empty() {
            self.layers.revert_editing(stroke.dirty());
        }
        if let Some(previous) = stroke.switched_from() {
            self.layers.set_active_layer(previous);
        }
        self.discard();
        log::debug!("stroke cancelled");
        Ok(())
    }

    // ========================================================================
    // Layer pixels
    // ========================================================================

    /// Fills a layer with a straight-alpha color.
    pub fn clear_layer(&mut self, index: u32, r: f32, g: f32, b: f32, a: f32) -> Result<()> {
        self.ensure_idle()?;
        self.check_layer(index)?;
        let dirty = vec![self.whole_layer(index)];
        let after = self.replay_fallback(dirty.clone());

        self.bracketed(true, &dirty, &after, |engine, _| {
            engine.execute_and_save(Command::layer_clear(index, r, g, b, a))
        })
    }

    /// Composites `src` onto `dst` and clears `src`.
    pub fn merge_layers(&mut self, src: u32, dst: u32) -> Result<()> {
        self.ensure_idle()?;
        self.check_layer(src)?;
        self.check_layer(dst)?;
        if src == dst {
            return Err(InvariantViolation::MergeIntoSelf(src).into());
        }
        let dirty = vec![self.whole_layer(src), self.whole_layer(dst)];
        let after = self.replay_fallback(dirty.clone());

        self.bracketed(true, &dirty, &after, |engine, _| {
            engine.execute_and_save(Command::layer_merge(src, dst))
        })
    }

    /// Replaces a layer with `image` placed by `transform`.
    ///
    /// The image is stored PNG-encoded in the blob store, where the blit
    /// command picks it up when executed or replayed.
    pub fn blit_layer(&mut self, index: u32, image: &RgbaImage, transform: BlitTransform) -> Result<()> {
        self.ensure_idle()?;
        self.check_layer(index)?;

        let mut encoded = Vec::new();
        image.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;
        self.streams.stage_blob(IMAGE_SEGMENT, &encoded)?;

        let dirty = [self.whole_layer(index)];
        self.bracketed(false, &dirty, &dirty, |engine, _| {
            engine.execute_and_save(Command::layer_blit(index, transform))
        })
    }

    // ========================================================================
    // Layer state
    // ========================================================================

    pub fn set_layer_opacity(&mut self, index: u32, opacity: f32) -> Result<()> {
        self.ensure_idle()?;
        self.check_layer(index)?;
        let old = self.layers.layer_opacity(index);

        self.bracketed(false, &[], &[], |engine, edit| {
            edit.before_mut().set_opacity(index, old)?;
            engine.execute_and_save(Command::layer_opacity(index, opacity))?;
            // the command clamps, so record what was applied
            let new = engine.layers.layer_opacity(index);
            edit.after_mut().set_opacity(index, new)?;
            Ok(())
        })
    }

    pub fn set_layer_visibility(&mut self, index: u32, visible: bool) -> Result<()> {
        self.ensure_idle()?;
        self.check_layer(index)?;
        let old = self.layers.layer_visible(index);

        self.bracketed(false, &[], &[], |engine, edit| {
            edit.before_mut().set_visibility(index, old)?;
            engine.execute_and_save(Command::layer_visibility(index, visible))?;
            edit.after_mut().set_visibility(index, visible)?;
            Ok(())
        })
    }

    /// Sets the draw order, bottom first. Must name every layer once.
    pub fn set_layer_order(&mut self, order: &[u32]) -> Result<()> {
        self.ensure_idle()?;
        let old = self.layers.layer_order();

        self.bracketed(false, &[], &[], |engine, edit| {
            edit.before_mut().set_layer_order(old)?;
            engine.execute_and_save(Command::layer_order(order))?;
            edit.after_mut().set_layer_order(order.to_vec())?;
            Ok(())
        })
    }

    /// Makes `index` the layer strokes paint into.
    pub fn select_layer(&mut self, index: u32) -> Result<()> {
        self.ensure_idle()?;
        self.check_layer(index)?;
        let old = self.layers.active_layer();

        self.bracketed(false, &[], &[], |engine, edit| {
            edit.before_mut().set_active_layer(old)?;
            engine.execute_and_save(Command::layer_select(index))?;
            edit.after_mut().set_active_layer(index)?;
            Ok(())
        })
    }

    // ========================================================================
    // Canvas
    // ========================================================================

    /// Recreates the canvas with empty layers. Not undoable: the undo
    /// history is cleared.
    pub fn resize_canvas(&mut self, layer_count: u32, width: u32, height: u32) -> Result<()> {
        self.ensure_idle()?;
        self.execute_and_save(Command::canvas_resize(layer_count, width, height))?;
        self.commit()?;
        self.ring.clear();
        Ok(())
    }
}
