//! Undo, redo and journal replay.

use std::ops::{Deref, DerefMut};

use super::Engine;
use crate::error::{InvariantViolation, Result};
use crate::layer::LayerStore;
use crate::store::{Checkpoint, DocumentStreams};
use crate::undo::UndoState;

/// Turns off undo capture and journal writing while replaying, and restores
/// both when dropped.
struct ReplayGuard<'a, L: LayerStore> {
    engine: &'a mut Engine<L>,
    undo_enabled: bool,
    write_enabled: bool,
}

impl<'a, L: LayerStore> ReplayGuard<'a, L> {
    fn new(engine: &'a mut Engine<L>) -> Self {
        let undo_enabled = std::mem::replace(&mut engine.undo_enabled, false);
        let write_enabled = std::mem::replace(&mut engine.write_enabled, false);
        Self {
            engine,
            undo_enabled,
            write_enabled,
        }
    }
}

impl<L: LayerStore> Deref for ReplayGuard<'_, L> {
    type Target = Engine<L>;

    fn deref(&self) -> &Engine<L> {
        self.engine
    }
}

impl<L: LayerStore> DerefMut for ReplayGuard<'_, L> {
    fn deref_mut(&mut self) -> &mut Engine<L> {
        self.engine
    }
}

impl<L: LayerStore> Drop for ReplayGuard<'_, L> {
    fn drop(&mut self) {
        self.engine.undo_enabled = self.undo_enabled;
        self.engine.write_enabled = self.write_enabled;
    }
}

/// Applies one side of an undo buffer. Returns whether layer caches need a
/// rebuild.
fn apply_state<L: LayerStore>(
    layers: &mut L,
    streams: &mut DocumentStreams,
    state: &UndoState,
) -> Result<bool> {
    let mut rebuild = false;

    for patch in state.patches() {
        log::debug!("restore {}x{} pixels of layer {}", patch.rect.width, patch.rect.height, patch.layer);
        layers.set_layer_region(patch.layer, patch.rect.x, patch.rect.y, &patch.pixels);
        if patch.layer == layers.active_layer() {
            layers.refresh_editing(patch.rect);
        } else {
            rebuild = true;
        }
    }
    if let Some(order) = state.layer_order() {
        log::debug!("restore layer order {order:?}");
        layers.set_layer_order(order);
        rebuild = true;
    }
    if let Some((index, opacity)) = state.opacity() {
        log::debug!("restore layer {index} opacity {opacity}");
        layers.set_layer_opacity(index, opacity);
        rebuild = true;
    }
    if let Some((index, visible)) = state.visibility() {
        log::debug!("restore layer {index} visibility {visible}");
        layers.set_layer_visible(index, visible);
        rebuild = true;
    }
    if let Some(index) = state.active_layer() {
        log::debug!("restore active layer {index}");
        layers.set_active_layer(index);
    }
    if let Some(cursor) = state.journal() {
        streams.seek_journal(cursor)?;
    }
    if let Some(cursor) = state.blob() {
        streams.seek_blob(cursor);
    }

    Ok(rebuild)
}

impl<L: LayerStore> Engine<L> {
    pub fn has_undo(&self) -> bool {
        self.ring.has_undo()
    }

    pub fn has_redo(&self) -> bool {
        self.ring.has_redo()
    }

    /// Reverts the most recent edit. Returns false if there was none.
    pub fn undo(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        let editing = self.layers.is_editing();
        let Some(buffer) = self.ring.undo_buffer() else {
            log::warn!("undo requested with nothing to undo");
            return Ok(false);
        };

        log::debug!("undo to step {}", self.ring.location() - 1);
        let rebuild = apply_state(&mut self.layers, &mut self.streams, &buffer.before)?;
        self.ring.undo();

        if editing && rebuild {
            self.layers.rebuild_caches();
        }
        Ok(true)
    }

    /// Re-applies the most recently undone edit. Returns false if there was none.
    ///
    /// If the edit cannot be re-applied, for instance because its journaled
    /// commands no longer decode, the history position and stream cursors are
    /// left where they were and the error is returned. Layer changes made by
    /// the commands replayed before the failure are not rolled back.
    pub fn redo(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        let editing = self.layers.is_editing();
        let start = self.streams.checkpoint();
        if !self.ring.redo() {
            log::warn!("redo requested with nothing to redo");
            return Ok(false);
        }

        match self.reapply() {
            Ok(rebuild) => {
                if editing && rebuild {
                    self.layers.rebuild_caches();
                }
                Ok(true)
            }
            Err(err) => {
                log::warn!("redo to step {} failed: {err}", self.ring.location());
                self.ring.undo();
                if let Err(seek) = self.streams.seek_journal(start.journal) {
                    log::error!("could not restore journal cursor {}: {seek}", start.journal);
                }
                self.streams.seek_blob(start.blob);
                if editing {
                    self.layers.rebuild_caches();
                }
                Err(err)
            }
        }
    }

    /// Applies the after side of the buffer at the current history position,
    /// replaying the journal first for replay edits. Returns whether layer
    /// caches need a rebuild.
    fn reapply(&mut self) -> Result<bool> {
        let replay = self.ring.undo_buffer().and_then(|buffer| {
            let target = buffer.after.journal().filter(|_| buffer.after.is_replay())?;
            Some((
                Checkpoint {
                    journal: buffer.before.journal()?,
                    blob: buffer.before.blob().unwrap_or(self.streams.checkpoint().blob),
                },
                target,
            ))
        });
        if let Some((from, to)) = replay {
            log::debug!("redo by replaying journal {}..{}", from.journal, to);
            self.streams.seek_journal(from.journal)?;
            self.streams.seek_blob(from.blob);
            self.replay_to(to)?;
        }

        log::debug!("redo to step {}", self.ring.location());
        let rebuild = match self.ring.undo_buffer() {
            Some(buffer) => apply_state(&mut self.layers, &mut self.streams, &buffer.after)?,
            None => false,
        };
        Ok(rebuild || replay.is_some())
    }

    /// Re-executes the journal from its cursor up to `until`, with undo
    /// capture and journal writing off. Used to rebuild a document on load.
    pub fn replay_until(&mut self, until: Checkpoint) -> Result<()> {
        self.ensure_idle()?;
        log::info!(
            "replaying journal {}..{}",
            self.streams.checkpoint().journal,
            until.journal
        );
        self.replay_to(until.journal)?;
        let blob = self.streams.checkpoint().blob;
        if blob != until.blob {
            log::warn!("blob cursor {blob} after replay, expected {}", until.blob);
            self.streams.seek_blob(until.blob);
        }
        Ok(())
    }

    fn replay_to(&mut self, until: u64) -> Result<()> {
        let mut guard = ReplayGuard::new(self);
        let mut replayed = 0usize;
        while guard.streams.checkpoint().journal < until {
            let step = guard
                .streams
                .read_command()
                .and_then(|command| guard.execute(&command));
            if let Err(err) = step {
                guard.abandon_stroke();
                return Err(err);
            }
            replayed += 1;
        }

        let cursor = guard.streams.checkpoint().journal;
        if cursor != until {
            return Err(InvariantViolation::CursorMismatch {
                stream: "command journal",
                logical: until,
                physical: cursor,
            }
            .into());
        }
        log::debug!("replayed {replayed} commands");
        Ok(())
    }

    /// Drops a stroke left open by an interrupted replay.
    fn abandon_stroke(&mut self) {
        if let Some(stroke) = self.stroke.take() {
            log::warn!("replay stopped inside a stroke on layer {}", stroke.layer());
            if !stroke.dirty().is_empty() {
                self.layers.revert_editing(stroke.dirty());
            }
            if let Some(previous) = stroke.switched_from() {
                self.layers.set_active_layer(previous);
            }
        }
    }
}
