//! The begin/end bracket around one reversible edit.

use super::Engine;
use crate::error::{InvariantViolation, Result};
use crate::layer::LayerStore;
use crate::rect::RectPx;
use crate::store::Checkpoint;
use crate::undo::{ImagePatch, UndoBuffer, UndoState};

/// A layer region an edit is about to change, or has changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dirty {
    pub layer: u32,
    pub rect: RectPx,
}

impl Dirty {
    pub fn new(layer: u32, rect: RectPx) -> Self {
        Self { layer, rect }
    }
}

/// The in-flight edit opened by [`Engine::begin_edit`].
///
/// Pass it back to [`Engine::end_edit`] to record the edit, or to
/// [`Engine::discard_edit`] to drop it. The engine refuses to open another
/// edit while this one is outstanding.
#[must_use = "an open edit must be ended or discarded"]
#[derive(Debug)]
pub struct EditHandle {
    id: u64,
    replay: bool,
    start: Checkpoint,
    buffer: UndoBuffer,
}

impl EditHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether redo rebuilds this edit from the journal.
    pub fn is_replay(&self) -> bool {
        self.replay
    }

    pub fn before_mut(&mut self) -> &mut UndoState {
        &mut self.buffer.before
    }

    pub fn after_mut(&mut self) -> &mut UndoState {
        &mut self.buffer.after
    }
}

impl<L: LayerStore> Engine<L> {
    /// Opens an edit.
    ///
    /// Captures the pixels under each of `dirty` if undo is enabled, and
    /// remembers the stream checkpoint the edit starts at. With `replay`, the
    /// edit's after side is left to be rebuilt from the journal on redo.
    pub fn begin_edit(&mut self, replay: bool, dirty: &[Dirty]) -> Result<EditHandle> {
        if self.open_edit.is_some() {
            return Err(InvariantViolation::ReentrantEdit.into());
        }

        let mut buffer = UndoBuffer::default();
        if replay {
            buffer.before.set_replay()?;
        }
        if self.undo_enabled {
            for region in dirty {
                if let Some(patch) = self.capture(region)? {
                    buffer.before.add_patch(patch)?;
                }
            }
        }

        let id = self.next_edit;
        self.next_edit += 1;
        self.open_edit = Some(id);
        log::debug!("begin edit {id}{}", if replay { " (replay)" } else { "" });

        Ok(EditHandle {
            id,
            replay,
            start: self.streams.checkpoint(),
            buffer,
        })
    }

    /// Closes an edit and pushes it onto the undo ring.
    ///
    /// Stream checkpoints are recorded for whichever streams moved since the
    /// edit began. Pixels under each of `dirty` are captured for the after
    /// side. With undo disabled the edit is dropped instead.
    pub fn end_edit(&mut self, handle: EditHandle, dirty: &[Dirty]) -> Result<()> {
        self.close_edit(&handle)?;
        let EditHandle {
            id,
            replay,
            start,
            mut buffer,
        } = handle;

        if self.write_enabled {
            let end = self.streams.checkpoint();
            if end.journal != start.journal {
                buffer.before.set_journal(start.journal)?;
                buffer.after.set_journal(end.journal)?;
                if replay {
                    buffer.after.set_replay()?;
                }
            }
            if end.blob != start.blob {
                buffer.before.set_blob(start.blob)?;
                buffer.after.set_blob(end.blob)?;
            }
        }

        if !self.undo_enabled {
            log::debug!("end edit {id}, undo disabled");
            return Ok(());
        }
        for region in dirty {
            if let Some(patch) = self.capture(region)? {
                buffer.after.add_patch(patch)?;
            }
        }

        log::debug!("end edit {id}, {} bytes", buffer.memory_size());
        self.ring.commit(buffer);
        Ok(())
    }

    /// Closes an edit without recording anything.
    pub fn discard_edit(&mut self, handle: EditHandle) -> Result<()> {
        self.close_edit(&handle)?;
        log::debug!("discard edit {}", handle.id);
        Ok(())
    }

    fn close_edit(&mut self, handle: &EditHandle) -> Result<(), InvariantViolation> {
        if self.open_edit != Some(handle.id) {
            return Err(InvariantViolation::StaleEditHandle(handle.id));
        }
        self.open_edit = None;
        Ok(())
    }

    /// Copies a layer region out for the undo history. Regions that fall
    /// entirely outside the canvas capture nothing.
    fn capture(&self, region: &Dirty) -> Result<Option<ImagePatch>, InvariantViolation> {
        self.check_layer(region.layer)?;
        let Some(rect) = region.rect.clip_to(self.layers.size()) else {
            return Ok(None);
        };
        let pixels = self.layers.copy_region(region.layer, rect);
        Ok(Some(ImagePatch::new(region.layer, rect, pixels)))
    }

    /// Runs `body` inside an edit, commits the journal queue, and ends the edit.
    ///
    /// If `body` or the commit fails, the edit and the queue are discarded
    /// and the error is returned.
    pub(super) fn bracketed(
        &mut self,
        replay: bool,
        before: &[Dirty],
        after: &[Dirty],
        body: impl FnOnce(&mut Self, &mut EditHandle) -> Result<()>,
    ) -> Result<()> {
        let mut handle = self.begin_edit(replay, before)?;
        let result = match body(self, &mut handle) {
            Ok(()) => self.commit(),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.discard();
            self.discard_edit(handle)?;
            return Err(err);
        }
        self.end_edit(handle, after)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::tests::{engine, rgba};
    use crate::engine::Dirty;
    use crate::error::{Error, InvariantViolation};
    use crate::layer::LayerStore;
    use crate::rect::RectPx;

    #[test]
    fn second_begin_is_reentrant() {
        let (_dir, mut engine) = engine(1, 4, 4);
        let handle = engine.begin_edit(false, &[]).unwrap();
        assert!(matches!(
            engine.begin_edit(false, &[]).unwrap_err(),
            Error::Invariant(InvariantViolation::ReentrantEdit)
        ));
        engine.discard_edit(handle).unwrap();
        let again = engine.begin_edit(false, &[]).unwrap();
        engine.end_edit(again, &[]).unwrap();
    }

    #[test]
    fn stale_handle_is_rejected() {
        let (_dir, mut engine) = engine(1, 4, 4);
        let first = engine.begin_edit(false, &[]).unwrap();
        let id = first.id();
        engine.end_edit(first, &[]).unwrap();

        let second = engine.begin_edit(false, &[]).unwrap();
        let forged = super::EditHandle {
            id,
            replay: false,
            start: Default::default(),
            buffer: Default::default(),
        };
        assert!(matches!(
            engine.end_edit(forged, &[]).unwrap_err(),
            Error::Invariant(InvariantViolation::StaleEditHandle(i)) if i == id
        ));
        engine.discard_edit(second).unwrap();
    }

    #[test]
    fn patches_capture_clipped_region() {
        let (_dir, mut engine) = engine(2, 4, 4);
        engine.layers_mut().clear_layer(1, rgba(9, 9, 9, 255));

        let handle = engine
            .begin_edit(false, &[Dirty::new(1, RectPx::new(2, 2, 10, 10))])
            .unwrap();
        engine.end_edit(handle, &[]).unwrap();

        let buffer = engine.undo_ring().undo_buffer().unwrap();
        let patch = &buffer.before.patches()[0];
        assert_eq!(patch.rect, RectPx::new(2, 2, 2, 2));
        assert_eq!(patch.pixels.get_pixel(0, 0), &rgba(9, 9, 9, 255));
        assert!(buffer.after.patches().is_empty());
        assert_eq!(buffer.before.journal(), None);
    }

    #[test]
    fn capture_checks_layer_index() {
        let (_dir, mut engine) = engine(1, 4, 4);
        let err = engine
            .begin_edit(false, &[Dirty::new(3, RectPx::new(0, 0, 1, 1))])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Invariant(InvariantViolation::LayerOutOfRange { index: 3, count: 1 })
        ));
        // nothing was opened
        let handle = engine.begin_edit(false, &[]).unwrap();
        engine.discard_edit(handle).unwrap();
    }

    #[test]
    fn disabled_undo_records_nothing() {
        let (_dir, mut engine) = engine(1, 4, 4);
        engine.set_undo_enabled(false);
        let handle = engine
            .begin_edit(false, &[Dirty::new(0, RectPx::new(0, 0, 4, 4))])
            .unwrap();
        engine.end_edit(handle, &[]).unwrap();
        assert!(!engine.has_undo());
    }
}
