//! The execution engine.
//!
//! [`Engine`] turns commands into effects on a [`LayerStore`], journals them,
//! and records undo deltas. It works at three levels:
//!
//! - **Execution.** [`Engine::execute`] applies one command immediately.
//!   [`Engine::execute_and_save`] does the same and queues the command for the
//!   journal. [`Engine::commit`] flushes the queue at the journal cursor and
//!   [`Engine::discard`] drops it. Discarding never rolls back effects that
//!   were already applied; that is the caller's job.
//! - **Edits.** [`Engine::begin_edit`] and [`Engine::end_edit`] bracket one
//!   reversible edit and push its [`UndoBuffer`](crate::undo::UndoBuffer)
//!   onto the ring. At most one edit is open at a time.
//! - **Intents.** User-level operations such as [`Engine::stroke_end`] or
//!   [`Engine::set_layer_opacity`] combine the two, and [`Engine::undo`] /
//!   [`Engine::redo`] walk the history.
//!
//! # Example
//!
//! ```no_run
//! use paint_journal::{Canvas, Checkpoint, DocumentStreams, Engine, EngineConfig, SizePx};
//!
//! # fn main() -> paint_journal::Result<()> {
//! let streams = DocumentStreams::new("doc/journal.bin", "doc/blobs.bin", Checkpoint::default());
//! let mut engine = Engine::new(Canvas::new(2, SizePx::new(256, 256)), streams, &EngineConfig::new());
//! engine.open_streams()?;
//!
//! engine.clear_layer(0, 1.0, 1.0, 1.0, 1.0)?;
//! engine.color_select(1.0, 0.0, 0.0, 1.0)?;
//! engine.stroke_begin(0, false, false, 10.0, 10.0)?;
//! engine.stroke_move(80.0, 40.0)?;
//! engine.stroke_end()?;
//!
//! engine.undo()?;
//! engine.redo()?;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod edit;
mod history;
mod intents;
mod stroke;

pub use edit::{Dirty, EditHandle};

use crate::command::{Color, Command, ToolSettings};
use crate::config::EngineConfig;
use crate::error::{InvariantViolation, Result};
use crate::layer::LayerStore;
use crate::store::{Checkpoint, DocumentStreams};
use crate::undo::UndoRing;

use stroke::Stroke;

// ============================================================================
// Engine
// ============================================================================

/// Command execution, journaling and undo for one document.
pub struct Engine<L> {
    layers: L,
    streams: DocumentStreams,
    ring: UndoRing,

    undo_enabled: bool,
    write_enabled: bool,

    /// Commands executed since the last commit or discard.
    pending: Vec<Command>,

    color: Color,
    tool: ToolSettings,
    stroke: Option<Stroke>,

    open_edit: Option<u64>,
    next_edit: u64,
}

impl<L: LayerStore> Engine<L> {
    pub fn new(layers: L, streams: DocumentStreams, config: &EngineConfig) -> Self {
        Self {
            layers,
            streams,
            ring: UndoRing::new(config.undo_max_bytes, config.undo_max_depth),
            undo_enabled: config.undo_enabled,
            write_enabled: config.write_enabled,
            pending: Vec::new(),
            color: config.color(),
            tool: config.default_tool.normalized(),
            stroke: None,
            open_edit: None,
            next_edit: 0,
        }
    }

    pub fn layers(&self) -> &L {
        &self.layers
    }

    /// Direct access to the layer store. Changes made here bypass the
    /// journal and the undo history.
    pub fn layers_mut(&mut self) -> &mut L {
        &mut self.layers
    }

    pub fn streams(&self) -> &DocumentStreams {
        &self.streams
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.streams.checkpoint()
    }

    pub fn undo_ring(&self) -> &UndoRing {
        &self.ring
    }

    pub fn undo_enabled(&self) -> bool {
        self.undo_enabled
    }

    pub fn set_undo_enabled(&mut self, enabled: bool) {
        log::info!("undo capture {}", if enabled { "enabled" } else { "disabled" });
        self.undo_enabled = enabled;
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    pub fn set_write_enabled(&mut self, enabled: bool) {
        log::info!("journal writing {}", if enabled { "enabled" } else { "disabled" });
        self.write_enabled = enabled;
    }

    /// The standing color used by strokes.
    pub fn color(&self) -> Color {
        self.color
    }

    /// The standing tool used by strokes.
    pub fn tool(&self) -> ToolSettings {
        self.tool
    }

    pub fn is_stroke_active(&self) -> bool {
        self.stroke.is_some()
    }

    /// Number of executed commands waiting for [`Engine::commit`].
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn open_streams(&mut self) -> Result<()> {
        self.streams.open()
    }

    pub fn close_streams(&mut self) -> Result<()> {
        self.streams.close()
    }

    pub fn into_parts(self) -> (L, DocumentStreams) {
        (self.layers, self.streams)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Applies `command` without journaling it.
    pub fn execute(&mut self, command: &Command) -> Result<()> {
        log::debug!("execute {}", command.kind());
        self.dispatch(command)
    }

    /// Applies `command` and, if writing is enabled, queues it for the next
    /// commit. A command that fails to execute is not queued.
    pub fn execute_and_save(&mut self, command: Command) -> Result<()> {
        self.execute(&command)?;
        if self.write_enabled {
            self.pending.push(command);
        }
        Ok(())
    }

    /// Writes queued commands to the journal at its cursor.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if !self.write_enabled {
            self.pending.clear();
            return Ok(());
        }
        self.streams.append(&self.pending)?;
        log::debug!("committed {} commands", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    /// Drops queued commands. Their effects stay applied.
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("discarded {} commands", self.pending.len());
            self.pending.clear();
        }
    }

    /// Fails unless no edit or stroke is in progress.
    fn ensure_idle(&self) -> Result<(), InvariantViolation> {
        if self.open_edit.is_some() {
            return Err(InvariantViolation::ReentrantEdit);
        }
        if self.stroke.is_some() {
            return Err(InvariantViolation::StrokeActive);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
