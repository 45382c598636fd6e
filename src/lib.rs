//! paint-journal: command journaling and undo/redo for a layered raster
//! painting engine
//!
//! Every user action on a canvas is expressed as a [`Command`], applied to a
//! [`LayerStore`] by the [`Engine`], and appended to a binary command journal.
//! Bulky payloads such as blitted images go to a separate blob store. Undo
//! history is kept as compact before/after deltas, and edits whose result is
//! expensive to store are redone by replaying the journal instead.
//!
//! # Example
//!
//! ```
//! use paint_journal::{Canvas, Checkpoint, DocumentStreams, Engine, EngineConfig, LayerStore, SizePx};
//!
//! # fn main() -> paint_journal::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let streams = DocumentStreams::new(
//!     dir.path().join("journal.bin"),
//!     dir.path().join("blobs.bin"),
//!     Checkpoint::default(),
//! );
//! let mut engine = Engine::new(Canvas::new(1, SizePx::new(8, 8)), streams, &EngineConfig::new());
//! engine.open_streams()?;
//!
//! engine.clear_layer(0, 1.0, 0.0, 0.0, 1.0)?;
//! assert_eq!(engine.layers().layer_image(0).get_pixel(0, 0).0, [255, 0, 0, 255]);
//!
//! engine.undo()?;
//! assert_eq!(engine.layers().layer_image(0).get_pixel(0, 0).0, [0, 0, 0, 0]);
//!
//! // redone by re-executing the journaled clear
//! engine.redo()?;
//! assert_eq!(engine.layers().layer_image(0).get_pixel(0, 0).0, [255, 0, 0, 255]);
//! # Ok(())
//! # }
//! ```
//!
//! # Settings
//!
//! [`EngineConfig`] and [`DocumentDescription`] are plain serde types, so a
//! host can keep them as JSON:
//!
//! ```
//! use paint_journal::{EngineConfig, ToolSettings};
//!
//! let config = EngineConfig::new()
//!     .with_undo_max_depth(50)
//!     .with_default_tool(ToolSettings::soft_brush(12, 1.0, 0.1));
//! let json = config.to_json_pretty().unwrap();
//! assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
//! ```

mod blob;
mod command;
mod config;
mod document;
mod engine;
mod error;
mod journal;
mod layer;
mod rect;
mod segment;
mod store;
mod undo;
mod wire;

pub use blob::{BlobStore, IMAGE_SEGMENT};
pub use command::{
    BlitTransform, Color, Command, CommandKind, MAX_LAYERS, PatternTip, SoftTip, ToolMode,
    ToolSettings,
};
pub use config::{DocumentDescription, EngineConfig};
pub use document::{BLOB_FILE, DESCRIPTION_FILE, Document, JOURNAL_FILE};
pub use engine::{Dirty, EditHandle, Engine};
pub use error::{DecodeError, Error, InvariantViolation, Result, SegmentError};
pub use journal::{CommandJournal, JournalEntries};
pub use layer::{Canvas, Dab, LayerStore, source_over, to_pixel};
pub use rect::{RectPx, SizePx};
pub use segment::{SegmentHeader, SegmentStore};
pub use store::{Checkpoint, DocumentStreams};
pub use undo::{DEFAULT_MAX_BYTES, DEFAULT_MAX_DEPTH, ImagePatch, MAX_PATCHES, UndoBuffer, UndoRing, UndoState};
