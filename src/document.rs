//! A document on disk: a directory holding the journal, the blob store and a
//! description of where both cursors stand.
//!
//! # Example
//!
//! ```no_run
//! use paint_journal::{Canvas, Document, EngineConfig, SizePx};
//!
//! # fn main() -> paint_journal::Result<()> {
//! let config = EngineConfig::new();
//! let mut document = Document::create("drawing", Canvas::new(1, SizePx::new(1, 1)), 3, 640, 480, &config)?;
//! document.engine_mut().clear_layer(0, 1.0, 1.0, 1.0, 1.0)?;
//! document.save_description()?;
//! document.close_streams()?;
//!
//! let description = Document::<Canvas>::load_description("drawing")?;
//! let reopened = Document::open("drawing", Canvas::new(1, SizePx::new(1, 1)), &config, &description)?;
//! assert_eq!(reopened.describe(), description);
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DocumentDescription, EngineConfig};
use crate::engine::Engine;
use crate::error::Result;
use crate::layer::LayerStore;
use crate::store::{Checkpoint, DocumentStreams};

pub const JOURNAL_FILE: &str = "journal.bin";
pub const BLOB_FILE: &str = "blobs.bin";
pub const DESCRIPTION_FILE: &str = "description.json";

pub struct Document<L> {
    dir: PathBuf,
    engine: Engine<L>,
}

impl<L: LayerStore> Document<L> {
    /// Creates a new document in `dir` with empty streams.
    ///
    /// The canvas shape is journaled as the first command, so a document
    /// always replays into the right shape.
    pub fn create(
        dir: impl Into<PathBuf>,
        layers: L,
        layer_count: u32,
        width: u32,
        height: u32,
        config: &EngineConfig,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        for name in [JOURNAL_FILE, BLOB_FILE] {
            fs::File::create(dir.join(name))?;
        }

        let streams = DocumentStreams::new(dir.join(JOURNAL_FILE), dir.join(BLOB_FILE), Checkpoint::default());
        let mut engine = Engine::new(layers, streams, config);
        engine.open_streams()?;
        engine.resize_canvas(layer_count, width, height)?;
        log::info!("created document in {}", dir.display());
        Ok(Self { dir, engine })
    }

    /// Reopens the document in `dir` and rebuilds `layers` by replaying the
    /// journal up to the cursors in `description`.
    pub fn open(
        dir: impl Into<PathBuf>,
        layers: L,
        config: &EngineConfig,
        description: &DocumentDescription,
    ) -> Result<Self> {
        let dir = dir.into();
        let streams = DocumentStreams::new(dir.join(JOURNAL_FILE), dir.join(BLOB_FILE), Checkpoint::default());
        let mut engine = Engine::new(layers, streams, config);
        engine.open_streams()?;
        engine.replay_until(description.checkpoint())?;
        log::info!(
            "opened document in {} at journal {}",
            dir.display(),
            description.journal_cursor
        );
        Ok(Self { dir, engine })
    }

    /// The document's current shape and stream positions.
    pub fn describe(&self) -> DocumentDescription {
        let size = self.engine.layers().size();
        let checkpoint = self.engine.checkpoint();
        DocumentDescription {
            layer_count: self.engine.layers().layer_count(),
            width: size.width,
            height: size.height,
            journal_cursor: checkpoint.journal,
            blob_cursor: checkpoint.blob,
        }
    }

    /// Writes [`Document::describe`] next to the streams.
    pub fn save_description(&self) -> Result<()> {
        let json = self.describe().to_json_pretty()?;
        fs::write(self.dir.join(DESCRIPTION_FILE), json)?;
        Ok(())
    }

    pub fn load_description(dir: impl AsRef<Path>) -> Result<DocumentDescription> {
        let json = fs::read_to_string(dir.as_ref().join(DESCRIPTION_FILE))?;
        Ok(DocumentDescription::from_json(&json)?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn engine(&self) -> &Engine<L> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<L> {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine<L> {
        self.engine
    }

    pub fn open_streams(&mut self) -> Result<()> {
        self.engine.open_streams()
    }

    pub fn close_streams(&mut self) -> Result<()> {
        self.engine.close_streams()
    }
}
