//! The pair of persistent streams behind one document.

use std::path::Path;

use crate::blob::BlobStore;
use crate::command::Command;
use crate::error::Result;
use crate::journal::CommandJournal;
use crate::segment::SegmentHeader;

/// Positions of both streams at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checkpoint {
    pub journal: u64,
    pub blob: u64,
}

/// The command journal and the blob store, moved together.
#[derive(Debug)]
pub struct DocumentStreams {
    journal: CommandJournal,
    blobs: BlobStore,
}

impl DocumentStreams {
    /// Streams for the given files, resuming at `at`. Nothing is opened yet.
    pub fn new(journal_path: impl AsRef<Path>, blob_path: impl AsRef<Path>, at: Checkpoint) -> Self {
        Self {
            journal: CommandJournal::new(journal_path.as_ref(), at.journal),
            blobs: BlobStore::new(blob_path.as_ref(), at.blob),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            journal: self.journal.cursor(),
            blob: self.blobs.cursor(),
        }
    }

    pub fn journal(&self) -> &CommandJournal {
        &self.journal
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn open(&mut self) -> Result<()> {
        self.journal.open()
    }

    pub fn close(&mut self) -> Result<()> {
        self.journal.close()
    }

    pub fn is_open(&self) -> bool {
        self.journal.is_open()
    }

    pub fn seek_journal(&mut self, cursor: u64) -> Result<()> {
        self.journal.seek(cursor)
    }

    pub fn seek_blob(&mut self, cursor: u64) {
        self.blobs.seek(cursor);
    }

    pub fn append(&mut self, commands: &[Command]) -> Result<()> {
        self.journal.append(commands)
    }

    pub fn read_command(&mut self) -> Result<Command> {
        self.journal.read_command()
    }

    /// Stages a payload at the blob cursor for the next command that reads one.
    pub fn stage_blob(&mut self, kind: &str, payload: &[u8]) -> Result<SegmentHeader> {
        self.blobs.write_segment(kind, "", payload, false)
    }

    /// Consumes the blob at the cursor.
    pub fn take_blob(&mut self) -> Result<(SegmentHeader, Vec<u8>)> {
        self.blobs.read_segment()
    }
}
