//! Append-only, seekable command journal.
//!
//! The journal is a flat file of encoded commands. Its logical cursor is the
//! single source of truth for where the next command is written or read:
//! undo seeks it backwards, redo replays forward from it, and a flush
//! truncates whatever stale tail lies beyond it before appending.
//!
//! The cursor outlives the file handle. Closing and reopening the journal
//! resumes at the same cursor, and the physical position is checked against
//! it before every read and write.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::error::{DecodeError, InvariantViolation, Result};

const STREAM_NAME: &str = "command journal";

/// Command log backed by a file.
#[derive(Debug)]
pub struct CommandJournal {
    path: PathBuf,
    cursor: u64,
    file: Option<File>,
}

impl CommandJournal {
    /// Creates a closed journal for `path` that will resume at `cursor`.
    pub fn new(path: impl Into<PathBuf>, cursor: u64) -> Self {
        Self {
            path: path.into(),
            cursor,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Opens the file for reading and writing and positions it at the cursor.
    ///
    /// Not opened in append mode: undo moves the write position backwards.
    pub fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Err(InvariantViolation::StreamAlreadyOpen(STREAM_NAME).into());
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.seek(SeekFrom::Start(self.cursor))?;
        log::info!("opened {} at {}", self.path.display(), self.cursor);
        self.file = Some(file);
        Ok(())
    }

    /// Flushes and drops the handle. The cursor is kept.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            log::info!("closed {} at {}", self.path.display(), self.cursor);
        }
        Ok(())
    }

    /// Moves the cursor, and the file position if open.
    pub fn seek(&mut self, cursor: u64) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(cursor))?;
        }
        self.cursor = cursor;
        Ok(())
    }

    /// Appends `commands` at the cursor, discarding any tail beyond it.
    pub fn append(&mut self, commands: &[Command]) -> Result<()> {
        let cursor = self.cursor;
        let file = self.checked_file()?;

        let mut bytes = Vec::new();
        for command in commands {
            command.write_to(&mut bytes)?;
        }

        file.set_len(cursor)?;
        file.write_all(&bytes)?;
        file.flush()?;
        self.cursor += bytes.len() as u64;

        log::debug!(
            "journaled {} commands, {} bytes, cursor {}",
            commands.len(),
            bytes.len(),
            self.cursor
        );
        Ok(())
    }

    /// Reads the command at the cursor and advances past it.
    ///
    /// A command that fails to decode leaves the cursor, and the file
    /// position with it, where the command starts.
    pub fn read_command(&mut self) -> Result<Command> {
        let cursor = self.cursor;
        let file = self.checked_file()?;
        match Command::read_from(file) {
            Ok(command) => {
                self.cursor = file.stream_position()?;
                Ok(command)
            }
            Err(err) => {
                file.seek(SeekFrom::Start(cursor))?;
                Err(err.into())
            }
        }
    }

    fn checked_file(&mut self) -> Result<&mut File> {
        let file = self
            .file
            .as_mut()
            .ok_or(InvariantViolation::StreamNotOpen(STREAM_NAME))?;
        let physical = file.stream_position()?;
        if physical != self.cursor {
            return Err(InvariantViolation::CursorMismatch {
                stream: STREAM_NAME,
                logical: self.cursor,
                physical,
            }
            .into());
        }
        Ok(file)
    }
}

impl Drop for CommandJournal {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to close {}: {err}", self.path.display());
        }
    }
}

// ============================================================================
// Offline reading
// ============================================================================

/// Iterator over `(offset, command)` pairs of an in-memory journal image.
///
/// Stops after the first decode error.
pub struct JournalEntries<'a> {
    cursor: Cursor<&'a [u8]>,
    failed: bool,
}

impl<'a> JournalEntries<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            failed: false,
        }
    }
}

impl Iterator for JournalEntries<'_> {
    type Item = Result<(u64, Command), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.cursor.position();
        if self.failed || offset >= self.cursor.get_ref().len() as u64 {
            return None;
        }
        match Command::read_from(&mut self.cursor) {
            Ok(command) => Some(Ok((offset, command))),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
