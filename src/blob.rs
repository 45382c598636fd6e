//! File-backed segment store for bulk payloads.
//!
//! Unlike the journal, the blob file is never held open between calls. Each
//! operation opens a handle, runs against a [`SegmentStore`] positioned at the
//! logical cursor, and drops the handle on every exit path.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::segment::{SegmentHeader, SegmentStore};

/// Segment kind of an encoded layer image.
pub const IMAGE_SEGMENT: &str = "image_png";

#[derive(Debug)]
pub struct BlobStore {
    path: PathBuf,
    cursor: u64,
}

impl BlobStore {
    pub fn new(path: impl Into<PathBuf>, cursor: u64) -> Self {
        Self {
            path: path.into(),
            cursor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn seek(&mut self, cursor: u64) {
        self.cursor = cursor;
    }

    /// Writes a segment at the cursor. See [`SegmentStore::write_segment`].
    pub fn write_segment(
        &mut self,
        kind: &str,
        name: &str,
        payload: &[u8],
        advance: bool,
    ) -> Result<SegmentHeader> {
        self.with_store(|store| Ok(store.write_segment(kind, name, payload, advance)?))
    }

    /// Reads the segment at the cursor and advances past it.
    pub fn read_segment(&mut self) -> Result<(SegmentHeader, Vec<u8>)> {
        self.with_store(|store| {
            let header = store.read_header()?;
            let payload = store.read_segment(&header)?;
            Ok((header, payload))
        })
    }

    /// Advances past the segment at the cursor.
    pub fn skip_segment(&mut self) -> Result<SegmentHeader> {
        self.with_store(|store| {
            let header = store.read_header()?;
            store.skip_segment(&header)?;
            Ok(header)
        })
    }

    fn with_store<T>(
        &mut self,
        op: impl FnOnce(&mut SegmentStore<File>) -> Result<T>,
    ) -> Result<T> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let mut store = SegmentStore::new(file, self.cursor);
        let result = op(&mut store);
        // a failed op may have moved the store's cursor part way
        if result.is_ok() {
            self.cursor = store.cursor();
        }
        result
    }
}
