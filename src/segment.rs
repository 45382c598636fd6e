//! Append-only store of length-prefixed, header-tagged segments.
//!
//! Bulk payloads that do not belong in the command journal (blitted images)
//! live here. Each segment is laid out as
//!
//! ```text
//! u32 segment_length | lps kind | lps name | payload
//! ```
//!
//! where `segment_length` counts every byte from the start of the length
//! field to the end of the payload, and `lps` is a `u32` byte length followed
//! by UTF-8 bytes. The length is written as a placeholder and back-patched
//! once the payload has been written.
//!
//! The store keeps its own logical cursor. Every operation seeks to it first,
//! so readers and writers never depend on where a previous call left the
//! underlying stream.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::SegmentError;
use crate::wire::{WireRead, WireWrite, prefixed_str_len};

/// Decoded header of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Stream offset of the length field.
    pub position: u64,
    pub kind: String,
    pub name: String,
    /// Total bytes, header included.
    pub segment_length: u32,
    pub payload_length: u32,
}

impl SegmentHeader {
    /// Offset one past the end of the segment.
    pub fn end(&self) -> u64 {
        self.position + self.segment_length as u64
    }

    fn payload_start(&self) -> u64 {
        self.end() - self.payload_length as u64
    }
}

/// Segment reader/writer over any seekable byte stream.
#[derive(Debug)]
pub struct SegmentStore<S> {
    stream: S,
    cursor: u64,
}

impl<S: Read + Write + Seek> SegmentStore<S> {
    /// Wraps `stream`, resuming at `cursor`.
    pub fn new(stream: S, cursor: u64) -> Self {
        Self { stream, cursor }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Writes one segment at the cursor.
    ///
    /// With `advance` the cursor moves past the new segment; otherwise it is
    /// restored, so the next read at the cursor returns this segment.
    pub fn write_segment(
        &mut self,
        kind: &str,
        name: &str,
        payload: &[u8],
        advance: bool,
    ) -> Result<SegmentHeader, SegmentError> {
        let start = self.cursor;
        let header_length = 4 + prefixed_str_len(kind) + prefixed_str_len(name);
        let total = header_length + payload.len() as u64;
        let segment_length = u32::try_from(total).map_err(|_| SegmentError::TooLarge(total))?;

        self.stream.seek(SeekFrom::Start(start))?;
        self.stream.write_u32_le(0)?;
        self.stream.write_prefixed_str(kind)?;
        self.stream.write_prefixed_str(name)?;
        self.stream.write_all(payload)?;
        let end = self.stream.stream_position()?;

        // back-patch the length now that the payload is down
        self.stream.seek(SeekFrom::Start(start))?;
        self.stream.write_u32_le(segment_length)?;
        self.stream.flush()?;

        if advance {
            self.cursor = end;
        }
        self.stream.seek(SeekFrom::Start(self.cursor))?;

        log::debug!(
            "wrote segment {kind:?}/{name:?} at {start}, {segment_length} bytes, cursor {}",
            self.cursor
        );

        Ok(SegmentHeader {
            position: start,
            kind: kind.to_owned(),
            name: name.to_owned(),
            segment_length,
            payload_length: payload.len() as u32,
        })
    }

    /// Reads the header of the segment at the cursor without moving the cursor.
    pub fn read_header(&mut self) -> Result<SegmentHeader, SegmentError> {
        let position = self.cursor;
        self.stream.seek(SeekFrom::Start(position))?;
        let segment_length = self.stream.read_u32_le()?;
        let kind = self.stream.read_prefixed_str()?;
        let name = self.stream.read_prefixed_str()?;

        let header_length = 4 + prefixed_str_len(&kind) + prefixed_str_len(&name);
        if (segment_length as u64) < header_length {
            return Err(SegmentError::LengthUnderflow {
                position,
                segment_length,
                header_length,
            });
        }

        Ok(SegmentHeader {
            position,
            kind,
            name,
            segment_length,
            payload_length: segment_length - header_length as u32,
        })
    }

    /// Reads the payload of `header` and moves the cursor past the segment.
    pub fn read_segment(&mut self, header: &SegmentHeader) -> Result<Vec<u8>, SegmentError> {
        self.stream.seek(SeekFrom::Start(header.payload_start()))?;
        let mut payload = vec![0; header.payload_length as usize];
        self.stream.read_exact(&mut payload)?;
        self.reposition(header)?;
        Ok(payload)
    }

    /// Moves the cursor past the segment without reading its payload.
    pub fn skip_segment(&mut self, header: &SegmentHeader) -> Result<(), SegmentError> {
        self.reposition(header)
    }

    fn reposition(&mut self, header: &SegmentHeader) -> Result<(), SegmentError> {
        self.cursor = header.end();
        self.stream.seek(SeekFrom::Start(self.cursor))?;
        Ok(())
    }
}
