//! Error taxonomy.
//!
//! Decode failures and contract breaches are fatal to the operation that hit
//! them: they are returned to the caller and never retried or papered over.
//! Capacity pressure on the undo ring and disabled features are not errors.

use std::io;

use crate::command::CommandKind;

/// A command could not be read back from its wire form.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown command type: {0}")]
    UnknownKind(i8),
    #[error("unknown command version: {version}. command type={kind}")]
    UnknownVersion { kind: CommandKind, version: i8 },
    #[error("layer order has {count} entries, more than the maximum of {max}")]
    LayerOrderTooLong { count: u32, max: u32 },
    #[error("{0} trailing bytes after command")]
    TrailingBytes(usize),
    #[error("truncated command")]
    Io(#[from] io::Error),
}

/// A caller broke the engine's contract.
///
/// These indicate a programming error in the caller, not a runtime condition
/// that could be recovered from.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("{stream} cursor mismatch: logical {logical}, physical {physical}")]
    CursorMismatch {
        stream: &'static str,
        logical: u64,
        physical: u64,
    },
    #[error("undo state field `{0}` is already set")]
    FieldAlreadySet(&'static str),
    #[error("an undo state holds at most two image patches")]
    TooManyPatches,
    #[error("an edit is already open")]
    ReentrantEdit,
    #[error("edit handle {0} does not belong to the open edit")]
    StaleEditHandle(u64),
    #[error("{0} is already open")]
    StreamAlreadyOpen(&'static str),
    #[error("{0} is not open")]
    StreamNotOpen(&'static str),
    #[error("a stroke is already in progress")]
    StrokeActive,
    #[error("no stroke is in progress")]
    NoStroke,
    #[error("layer index {index} out of range ({count} layers)")]
    LayerOutOfRange { index: u32, count: u32 },
    #[error("layer order {0:?} is not a permutation of the layers")]
    InvalidLayerOrder(Vec<u32>),
    #[error("cannot merge layer {0} into itself")]
    MergeIntoSelf(u32),
    #[error("canvas must have at least one layer and a non-empty size")]
    EmptyCanvas,
    #[error("{count} layers requested, more than the maximum of {max}")]
    TooManyLayers { count: u32, max: u32 },
}

/// Failure reading or writing the segment store.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("segment at {position} declares length {segment_length}, shorter than its {header_length}-byte header")]
    LengthUnderflow {
        position: u64,
        segment_length: u32,
        header_length: u64,
    },
    #[error("segment payload of {0} bytes does not fit a u32 length")]
    TooLarge(u64),
    #[error("expected a `{expected}` segment, found `{found}`")]
    UnexpectedKind {
        expected: &'static str,
        found: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Top-level error for engine and document operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error("image payload: {0}")]
    Image(#[from] image::ImageError),
    #[error("document description: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
