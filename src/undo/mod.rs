//! Delta capture and the undo history.
//!
//! An edit is recorded as an [`UndoBuffer`]: the [`UndoState`] before it and
//! the one after it. States carry only what the edit touched (pixel patches
//! of the dirty region, a layer's opacity, stream checkpoints) rather than
//! canvas snapshots. An after state may instead carry a replay marker, in
//! which case redo rebuilds it by re-executing the journaled commands between
//! the two journal checkpoints.
//!
//! Buffers live in an [`UndoRing`] bounded by an estimated byte budget.

mod ring;
mod state;

pub use ring::UndoRing;
pub use state::{ImagePatch, MAX_PATCHES, UndoBuffer, UndoState};

/// Default undo byte budget.
pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Default cap on the number of undo steps.
pub const DEFAULT_MAX_DEPTH: usize = 10;
