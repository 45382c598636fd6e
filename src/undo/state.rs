//! One side of a reversible edit.

use image::RgbaImage;

use crate::error::InvariantViolation;
use crate::rect::RectPx;

/// Fixed bookkeeping cost charged to every state, on top of its payloads.
const STATE_OVERHEAD: usize = 64;

/// Pixels of one layer region, copied before or after an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePatch {
    pub layer: u32,
    pub rect: RectPx,
    pub pixels: RgbaImage,
}

impl ImagePatch {
    pub fn new(layer: u32, rect: RectPx, pixels: RgbaImage) -> Self {
        Self {
            layer,
            rect,
            pixels,
        }
    }

    pub fn memory_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// Everything needed to put the document back into the state on one side
/// of an edit.
///
/// Each field may be set at most once. Setting one twice means two pieces of
/// code believe they own the same part of the delta, and is reported as an
/// [`InvariantViolation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndoState {
    patches: Vec<ImagePatch>,
    journal: Option<u64>,
    blob: Option<u64>,
    layer_order: Option<Vec<u32>>,
    opacity: Option<(u32, f32)>,
    visibility: Option<(u32, bool)>,
    active_layer: Option<u32>,
    replay: bool,
}

/// Most image patches a single state carries (a merge touches two layers).
pub const MAX_PATCHES: usize = 2;

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), InvariantViolation> {
    if slot.is_some() {
        return Err(InvariantViolation::FieldAlreadySet(field));
    }
    *slot = Some(value);
    Ok(())
}

impl UndoState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patch(&mut self, patch: ImagePatch) -> Result<(), InvariantViolation> {
        if self.patches.len() >= MAX_PATCHES {
            return Err(InvariantViolation::TooManyPatches);
        }
        if self.patches.iter().any(|p| p.layer == patch.layer) {
            return Err(InvariantViolation::FieldAlreadySet("image patch"));
        }
        self.patches.push(patch);
        Ok(())
    }

    pub fn set_journal(&mut self, cursor: u64) -> Result<(), InvariantViolation> {
        set_once(&mut self.journal, cursor, "journal checkpoint")
    }

    pub fn set_blob(&mut self, cursor: u64) -> Result<(), InvariantViolation> {
        set_once(&mut self.blob, cursor, "blob checkpoint")
    }

    pub fn set_layer_order(&mut self, order: Vec<u32>) -> Result<(), InvariantViolation> {
        set_once(&mut self.layer_order, order, "layer order")
    }

    pub fn set_opacity(&mut self, layer: u32, opacity: f32) -> Result<(), InvariantViolation> {
        set_once(&mut self.opacity, (layer, opacity), "layer opacity")
    }

    pub fn set_visibility(&mut self, layer: u32, visible: bool) -> Result<(), InvariantViolation> {
        set_once(&mut self.visibility, (layer, visible), "layer visibility")
    }

    pub fn set_active_layer(&mut self, layer: u32) -> Result<(), InvariantViolation> {
        set_once(&mut self.active_layer, layer, "active layer")
    }

    /// Marks this state as reachable only by replaying the journal.
    pub fn set_replay(&mut self) -> Result<(), InvariantViolation> {
        if self.replay {
            return Err(InvariantViolation::FieldAlreadySet("replay marker"));
        }
        self.replay = true;
        Ok(())
    }

    pub fn patches(&self) -> &[ImagePatch] {
        &self.patches
    }

    pub fn journal(&self) -> Option<u64> {
        self.journal
    }

    pub fn blob(&self) -> Option<u64> {
        self.blob
    }

    pub fn layer_order(&self) -> Option<&[u32]> {
        self.layer_order.as_deref()
    }

    pub fn opacity(&self) -> Option<(u32, f32)> {
        self.opacity
    }

    pub fn visibility(&self) -> Option<(u32, bool)> {
        self.visibility
    }

    pub fn active_layer(&self) -> Option<u32> {
        self.active_layer
    }

    pub fn is_replay(&self) -> bool {
        self.replay
    }

    /// Approximate heap footprint, used for the undo byte budget.
    pub fn memory_size(&self) -> usize {
        let patches: usize = self.patches.iter().map(ImagePatch::memory_size).sum();
        let order = self
            .layer_order
            .as_ref()
            .map_or(0, |order| order.len() * size_of::<u32>());
        STATE_OVERHEAD + patches + order
    }
}

/// The `(before, after)` pair for one edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndoBuffer {
    pub before: UndoState,
    pub after: UndoState,
}

impl UndoBuffer {
    pub fn memory_size(&self) -> usize {
        self.before.memory_size() + self.after.memory_size()
    }
}
