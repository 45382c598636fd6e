//! Serializable engine settings and document descriptions.
//!
//! Both types use camelCase JSON so a host process can hand them over as-is.
//!
//! # Example
//!
//! ```
//! use paint_journal::{EngineConfig, ToolSettings};
//!
//! let config = EngineConfig::new()
//!     .with_undo_max_bytes(8 * 1024 * 1024)
//!     .with_default_tool(ToolSettings::soft_eraser(20, 0.5, 0.1));
//!
//! let json = config.to_json().unwrap();
//! let restored = EngineConfig::from_json(&json).unwrap();
//! assert_eq!(restored.undo_max_bytes, 8 * 1024 * 1024);
//! ```

use palette::Srgba;
use serde::{Deserialize, Serialize};

use crate::command::{Color, ToolSettings, normalize_color};
use crate::store::Checkpoint;
use crate::undo::{DEFAULT_MAX_BYTES, DEFAULT_MAX_DEPTH};

fn default_true() -> bool {
    true
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}

fn default_max_depth() -> Option<usize> {
    Some(DEFAULT_MAX_DEPTH)
}

fn default_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_tool() -> ToolSettings {
    ToolSettings::soft_brush(31, 0.8, 0.05)
}

// ============================================================================
// EngineConfig
// ============================================================================

/// Start-up settings of an [`Engine`](crate::Engine).
///
/// # JSON Format
///
/// ```json
/// {
///   "undoEnabled": true,
///   "writeEnabled": true,
///   "undoMaxBytes": 67108864,
///   "defaultColor": [0.0, 0.0, 0.0, 1.0],
///   "defaultTool": { "tool": "softBrush", "diameter": 31, "hardness": 0.8, "spacing": 0.05 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Record undo buffers for edits.
    #[serde(default = "default_true")]
    pub undo_enabled: bool,

    /// Journal executed commands.
    #[serde(default = "default_true")]
    pub write_enabled: bool,

    /// Estimated byte ceiling of the undo history.
    #[serde(default = "default_max_bytes")]
    pub undo_max_bytes: usize,

    /// Cap on the number of undo steps. `null` leaves only the byte budget.
    #[serde(default = "default_max_depth")]
    pub undo_max_depth: Option<usize>,

    /// Straight RGBA color selected before the first color command.
    #[serde(default = "default_color")]
    pub default_color: [f32; 4],

    /// Tool selected before the first tool command.
    #[serde(default = "default_tool")]
    pub default_tool: ToolSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_enabled: true,
            write_enabled: true,
            undo_max_bytes: DEFAULT_MAX_BYTES,
            undo_max_depth: default_max_depth(),
            default_color: default_color(),
            default_tool: default_tool(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_undo_enabled(mut self, enabled: bool) -> Self {
        self.undo_enabled = enabled;
        self
    }

    pub fn with_write_enabled(mut self, enabled: bool) -> Self {
        self.write_enabled = enabled;
        self
    }

    pub fn with_undo_max_bytes(mut self, max_bytes: usize) -> Self {
        self.undo_max_bytes = max_bytes;
        self
    }

    pub fn with_undo_max_depth(mut self, max_depth: usize) -> Self {
        self.undo_max_depth = Some(max_depth);
        self
    }

    /// Bounds the undo history by its byte budget alone.
    pub fn without_undo_max_depth(mut self) -> Self {
        self.undo_max_depth = None;
        self
    }

    pub fn with_default_color(mut self, rgba: [f32; 4]) -> Self {
        self.default_color = rgba;
        self
    }

    pub fn with_default_tool(mut self, tool: ToolSettings) -> Self {
        self.default_tool = tool;
        self
    }

    /// The default color as a clamped [`Color`].
    pub fn color(&self) -> Color {
        let [r, g, b, a] = self.default_color;
        normalize_color(Srgba::new(r, g, b, a))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// DocumentDescription
// ============================================================================

/// What a host persists to resume a document: the canvas shape and the
/// stream cursors at the last save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescription {
    pub layer_count: u32,
    pub width: u32,
    pub height: u32,
    pub journal_cursor: u64,
    pub blob_cursor: u64,
}

impl DocumentDescription {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            journal: self.journal_cursor,
            blob: self.blob_cursor,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Tests
// ============================================================================
