//! Editing commands.
//!
//! A [`Command`] is one editing operation in the form it is executed, queued
//! and journaled. Commands are transient values: the engine builds them from
//! user intents, executes them, and (optionally) serializes them with the
//! codec in [`codec`]. Nothing holds on to a live command graph.
//!
//! Every constructor normalizes its inputs into valid domain ranges, and the
//! encoder applies the same normalization again before writing, so a command
//! read back from a journal is always in range.

pub mod codec;

use palette::{Clamp, Srgba};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use codec::MAX_LAYERS;

/// Straight-alpha color with float components in `[0, 1]`.
pub type Color = Srgba<f32>;

// ============================================================================
// CommandKind
// ============================================================================

/// Wire tag of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    ColorSelect,
    CanvasResize,
    LayerBlit,
    LayerClear,
    LayerMerge,
    LayerSelect,
    LayerOpacity,
    LayerOrder,
    LayerVisibility,
    StrokeBegin,
    StrokeMove,
    StrokeEnd,
    ToolSoftBrush,
    ToolPatternBrush,
    ToolSoftBrushDirect,
    ToolPatternBrushDirect,
    ToolSoftSmudge,
    ToolPatternSmudge,
    ToolSoftEraser,
    ToolPatternEraser,
}

impl CommandKind {
    /// All kinds, in tag order.
    pub const ALL: [CommandKind; 20] = [
        Self::ColorSelect,
        Self::CanvasResize,
        Self::LayerBlit,
        Self::LayerClear,
        Self::LayerMerge,
        Self::LayerSelect,
        Self::LayerOpacity,
        Self::LayerOrder,
        Self::LayerVisibility,
        Self::StrokeBegin,
        Self::StrokeMove,
        Self::StrokeEnd,
        Self::ToolSoftBrush,
        Self::ToolPatternBrush,
        Self::ToolSoftBrushDirect,
        Self::ToolPatternBrushDirect,
        Self::ToolSoftSmudge,
        Self::ToolPatternSmudge,
        Self::ToolSoftEraser,
        Self::ToolPatternEraser,
    ];

    /// The tag byte written to the wire.
    pub fn tag(self) -> i8 {
        match self {
            Self::ColorSelect => 1,
            Self::CanvasResize => 2,
            Self::LayerBlit => 3,
            Self::LayerClear => 4,
            Self::LayerMerge => 5,
            Self::LayerSelect => 6,
            Self::LayerOpacity => 7,
            Self::LayerOrder => 8,
            Self::LayerVisibility => 9,
            Self::StrokeBegin => 10,
            Self::StrokeMove => 11,
            Self::StrokeEnd => 12,
            Self::ToolSoftBrush => 20,
            Self::ToolPatternBrush => 21,
            Self::ToolSoftBrushDirect => 22,
            Self::ToolPatternBrushDirect => 23,
            Self::ToolSoftSmudge => 24,
            Self::ToolPatternSmudge => 25,
            Self::ToolSoftEraser => 26,
            Self::ToolPatternEraser => 27,
        }
    }

    /// Looks up a kind by its tag byte.
    pub fn from_tag(tag: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// The schema version the encoder currently writes for this kind.
    pub fn current_version(self) -> i8 {
        1
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ColorSelect => "color-select",
            Self::CanvasResize => "canvas-resize",
            Self::LayerBlit => "layer-blit",
            Self::LayerClear => "layer-clear",
            Self::LayerMerge => "layer-merge",
            Self::LayerSelect => "layer-select",
            Self::LayerOpacity => "layer-opacity",
            Self::LayerOrder => "layer-order",
            Self::LayerVisibility => "layer-visibility",
            Self::StrokeBegin => "stroke-begin",
            Self::StrokeMove => "stroke-move",
            Self::StrokeEnd => "stroke-end",
            Self::ToolSoftBrush => "tool-soft-brush",
            Self::ToolPatternBrush => "tool-pattern-brush",
            Self::ToolSoftBrushDirect => "tool-soft-brush-direct",
            Self::ToolPatternBrushDirect => "tool-pattern-brush-direct",
            Self::ToolSoftSmudge => "tool-soft-smudge",
            Self::ToolPatternSmudge => "tool-pattern-smudge",
            Self::ToolSoftEraser => "tool-soft-eraser",
            Self::ToolPatternEraser => "tool-pattern-eraser",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.tag())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Placement of a blitted image on its target layer.
///
/// The source image is rotated by `angle` (radians) and scaled by `scale`
/// around its anchor point, and the anchor lands on `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlitTransform {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub angle: f32,
    pub scale: f32,
    pub x: f32,
    pub y: f32,
}

impl BlitTransform {
    /// Places the image unrotated and unscaled with its top-left at `(x, y)`.
    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            anchor_x: 0.0,
            anchor_y: 0.0,
            angle: 0.0,
            scale: 1.0,
            x,
            y,
        }
    }
}

impl Default for BlitTransform {
    fn default() -> Self {
        Self::translate(0.0, 0.0)
    }
}

/// Round brush tip with a soft falloff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct SoftTip {
    pub diameter: u32,
    /// Fraction of the radius painted at full strength (0-1).
    pub hardness: f32,
    /// Dab spacing as a fraction of the diameter.
    pub spacing: f32,
}

/// Brush tip stamped from the pattern library.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct PatternTip {
    pub pattern_id: u32,
    pub diameter: u32,
    /// Dab spacing as a fraction of the diameter.
    pub spacing: f32,
}

/// The tool a stroke paints with, plus its settings.
///
/// Serializes with a `tool` tag, e.g.
/// `{ "tool": "softBrush", "diameter": 31, "hardness": 0.8, "spacing": 0.05 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(tag = "tool", rename_all = "camelCase")]
pub enum ToolSettings {
    SoftBrush(SoftTip),
    PatternBrush(PatternTip),
    SoftBrushDirect(SoftTip),
    PatternBrushDirect(PatternTip),
    SoftSmudge {
        #[serde(flatten)]
        tip: SoftTip,
        strength: f32,
    },
    PatternSmudge {
        #[serde(flatten)]
        tip: PatternTip,
        strength: f32,
    },
    SoftEraser(SoftTip),
    PatternEraser(PatternTip),
}

/// What a tool does to the pixels under a dab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Brush,
    Eraser,
    Smudge,
}

impl ToolSettings {
    pub fn soft_brush(diameter: u32, hardness: f32, spacing: f32) -> Self {
        Self::SoftBrush(SoftTip::new(diameter, hardness, spacing))
    }

    pub fn pattern_brush(pattern_id: u32, diameter: u32, spacing: f32) -> Self {
        Self::PatternBrush(PatternTip::new(pattern_id, diameter, spacing))
    }

    pub fn soft_brush_direct(diameter: u32, hardness: f32, spacing: f32) -> Self {
        Self::SoftBrushDirect(SoftTip::new(diameter, hardness, spacing))
    }

    pub fn pattern_brush_direct(pattern_id: u32, diameter: u32, spacing: f32) -> Self {
        Self::PatternBrushDirect(PatternTip::new(pattern_id, diameter, spacing))
    }

    pub fn soft_smudge(diameter: u32, hardness: f32, spacing: f32, strength: f32) -> Self {
        Self::SoftSmudge {
            tip: SoftTip::new(diameter, hardness, spacing),
            strength: unit(strength),
        }
    }

    pub fn pattern_smudge(pattern_id: u32, diameter: u32, spacing: f32, strength: f32) -> Self {
        Self::PatternSmudge {
            tip: PatternTip::new(pattern_id, diameter, spacing),
            strength: unit(strength),
        }
    }

    pub fn soft_eraser(diameter: u32, hardness: f32, spacing: f32) -> Self {
        Self::SoftEraser(SoftTip::new(diameter, hardness, spacing))
    }

    pub fn pattern_eraser(pattern_id: u32, diameter: u32, spacing: f32) -> Self {
        Self::PatternEraser(PatternTip::new(pattern_id, diameter, spacing))
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SoftBrush(_) => CommandKind::ToolSoftBrush,
            Self::PatternBrush(_) => CommandKind::ToolPatternBrush,
            Self::SoftBrushDirect(_) => CommandKind::ToolSoftBrushDirect,
            Self::PatternBrushDirect(_) => CommandKind::ToolPatternBrushDirect,
            Self::SoftSmudge { .. } => CommandKind::ToolSoftSmudge,
            Self::PatternSmudge { .. } => CommandKind::ToolPatternSmudge,
            Self::SoftEraser(_) => CommandKind::ToolSoftEraser,
            Self::PatternEraser(_) => CommandKind::ToolPatternEraser,
        }
    }

    pub fn mode(&self) -> ToolMode {
        match self {
            Self::SoftBrush(_)
            | Self::PatternBrush(_)
            | Self::SoftBrushDirect(_)
            | Self::PatternBrushDirect(_) => ToolMode::Brush,
            Self::SoftSmudge { .. } | Self::PatternSmudge { .. } => ToolMode::Smudge,
            Self::SoftEraser(_) | Self::PatternEraser(_) => ToolMode::Eraser,
        }
    }

    pub fn diameter(&self) -> u32 {
        match self {
            Self::SoftBrush(tip)
            | Self::SoftBrushDirect(tip)
            | Self::SoftEraser(tip)
            | Self::SoftSmudge { tip, .. } => tip.diameter,
            Self::PatternBrush(tip)
            | Self::PatternBrushDirect(tip)
            | Self::PatternEraser(tip)
            | Self::PatternSmudge { tip, .. } => tip.diameter,
        }
    }

    /// Falloff hardness; pattern tips are stamped hard.
    pub fn hardness(&self) -> f32 {
        match self {
            Self::SoftBrush(tip)
            | Self::SoftBrushDirect(tip)
            | Self::SoftEraser(tip)
            | Self::SoftSmudge { tip, .. } => tip.hardness,
            _ => 1.0,
        }
    }

    pub fn spacing(&self) -> f32 {
        match self {
            Self::SoftBrush(tip)
            | Self::SoftBrushDirect(tip)
            | Self::SoftEraser(tip)
            | Self::SoftSmudge { tip, .. } => tip.spacing,
            Self::PatternBrush(tip)
            | Self::PatternBrushDirect(tip)
            | Self::PatternEraser(tip)
            | Self::PatternSmudge { tip, .. } => tip.spacing,
        }
    }

    /// Smudge strength; zero for non-smudge tools.
    pub fn strength(&self) -> f32 {
        match self {
            Self::SoftSmudge { strength, .. } | Self::PatternSmudge { strength, .. } => *strength,
            _ => 0.0,
        }
    }

    pub(crate) fn normalized(self) -> Self {
        match self {
            Self::SoftBrush(tip) => Self::SoftBrush(tip.normalized()),
            Self::PatternBrush(tip) => Self::PatternBrush(tip.normalized()),
            Self::SoftBrushDirect(tip) => Self::SoftBrushDirect(tip.normalized()),
            Self::PatternBrushDirect(tip) => Self::PatternBrushDirect(tip.normalized()),
            Self::SoftSmudge { tip, strength } => Self::SoftSmudge {
                tip: tip.normalized(),
                strength: unit(strength),
            },
            Self::PatternSmudge { tip, strength } => Self::PatternSmudge {
                tip: tip.normalized(),
                strength: unit(strength),
            },
            Self::SoftEraser(tip) => Self::SoftEraser(tip.normalized()),
            Self::PatternEraser(tip) => Self::PatternEraser(tip.normalized()),
        }
    }
}

impl SoftTip {
    pub fn new(diameter: u32, hardness: f32, spacing: f32) -> Self {
        Self {
            diameter,
            hardness,
            spacing,
        }
        .normalized()
    }

    fn normalized(self) -> Self {
        Self {
            diameter: self.diameter,
            hardness: unit(self.hardness),
            spacing: non_negative(self.spacing),
        }
    }
}

impl PatternTip {
    pub fn new(pattern_id: u32, diameter: u32, spacing: f32) -> Self {
        Self {
            pattern_id,
            diameter,
            spacing,
        }
        .normalized()
    }

    fn normalized(self) -> Self {
        Self {
            spacing: non_negative(self.spacing),
            ..self
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// One editing operation.
///
/// The closed set of variants is matched exhaustively by the codec and by the
/// engine's dispatch, so adding a kind is checked at compile time everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ColorSelect(Color),
    CanvasResize {
        layer_count: u32,
        width: u32,
        height: u32,
    },
    LayerBlit {
        index: u32,
        transform: BlitTransform,
    },
    LayerClear {
        index: u32,
        color: Color,
    },
    LayerMerge {
        src: u32,
        dst: u32,
    },
    LayerSelect {
        index: u32,
    },
    LayerOpacity {
        index: u32,
        opacity: f32,
    },
    LayerOrder(Vec<u32>),
    LayerVisibility {
        index: u32,
        visible: bool,
    },
    StrokeBegin {
        layer: u8,
        smooth: bool,
        mirror_x: bool,
        x: f32,
        y: f32,
    },
    StrokeMove {
        x: f32,
        y: f32,
    },
    StrokeEnd,
    ToolSelect(ToolSettings),
}

impl Command {
    pub fn color_select(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::ColorSelect(normalize_color(Srgba::new(r, g, b, a)))
    }

    pub fn canvas_resize(layer_count: u32, width: u32, height: u32) -> Self {
        Self::CanvasResize {
            layer_count,
            width,
            height,
        }
    }

    pub fn layer_blit(index: u32, transform: BlitTransform) -> Self {
        Self::LayerBlit { index, transform }
    }

    pub fn layer_clear(index: u32, r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::LayerClear {
            index,
            color: normalize_color(Srgba::new(r, g, b, a)),
        }
    }

    pub fn layer_merge(src: u32, dst: u32) -> Self {
        Self::LayerMerge { src, dst }
    }

    pub fn layer_select(index: u32) -> Self {
        Self::LayerSelect { index }
    }

    pub fn layer_opacity(index: u32, opacity: f32) -> Self {
        Self::LayerOpacity {
            index,
            opacity: unit(opacity),
        }
    }

    pub fn layer_order(order: impl Into<Vec<u32>>) -> Self {
        Self::LayerOrder(order.into())
    }

    pub fn layer_visibility(index: u32, visible: bool) -> Self {
        Self::LayerVisibility { index, visible }
    }

    pub fn stroke_begin(layer: u8, smooth: bool, mirror_x: bool, x: f32, y: f32) -> Self {
        Self::StrokeBegin {
            layer,
            smooth,
            mirror_x,
            x,
            y,
        }
    }

    pub fn stroke_move(x: f32, y: f32) -> Self {
        Self::StrokeMove { x, y }
    }

    pub fn stroke_end() -> Self {
        Self::StrokeEnd
    }

    pub fn tool_select(settings: ToolSettings) -> Self {
        Self::ToolSelect(settings.normalized())
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::ColorSelect(_) => CommandKind::ColorSelect,
            Self::CanvasResize { .. } => CommandKind::CanvasResize,
            Self::LayerBlit { .. } => CommandKind::LayerBlit,
            Self::LayerClear { .. } => CommandKind::LayerClear,
            Self::LayerMerge { .. } => CommandKind::LayerMerge,
            Self::LayerSelect { .. } => CommandKind::LayerSelect,
            Self::LayerOpacity { .. } => CommandKind::LayerOpacity,
            Self::LayerOrder(_) => CommandKind::LayerOrder,
            Self::LayerVisibility { .. } => CommandKind::LayerVisibility,
            Self::StrokeBegin { .. } => CommandKind::StrokeBegin,
            Self::StrokeMove { .. } => CommandKind::StrokeMove,
            Self::StrokeEnd => CommandKind::StrokeEnd,
            Self::ToolSelect(settings) => settings.kind(),
        }
    }

    /// Returns the command with every field clamped into its domain.
    pub fn normalized(self) -> Self {
        match self {
            Self::ColorSelect(color) => Self::ColorSelect(normalize_color(color)),
            Self::LayerClear { index, color } => Self::LayerClear {
                index,
                color: normalize_color(color),
            },
            Self::LayerOpacity { index, opacity } => Self::LayerOpacity {
                index,
                opacity: unit(opacity),
            },
            Self::ToolSelect(settings) => Self::ToolSelect(settings.normalized()),
            other => other,
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

/// Scrubs NaN components and clamps into `[0, 1]`.
pub(crate) fn normalize_color(color: Color) -> Color {
    let scrub = |v: f32| if v.is_nan() { 0.0 } else { v };
    Srgba::new(
        scrub(color.red),
        scrub(color.green),
        scrub(color.blue),
        scrub(color.alpha),
    )
    .clamp()
}
