//! Binary codec for commands.
//!
//! Wire layout: `{i8 kind, i8 version, payload}`, little-endian. Decoding is
//! keyed first by kind, then by version; anything unrecognized is a hard
//! [`DecodeError`]. There is no best-effort fallback.

use std::io::{Cursor, Read, Write};

use palette::Srgba;

use super::{BlitTransform, Color, Command, CommandKind, PatternTip, SoftTip, ToolSettings};
use crate::error::DecodeError;
use crate::wire::{WireRead, WireWrite};

/// Most layers a layer-order command may list.
pub const MAX_LAYERS: u32 = 16;

const STROKE_FLAG_SMOOTH: u8 = 1 << 0;
const STROKE_FLAG_MIRROR_X: u8 = 1 << 1;

impl Command {
    /// Serializes the command, normalizing it first.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        self.write_to(&mut buf)
            .expect("writing into a Vec cannot fail");
        buf
    }

    /// Writes the normalized command to `writer`.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        let command = self.clone().normalized();
        let kind = command.kind();
        writer.write_i8(kind.tag())?;
        writer.write_i8(kind.current_version())?;

        match &command {
            Command::ColorSelect(color) => write_color(writer, color)?,
            Command::CanvasResize {
                layer_count,
                width,
                height,
            } => {
                writer.write_u32_le(*layer_count)?;
                writer.write_u32_le(*width)?;
                writer.write_u32_le(*height)?;
            }
            Command::LayerBlit { index, transform } => {
                writer.write_u32_le(*index)?;
                writer.write_f32_le(transform.anchor_x)?;
                writer.write_f32_le(transform.anchor_y)?;
                writer.write_f32_le(transform.angle)?;
                writer.write_f32_le(transform.scale)?;
                writer.write_f32_le(transform.x)?;
                writer.write_f32_le(transform.y)?;
            }
            Command::LayerClear { index, color } => {
                writer.write_u32_le(*index)?;
                write_color(writer, color)?;
            }
            Command::LayerMerge { src, dst } => {
                writer.write_u32_le(*src)?;
                writer.write_u32_le(*dst)?;
            }
            Command::LayerSelect { index } => writer.write_u32_le(*index)?,
            Command::LayerOpacity { index, opacity } => {
                writer.write_u32_le(*index)?;
                writer.write_f32_le(*opacity)?;
            }
            Command::LayerOrder(order) => {
                writer.write_u32_le(order.len() as u32)?;
                for index in order {
                    writer.write_u32_le(*index)?;
                }
            }
            Command::LayerVisibility { index, visible } => {
                writer.write_u32_le(*index)?;
                writer.write_u32_le(u32::from(*visible))?;
            }
            Command::StrokeBegin {
                layer,
                smooth,
                mirror_x,
                x,
                y,
            } => {
                let mut flags = 0;
                if *smooth {
                    flags |= STROKE_FLAG_SMOOTH;
                }
                if *mirror_x {
                    flags |= STROKE_FLAG_MIRROR_X;
                }
                writer.write_u8(*layer)?;
                writer.write_u8(flags)?;
                writer.write_f32_le(*x)?;
                writer.write_f32_le(*y)?;
            }
            Command::StrokeMove { x, y } => {
                writer.write_f32_le(*x)?;
                writer.write_f32_le(*y)?;
            }
            Command::StrokeEnd => {}
            Command::ToolSelect(settings) => write_tool(writer, settings)?,
        }
        Ok(())
    }

    /// Decodes exactly one command from `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Command, DecodeError> {
        let mut cursor = Cursor::new(bytes);
        let command = Command::read_from(&mut cursor)?;
        let consumed = cursor.position() as usize;
        if consumed != bytes.len() {
            return Err(DecodeError::TrailingBytes(bytes.len() - consumed));
        }
        Ok(command)
    }

    /// Reads one command from a stream positioned at its first byte.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Command, DecodeError> {
        let tag = reader.read_i8()?;
        let version = reader.read_i8()?;
        let kind = CommandKind::from_tag(tag).ok_or(DecodeError::UnknownKind(tag))?;

        if version != 1 {
            return Err(DecodeError::UnknownVersion { kind, version });
        }

        let command = match kind {
            CommandKind::ColorSelect => Command::ColorSelect(read_color(reader)?),
            CommandKind::CanvasResize => Command::CanvasResize {
                layer_count: reader.read_u32_le()?,
                width: reader.read_u32_le()?,
                height: reader.read_u32_le()?,
            },
            CommandKind::LayerBlit => Command::LayerBlit {
                index: reader.read_u32_le()?,
                transform: BlitTransform {
                    anchor_x: reader.read_f32_le()?,
                    anchor_y: reader.read_f32_le()?,
                    angle: reader.read_f32_le()?,
                    scale: reader.read_f32_le()?,
                    x: reader.read_f32_le()?,
                    y: reader.read_f32_le()?,
                },
            },
            CommandKind::LayerClear => Command::LayerClear {
                index: reader.read_u32_le()?,
                color: read_color(reader)?,
            },
            CommandKind::LayerMerge => Command::LayerMerge {
                src: reader.read_u32_le()?,
                dst: reader.read_u32_le()?,
            },
            CommandKind::LayerSelect => Command::LayerSelect {
                index: reader.read_u32_le()?,
            },
            CommandKind::LayerOpacity => Command::LayerOpacity {
                index: reader.read_u32_le()?,
                opacity: reader.read_f32_le()?,
            },
            CommandKind::LayerOrder => {
                let count = reader.read_u32_le()?;
                if count > MAX_LAYERS {
                    return Err(DecodeError::LayerOrderTooLong {
                        count,
                        max: MAX_LAYERS,
                    });
                }
                let order = (0..count)
                    .map(|_| reader.read_u32_le())
                    .collect::<Result<Vec<_>, _>>()?;
                Command::LayerOrder(order)
            }
            CommandKind::LayerVisibility => Command::LayerVisibility {
                index: reader.read_u32_le()?,
                visible: reader.read_u32_le()? != 0,
            },
            CommandKind::StrokeBegin => {
                let layer = reader.read_u8()?;
                let flags = reader.read_u8()?;
                Command::StrokeBegin {
                    layer,
                    smooth: flags & STROKE_FLAG_SMOOTH != 0,
                    mirror_x: flags & STROKE_FLAG_MIRROR_X != 0,
                    x: reader.read_f32_le()?,
                    y: reader.read_f32_le()?,
                }
            }
            CommandKind::StrokeMove => Command::StrokeMove {
                x: reader.read_f32_le()?,
                y: reader.read_f32_le()?,
            },
            CommandKind::StrokeEnd => Command::StrokeEnd,
            CommandKind::ToolSoftBrush => {
                Command::ToolSelect(ToolSettings::SoftBrush(read_soft_tip(reader)?))
            }
            CommandKind::ToolPatternBrush => {
                Command::ToolSelect(ToolSettings::PatternBrush(read_pattern_tip(reader)?))
            }
            CommandKind::ToolSoftBrushDirect => {
                Command::ToolSelect(ToolSettings::SoftBrushDirect(read_soft_tip(reader)?))
            }
            CommandKind::ToolPatternBrushDirect => {
                Command::ToolSelect(ToolSettings::PatternBrushDirect(read_pattern_tip(reader)?))
            }
            CommandKind::ToolSoftSmudge => Command::ToolSelect(ToolSettings::SoftSmudge {
                tip: read_soft_tip(reader)?,
                strength: reader.read_f32_le()?,
            }),
            CommandKind::ToolPatternSmudge => Command::ToolSelect(ToolSettings::PatternSmudge {
                tip: read_pattern_tip(reader)?,
                strength: reader.read_f32_le()?,
            }),
            CommandKind::ToolSoftEraser => {
                Command::ToolSelect(ToolSettings::SoftEraser(read_soft_tip(reader)?))
            }
            CommandKind::ToolPatternEraser => {
                Command::ToolSelect(ToolSettings::PatternEraser(read_pattern_tip(reader)?))
            }
        };
        Ok(command)
    }
}

// ============================================================================
// Payload helpers
// ============================================================================

fn write_color<W: Write + ?Sized>(writer: &mut W, color: &Color) -> std::io::Result<()> {
    writer.write_f32_le(color.red)?;
    writer.write_f32_le(color.green)?;
    writer.write_f32_le(color.blue)?;
    writer.write_f32_le(color.alpha)
}

fn read_color<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<Color> {
    Ok(Srgba::new(
        reader.read_f32_le()?,
        reader.read_f32_le()?,
        reader.read_f32_le()?,
        reader.read_f32_le()?,
    ))
}

fn write_tool<W: Write + ?Sized>(writer: &mut W, settings: &ToolSettings) -> std::io::Result<()> {
    match settings {
        ToolSettings::SoftBrush(tip)
        | ToolSettings::SoftBrushDirect(tip)
        | ToolSettings::SoftEraser(tip) => write_soft_tip(writer, tip),
        ToolSettings::PatternBrush(tip)
        | ToolSettings::PatternBrushDirect(tip)
        | ToolSettings::PatternEraser(tip) => write_pattern_tip(writer, tip),
        ToolSettings::SoftSmudge { tip, strength } => {
            write_soft_tip(writer, tip)?;
            writer.write_f32_le(*strength)
        }
        ToolSettings::PatternSmudge { tip, strength } => {
            write_pattern_tip(writer, tip)?;
            writer.write_f32_le(*strength)
        }
    }
}

fn write_soft_tip<W: Write + ?Sized>(writer: &mut W, tip: &SoftTip) -> std::io::Result<()> {
    writer.write_u32_le(tip.diameter)?;
    writer.write_f32_le(tip.hardness)?;
    writer.write_f32_le(tip.spacing)
}

fn read_soft_tip<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<SoftTip> {
    Ok(SoftTip {
        diameter: reader.read_u32_le()?,
        hardness: reader.read_f32_le()?,
        spacing: reader.read_f32_le()?,
    })
}

fn write_pattern_tip<W: Write + ?Sized>(writer: &mut W, tip: &PatternTip) -> std::io::Result<()> {
    writer.write_u32_le(tip.pattern_id)?;
    writer.write_u32_le(tip.diameter)?;
    writer.write_f32_le(tip.spacing)
}

fn read_pattern_tip<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<PatternTip> {
    Ok(PatternTip {
        pattern_id: reader.read_u32_le()?,
        diameter: reader.read_u32_le()?,
        spacing: reader.read_f32_le()?,
    })
}

// ============================================================================
// Tests
// ============================================================================
