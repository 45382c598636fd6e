//! Round dab rasterizer and pixel blending used by [`Canvas`](super::Canvas).

use image::{Rgba, RgbaImage};
use palette::Srgba;

use crate::command::{Color, ToolMode, ToolSettings};
use crate::rect::{RectPx, SizePx};

/// One stamp of the current tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dab {
    pub x: f32,
    pub y: f32,
    /// Where the previous dab of the same stroke landed. Smudge tools pick up
    /// color there.
    pub previous: Option<(f32, f32)>,
    pub tool: ToolSettings,
    pub color: Color,
}

/// Converts a float color to an 8-bit pixel.
pub fn to_pixel(color: Color) -> Rgba<u8> {
    let color: Srgba<u8> = color.into_format();
    Rgba([color.red, color.green, color.blue, color.alpha])
}

/// Composites `src` over `dst` at `opacity`, straight alpha.
pub fn source_over(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f32) {
    let sa = src[3] as f32 / 255.0 * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let value = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn lerp(dst: &mut Rgba<u8>, toward: Rgba<u8>, t: f32) {
    for c in 0..4 {
        let value = dst[c] as f32 + (toward[c] as f32 - dst[c] as f32) * t;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
}

/// Coverage of a soft round tip at `distance` from its center.
fn coverage(distance: f32, radius: f32, hardness: f32) -> f32 {
    let d = distance / radius;
    if d >= 1.0 {
        0.0
    } else if d <= hardness {
        1.0
    } else {
        (1.0 - d) / (1.0 - hardness)
    }
}

fn sample(surface: &RgbaImage, x: f32, y: f32) -> Option<Rgba<u8>> {
    if x < 0.0 || y < 0.0 {
        return None;
    }
    surface.get_pixel_checked(x as u32, y as u32).copied()
}

/// Stamps `dab` onto `surface` and returns the touched region.
///
/// Returns `None` when the dab falls entirely outside the surface, or when a
/// smudge dab has nothing to pick up yet.
pub fn paint_dab(surface: &mut RgbaImage, dab: &Dab) -> Option<RectPx> {
    let radius = (dab.tool.diameter() as f32 / 2.0).max(0.5);
    let (width, height) = surface.dimensions();
    let rect = RectPx::around(dab.x, dab.y, radius, SizePx::new(width, height))?;

    let mode = dab.tool.mode();
    let picked = match mode {
        ToolMode::Smudge => Some(
            dab.previous
                .and_then(|(px, py)| sample(surface, px, py))?,
        ),
        _ => None,
    };
    let paint = to_pixel(dab.color);
    let hardness = dab.tool.hardness();
    let strength = dab.tool.strength();

    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            let dx = x as f32 + 0.5 - dab.x;
            let dy = y as f32 + 0.5 - dab.y;
            let cover = coverage((dx * dx + dy * dy).sqrt(), radius, hardness);
            if cover <= 0.0 {
                continue;
            }
            let pixel = surface.get_pixel_mut(x, y);
            match (mode, picked) {
                (ToolMode::Brush, _) => source_over(pixel, paint, cover),
                (ToolMode::Eraser, _) => {
                    pixel[3] = (pixel[3] as f32 * (1.0 - cover)).round() as u8;
                }
                (ToolMode::Smudge, Some(picked)) => lerp(pixel, picked, cover * strength),
                (ToolMode::Smudge, None) => {}
            }
        }
    }

    Some(rect)
}
