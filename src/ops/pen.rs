//! Freehand pen strokes.
//!
//! Strokes paint straight into the selected layer's buffer through the exact
//! inverse placement transform, so they land correctly on scaled and rotated
//! layers.  This is the pixel-edit path: nothing here ever touches history.

use image::{Rgba, RgbaImage};

use crate::canvas::{EditorState, ToolContext};
use crate::error::EditorError;

/// Pen strokes on a mask layer always paint mask green.
const MASK_PEN_COLOR: [u8; 4] = [0, 255, 0, 255];

/// Stamp one segment of a stroke, from the previous pointer position to the
/// current one, both in display space.
pub fn pen_stroke(
    state: &mut EditorState,
    tools: &ToolContext,
    from: (f32, f32),
    to: (f32, f32),
) -> Result<(), EditorError> {
    let layer = state.selected_layer().ok_or(EditorError::NoSelection)?;
    let id = layer.id;
    let color = if layer.mask {
        MASK_PEN_COLOR
    } else {
        tools.pen_color
    };
    let inverse = layer.transform().invert();
    let a = inverse.apply(from.0, from.1);
    let b = inverse.apply(to.0, to.1);
    let radius = (tools.pen_size * 0.5).max(0.5);

    state.mutate_pixels(id, |img| stamp_segment(img, a, b, radius, color))
}

/// Round-capped segment: every pixel whose center is within `radius` of the
/// segment gets the stroke color.
fn stamp_segment(img: &mut RgbaImage, a: (f32, f32), b: (f32, f32), radius: f32, color: [u8; 4]) {
    let x0 = (a.0.min(b.0) - radius).floor().max(0.0) as u32;
    let y0 = (a.1.min(b.1) - radius).floor().max(0.0) as u32;
    let x1 = ((a.0.max(b.0) + radius).ceil().max(0.0) as u32 + 1).min(img.width());
    let y1 = ((a.1.max(b.1) + radius).ceil().max(0.0) as u32 + 1).min(img.height());

    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len_sq = abx * abx + aby * aby;

    for y in y0..y1 {
        for x in x0..x1 {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let (apx, apy) = (px - a.0, py - a.1);
            let t = if len_sq > 0.0 {
                ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let (dx, dy) = (apx - t * abx, apy - t * aby);
            if dx * dx + dy * dy <= radius * radius {
                img.put_pixel(x, y, Rgba(color));
            }
        }
    }
}
