//! Shape rasterization for shape layers.
//!
//! Shapes are drawn into the layer's local buffer with 2×2 supersampled
//! coverage, sized by the drag rectangle that finalized them: a square uses
//! the short side, a circle is inscribed, a triangle runs apex-top, a
//! rectangle fills the whole rect.

use image::{Rgba, RgbaImage};

use crate::canvas::{ShapeFillMode, ShapeKind, ShapeStyle};

const SAMPLE_OFFSETS: [(f32, f32); 4] = [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)];

/// Rasterize `style` into a fresh `width × height` buffer.
pub fn rasterize_shape(style: &ShapeStyle, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    let w = width as f32;
    let h = height as f32;
    let [r, g, b, a] = style.color;

    for y in 0..height {
        for x in 0..width {
            let mut hits = 0u32;
            for (ox, oy) in SAMPLE_OFFSETS {
                if covers(style, w, h, x as f32 + ox, y as f32 + oy) {
                    hits += 1;
                }
            }
            if hits > 0 {
                let alpha = (a as f32 * hits as f32 / SAMPLE_OFFSETS.len() as f32).round() as u8;
                out.put_pixel(x, y, Rgba([r, g, b, alpha]));
            }
        }
    }
    out
}

fn covers(style: &ShapeStyle, w: f32, h: f32, px: f32, py: f32) -> bool {
    let half_stroke = (style.stroke_width * 0.5).max(0.5);
    match style.kind {
        ShapeKind::Square => {
            let side = w.min(h);
            match style.mode {
                ShapeFillMode::Filled => in_rect(px, py, 0.0, 0.0, side, side),
                ShapeFillMode::Outline => on_rect_outline(px, py, 0.0, 0.0, side, side, half_stroke),
            }
        }
        ShapeKind::Rectangle => match style.mode {
            ShapeFillMode::Filled => in_rect(px, py, 0.0, 0.0, w, h),
            ShapeFillMode::Outline => on_rect_outline(px, py, 0.0, 0.0, w, h, half_stroke),
        },
        ShapeKind::Circle => {
            let cx = w * 0.5;
            let cy = h * 0.5;
            let radius = w.min(h) * 0.5;
            let dist = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
            match style.mode {
                ShapeFillMode::Filled => dist <= radius,
                ShapeFillMode::Outline => (dist - radius).abs() <= half_stroke,
            }
        }
        ShapeKind::Triangle => {
            let apex = (w * 0.5, 0.0);
            let left = (0.0, h);
            let right = (w, h);
            match style.mode {
                ShapeFillMode::Filled => in_triangle((px, py), apex, left, right),
                ShapeFillMode::Outline => {
                    dist_to_segment((px, py), apex, left) <= half_stroke
                        || dist_to_segment((px, py), left, right) <= half_stroke
                        || dist_to_segment((px, py), right, apex) <= half_stroke
                }
            }
        }
    }
}

fn in_rect(px: f32, py: f32, x0: f32, y0: f32, x1: f32, y1: f32) -> bool {
    px >= x0 && px <= x1 && py >= y0 && py <= y1
}

/// Stroke band centered on the rectangle boundary.
fn on_rect_outline(px: f32, py: f32, x0: f32, y0: f32, x1: f32, y1: f32, half: f32) -> bool {
    in_rect(px, py, x0 - half, y0 - half, x1 + half, y1 + half)
        && !in_rect(px, py, x0 + half, y0 + half, x1 - half, y1 - half)
}

fn in_triangle(p: (f32, f32), a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> bool {
    let sign = |p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)| {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn dist_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (dx, dy) = (apx - t * abx, apy - t * aby);
    (dx * dx + dy * dy).sqrt()
}
