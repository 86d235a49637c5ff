//! Placement math: rectangles in display space and the affine transform
//! between a layer's local pixel space and the canvas.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in canvas (display) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanned by two drag points, normalised so width/height are
    /// non-negative regardless of drag direction.
    pub fn from_drag(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Closed containment test (edges count as inside).
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }
}

/// 2x3 affine matrix mapping a layer's local pixel space to display space:
///
/// ```text
/// x' = a*x + c*y + tx
/// y' = b*x + d*y + ty
/// ```
///
/// The forward transform composes, outermost first: translate to the layer
/// center, rotate clockwise, scale by the display/buffer ratio, translate the
/// local origin to `(-ow/2, -oh/2)` — so the rotate/scale pivot is the layer
/// center, not its top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTransform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl LayerTransform {
    /// Forward transform (local → display) for a layer placed at `(x, y)`
    /// with display size `width × height`, a backing buffer of
    /// `original_width × original_height`, rotated `rotation` degrees about
    /// its center.
    pub fn forward(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        original_width: u32,
        original_height: u32,
        rotation: f32,
    ) -> Self {
        let cx = x + width * 0.5;
        let cy = y + height * 0.5;
        let (sin, cos) = rotation.to_radians().sin_cos();
        let sx = width / original_width as f32;
        let sy = height / original_height as f32;

        // T(cx,cy) · R(θ) · S(sx,sy) · T(-ow/2, -oh/2)
        let a = cos * sx;
        let b = sin * sx;
        let c = -sin * sy;
        let d = cos * sy;
        let ox = -(original_width as f32) * 0.5;
        let oy = -(original_height as f32) * 0.5;
        Self {
            a,
            b,
            c,
            d,
            tx: a * ox + c * oy + cx,
            ty: b * ox + d * oy + cy,
        }
    }

    /// Exact algebraic inverse (adjugate over determinant).  The determinant
    /// is `sx·sy`, always finite and positive for a valid layer.
    pub fn invert(&self) -> Self {
        let det = self.a * self.d - self.b * self.c;
        let ia = self.d / det;
        let ib = -self.b / det;
        let ic = -self.c / det;
        let id = self.a / det;
        Self {
            a: ia,
            b: ib,
            c: ic,
            d: id,
            tx: -(ia * self.tx + ic * self.ty),
            ty: -(ib * self.tx + id * self.ty),
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_drag_normalises() {
        let r = Rect::from_drag(50.0, 80.0, 10.0, 20.0);
        assert_eq!(r, Rect::new(10.0, 20.0, 40.0, 60.0));
        assert!(r.contains(10.0, 20.0));
        assert!(r.contains(50.0, 80.0));
        assert!(!r.contains(50.1, 80.0));
    }

    #[test]
    fn unrotated_transform_is_scale_plus_offset() {
        // 200x100 buffer displayed at 100x50, placed at (30, 40): scale 0.5.
        let t = LayerTransform::forward(30.0, 40.0, 100.0, 50.0, 200, 100, 0.0);
        let (x, y) = t.apply(0.0, 0.0);
        assert!((x - 30.0).abs() < 1e-4 && (y - 40.0).abs() < 1e-4);
        let (x, y) = t.apply(200.0, 100.0);
        assert!((x - 130.0).abs() < 1e-4 && (y - 90.0).abs() < 1e-4);
    }

    #[test]
    fn rotation_pivots_on_layer_center() {
        // 90° about the center of a square layer keeps the center fixed.
        let t = LayerTransform::forward(0.0, 0.0, 100.0, 100.0, 100, 100, 90.0);
        let (cx, cy) = t.apply(50.0, 50.0);
        assert!((cx - 50.0).abs() < 1e-3 && (cy - 50.0).abs() < 1e-3);
        // Local top-left swings to the display top-right under a clockwise turn.
        let (x, y) = t.apply(0.0, 0.0);
        assert!((x - 100.0).abs() < 1e-3 && (y - 0.0).abs() < 1e-3);
    }

    #[test]
    fn inverse_round_trip_under_one_pixel_across_scale_range() {
        for &(ow, oh, w, h) in &[
            (100u32, 100u32, 1.0f32, 1.0f32),       // scale 0.01
            (100, 50, 10_000.0, 5_000.0),           // scale 100
            (640, 480, 311.0, 97.0),                // anisotropic
        ] {
            for &deg in &[0.0f32, 33.0, 90.0, 217.5] {
                let t = LayerTransform::forward(12.5, -7.25, w, h, ow, oh, deg);
                let inv = t.invert();
                for &(lx, ly) in &[(0.0f32, 0.0f32), (ow as f32, oh as f32), (3.7, 91.2)] {
                    let (dx, dy) = t.apply(lx, ly);
                    let (bx, by) = inv.apply(dx, dy);
                    assert!(
                        (bx - lx).abs() < 1.0 && (by - ly).abs() < 1.0,
                        "round trip drifted: scale {}x{} rot {} point ({}, {}) -> ({}, {})",
                        w / ow as f32,
                        h / oh as f32,
                        deg,
                        lx,
                        ly,
                        bx,
                        by
                    );
                }
            }
        }
    }
}
