//! The move/resize drag state machine for the Select tool.
//!
//! A drag runs Idle → Moving | Resizing(handle) → Idle.  Geometry is always
//! recomputed from the pointer-down snapshot plus the total displacement, so
//! long drags cannot accumulate per-frame drift.  Pointer-up and
//! pointer-leave both land in [`DragController::finish`], which records one
//! `LayerModified` action for the whole gesture.

use crate::canvas::{EditorState, Layer, MIN_LAYER_SIZE};
use crate::components::history::{HistoryAction, HistoryManager, LayerSnapshot};

/// Pointer tolerance band around each edge and corner, in display pixels.
pub const HANDLE_TOLERANCE: f32 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeHandle {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeHandle {
    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            ResizeHandle::TopLeft
                | ResizeHandle::TopRight
                | ResizeHandle::BottomLeft
                | ResizeHandle::BottomRight
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize(ResizeHandle),
}

/// Which handle zone (if any) the point falls in.  Corners win over edges so
/// a corner grab near an edge band resizes both axes.
pub fn hit_handle(layer: &Layer, x: f32, y: f32) -> Option<ResizeHandle> {
    let b = HANDLE_TOLERANCE;
    let left = layer.x;
    let right = layer.x + layer.width;
    let top = layer.y;
    let bottom = layer.y + layer.height;

    let near = |tx: f32, ty: f32| (x - tx).abs() <= b && (y - ty).abs() <= b;
    if near(left, top) {
        return Some(ResizeHandle::TopLeft);
    }
    if near(right, top) {
        return Some(ResizeHandle::TopRight);
    }
    if near(left, bottom) {
        return Some(ResizeHandle::BottomLeft);
    }
    if near(right, bottom) {
        return Some(ResizeHandle::BottomRight);
    }

    let between = |v: f32, lo: f32, hi: f32| v >= lo && v <= hi;
    if between(y, top, bottom) && (x - left).abs() <= b {
        return Some(ResizeHandle::Left);
    }
    if between(y, top, bottom) && (x - right).abs() <= b {
        return Some(ResizeHandle::Right);
    }
    if between(x, left, right) && (y - top).abs() <= b {
        return Some(ResizeHandle::Top);
    }
    if between(x, left, right) && (y - bottom).abs() <= b {
        return Some(ResizeHandle::Bottom);
    }
    None
}

/// New `(x, y, width, height)` for a resize gesture, computed from the
/// drag-start geometry and total displacement.
///
/// Without the free-resize modifier, edge handles rescale the other axis by
/// the same factor; corner handles use the larger of the two axis factors so
/// the dragged corner's dominant direction drives the scale.  Dimensions are
/// floored at the layer minimum and the non-dragged edge/corner stays
/// anchored.
pub fn resized_geometry(
    handle: ResizeHandle,
    free_resize: bool,
    origin: (f32, f32, f32, f32),
    dx: f32,
    dy: f32,
) -> (f32, f32, f32, f32) {
    let (ox, oy, ow, oh) = origin;
    let (mut x, mut y, mut w, mut h) = origin;

    match handle {
        ResizeHandle::Left => {
            let new_w = ow - dx;
            if free_resize {
                x = ox + dx;
                w = new_w.max(MIN_LAYER_SIZE);
            } else {
                let sc = new_w / ow;
                w = new_w.max(MIN_LAYER_SIZE);
                h = (oh * sc).max(MIN_LAYER_SIZE);
                x = ox + (ow - w);
            }
        }
        ResizeHandle::Right => {
            let new_w = ow + dx;
            if free_resize {
                w = new_w.max(MIN_LAYER_SIZE);
            } else {
                let sc = new_w / ow;
                w = new_w.max(MIN_LAYER_SIZE);
                h = (oh * sc).max(MIN_LAYER_SIZE);
            }
        }
        ResizeHandle::Top => {
            let new_h = oh - dy;
            if free_resize {
                y = oy + dy;
                h = new_h.max(MIN_LAYER_SIZE);
            } else {
                let sc = new_h / oh;
                h = new_h.max(MIN_LAYER_SIZE);
                w = (ow * sc).max(MIN_LAYER_SIZE);
                y = oy + (oh - h);
            }
        }
        ResizeHandle::Bottom => {
            let new_h = oh + dy;
            if free_resize {
                h = new_h.max(MIN_LAYER_SIZE);
            } else {
                let sc = new_h / oh;
                h = new_h.max(MIN_LAYER_SIZE);
                w = (ow * sc).max(MIN_LAYER_SIZE);
            }
        }
        corner => {
            let (new_w, new_h) = match corner {
                ResizeHandle::TopLeft => (ow - dx, oh - dy),
                ResizeHandle::TopRight => (ow + dx, oh - dy),
                ResizeHandle::BottomLeft => (ow - dx, oh + dy),
                _ => (ow + dx, oh + dy),
            };
            if free_resize {
                w = new_w.max(MIN_LAYER_SIZE);
                h = new_h.max(MIN_LAYER_SIZE);
            } else {
                let sc = (new_w / ow).max(new_h / oh);
                w = (ow * sc).max(MIN_LAYER_SIZE);
                h = (oh * sc).max(MIN_LAYER_SIZE);
            }
            // Re-anchor so the opposite corner stays put.
            match corner {
                ResizeHandle::TopLeft => {
                    x = ox + (ow - w);
                    y = oy + (oh - h);
                }
                ResizeHandle::TopRight => {
                    y = oy + (oh - h);
                }
                ResizeHandle::BottomLeft => {
                    x = ox + (ow - w);
                }
                _ => {}
            }
        }
    }
    (x, y, w, h)
}

struct DragSession {
    layer_id: u64,
    mode: DragMode,
    start_x: f32,
    start_y: f32,
    origin: (f32, f32, f32, f32),
    before: LayerSnapshot,
}

/// Pointer-drag interpreter.  Owns nothing but the in-flight session; the
/// shell feeds it pointer-down / pointer-move / pointer-up (or leave).
#[derive(Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn mode(&self) -> Option<DragMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    /// Pointer-down.  Prefers the selected layer's handles and interior;
    /// otherwise picks (and selects) the topmost layer under the pointer;
    /// otherwise clears the selection.  Returns the mode entered, if any.
    pub fn begin(&mut self, state: &mut EditorState, x: f32, y: f32) -> Option<DragMode> {
        let mut chosen: Option<(u64, DragMode)> = None;

        if let Some(sel) = state.selected_layer()
            && sel.visible
        {
            if let Some(handle) = hit_handle(sel, x, y) {
                chosen = Some((sel.id, DragMode::Resize(handle)));
            } else if sel.bounds().contains(x, y) {
                chosen = Some((sel.id, DragMode::Move));
            }
        }
        if chosen.is_none()
            && let Some(top) = state.topmost_layer_at(x, y)
        {
            let mode = hit_handle(top, x, y)
                .map(DragMode::Resize)
                .unwrap_or(DragMode::Move);
            chosen = Some((top.id, mode));
        }

        let Some((id, mode)) = chosen else {
            state.selected_layer_id = None;
            self.session = None;
            return None;
        };
        state.selected_layer_id = Some(id);
        let layer = state.layer(id).expect("picked layer exists");
        self.session = Some(DragSession {
            layer_id: id,
            mode,
            start_x: x,
            start_y: y,
            origin: (layer.x, layer.y, layer.width, layer.height),
            before: LayerSnapshot::capture(layer, false),
        });
        Some(mode)
    }

    /// Pointer-move while a drag is active.  Recomputes geometry from the
    /// drag-start snapshot and the total displacement.
    pub fn update(&mut self, state: &mut EditorState, x: f32, y: f32, free_resize: bool) {
        let Some(session) = &self.session else {
            return;
        };
        let dx = x - session.start_x;
        let dy = y - session.start_y;
        let Some(layer) = state.layer_mut(session.layer_id) else {
            return;
        };
        match session.mode {
            DragMode::Move => {
                layer.x = session.origin.0 + dx;
                layer.y = session.origin.1 + dy;
            }
            DragMode::Resize(handle) => {
                let (nx, ny, nw, nh) = resized_geometry(handle, free_resize, session.origin, dx, dy);
                layer.x = nx;
                layer.y = ny;
                layer.width = nw;
                layer.height = nh;
            }
        }
    }

    /// Pointer-up.  A pointer-leave is routed here too and behaves
    /// identically: the gesture finalizes and exactly one modify action is
    /// recorded against the pre-drag snapshot.
    pub fn finish(&mut self, state: &mut EditorState, history: &mut HistoryManager) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Some(layer) = state.layer(session.layer_id) else {
            return;
        };
        history.record(HistoryAction::LayerModified {
            layer_id: session.layer_id,
            before: session.before,
            after: LayerSnapshot::capture(layer, false),
        });
    }
}
