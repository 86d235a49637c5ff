//! Layer lifecycle and structural setters.
//!
//! Everything here that changes the document in an undoable way records
//! exactly one history action per call; reorder and visibility toggles are
//! deliberately not recorded (they never were in this editor).

use image::RgbaImage;

use crate::canvas::{
    EditorState, Layer, LayerContent, ShapeStyle, TextStyle, MIN_CANVAS_SIZE,
};
use crate::components::history::{HistoryAction, HistoryManager, LayerSnapshot};
use crate::error::EditorError;
use crate::geometry::Rect;
use crate::io;
use crate::ops::{shapes, text};

fn record_added(history: &mut HistoryManager, layer: &Layer) {
    history.record(HistoryAction::LayerAdded {
        layer_id: layer.id,
        after: LayerSnapshot::capture(layer, true),
    });
}

/// Add a transparent canvas-sized image layer on top of the stack.
pub fn add_empty_layer(state: &mut EditorState, history: &mut HistoryManager) -> u64 {
    let id = state.alloc_layer_id();
    let layer = Layer::new(id, LayerContent::Image, 0.0, 0.0, state.width, state.height);
    record_added(history, &layer);
    state.push_layer(layer);
    log_info!("added empty layer #{}", id);
    id
}

/// Add an already-decoded image as a new layer, display size auto-scaled
/// down (never up) to fit the canvas with its aspect ratio preserved.  The
/// buffer keeps the full source resolution.
pub fn add_image_layer(state: &mut EditorState, history: &mut HistoryManager, img: RgbaImage) -> u64 {
    let scale = io::fit_scale(img.width(), img.height(), state.width, state.height);
    let display_w = img.width() as f32 * scale;
    let display_h = img.height() as f32 * scale;

    let id = state.alloc_layer_id();
    let mut layer = Layer::with_pixels(id, LayerContent::Image, 0.0, 0.0, img);
    layer.width = display_w;
    layer.height = display_h;
    record_added(history, &layer);
    state.push_layer(layer);
    id
}

/// Insert a text layer at `(x, y)` and select it.  The local buffer is the
/// fixed text-layer size; glyphs are rasterized immediately.
pub fn add_text_layer(
    state: &mut EditorState,
    history: &mut HistoryManager,
    x: f32,
    y: f32,
    style: TextStyle,
) -> u64 {
    let pixels = text::rasterize_text(&style, text::TEXT_LAYER_WIDTH, text::TEXT_LAYER_HEIGHT);
    let id = state.alloc_layer_id();
    let layer = Layer::with_pixels(id, LayerContent::Text(style), x, y, pixels);
    record_added(history, &layer);
    state.push_layer(layer);
    state.selected_layer_id = Some(id);
    id
}

/// Re-rasterize a text layer after its style changed.  Records one modify
/// action whose snapshots carry pixel data, since the buffer is rewritten.
pub fn edit_text_layer(
    state: &mut EditorState,
    history: &mut HistoryManager,
    id: u64,
    style: TextStyle,
) -> Result<(), EditorError> {
    state.mutate_structural_with_pixels(history, id, |layer| {
        layer.pixels = text::rasterize_text(&style, layer.original_width, layer.original_height);
        layer.content = LayerContent::Text(style);
    })
}

/// Turn a finished shape drag into a new layer and select it.
pub fn finalize_shape(
    state: &mut EditorState,
    history: &mut HistoryManager,
    rect: Rect,
    style: &ShapeStyle,
) -> u64 {
    let w = (rect.width.round() as u32).max(1);
    let h = (rect.height.round() as u32).max(1);
    let pixels = shapes::rasterize_shape(style, w, h);

    let id = state.alloc_layer_id();
    let layer = Layer::with_pixels(id, LayerContent::Shape(style.clone()), rect.x, rect.y, pixels);
    record_added(history, &layer);
    state.push_layer(layer);
    state.selected_layer_id = Some(id);
    id
}

/// Remove the selected layer.  The snapshot keeps the full pixel buffer so
/// undo can resurrect it.
pub fn remove_selected_layer(
    state: &mut EditorState,
    history: &mut HistoryManager,
) -> Result<u64, EditorError> {
    let id = state.selected_layer_id.ok_or(EditorError::NoSelection)?;
    let layer = state.layer(id).ok_or(EditorError::NoSelection)?;
    let before = LayerSnapshot::capture(layer, true);
    state.remove_layer(id);
    history.record(HistoryAction::LayerRemoved {
        layer_id: id,
        before,
    });
    log_info!("removed layer #{}", id);
    Ok(id)
}

/// Swap a layer with the one above it.  Returns false if already on top.
pub fn move_layer_up(state: &mut EditorState, id: u64) -> bool {
    match state.layer_index(id) {
        Some(i) if i + 1 < state.layers.len() => {
            state.layers.swap(i, i + 1);
            true
        }
        _ => false,
    }
}

/// Swap a layer with the one below it.  Returns false if already at the bottom.
pub fn move_layer_down(state: &mut EditorState, id: u64) -> bool {
    match state.layer_index(id) {
        Some(i) if i > 0 => {
            state.layers.swap(i, i - 1);
            true
        }
        _ => false,
    }
}

/// Set the selected layer's rotation (degrees, about its center).  Recorded.
pub fn set_rotation(
    state: &mut EditorState,
    history: &mut HistoryManager,
    degrees: f32,
) -> Result<(), EditorError> {
    let id = state.selected_layer_id.ok_or(EditorError::NoSelection)?;
    state.mutate_structural(history, id, |layer| layer.rotation = degrees)
}

/// Set the selected layer's opacity, clamped to [0, 1].  Recorded.
pub fn set_opacity(
    state: &mut EditorState,
    history: &mut HistoryManager,
    opacity: f32,
) -> Result<(), EditorError> {
    let id = state.selected_layer_id.ok_or(EditorError::NoSelection)?;
    state.mutate_structural(history, id, |layer| layer.opacity = opacity.clamp(0.0, 1.0))
}

/// Toggle a layer's mask flag.  Recorded.
pub fn toggle_mask(
    state: &mut EditorState,
    history: &mut HistoryManager,
    id: u64,
) -> Result<(), EditorError> {
    state.mutate_structural(history, id, |layer| layer.mask = !layer.mask)
}

/// Show/hide a layer.  Not recorded.
pub fn set_visible(state: &mut EditorState, id: u64, visible: bool) -> bool {
    match state.layer_mut(id) {
        Some(layer) => {
            layer.visible = visible;
            true
        }
        None => false,
    }
}

/// Change the working canvas bounds.  Existing layer content is not
/// rescaled; only the paint-target bounds move.
pub fn resize_canvas(state: &mut EditorState, width: u32, height: u32) -> Result<(), EditorError> {
    if width < MIN_CANVAS_SIZE || height < MIN_CANVAS_SIZE {
        return Err(EditorError::InvalidCanvasSize { width, height });
    }
    state.width = width;
    state.height = height;
    Ok(())
}
