//! Area clipboard: copy, cut, paste.
//!
//! The selection rectangle lives in display space; it maps into the selected
//! layer's local pixel space through the plain axis-aligned scale factors.
//! Rotation is deliberately not honored here — area selection assumes an
//! axis-aligned working layer.  Copies are mirrored to the OS clipboard on a
//! best-effort basis so other applications can paste them.

use image::{Rgba, RgbaImage};

use crate::canvas::{EditorState, Layer, LayerContent};
use crate::components::history::{HistoryAction, HistoryManager, LayerSnapshot};
use crate::compositor;
use crate::error::EditorError;
use crate::geometry::Rect;

/// Copy the selected area of the selected layer into the clipboard,
/// replacing it wholesale.  The extracted region is resampled to the
/// selection's display-space dimensions.
pub fn copy_area(state: &mut EditorState) -> Result<(), EditorError> {
    let rect = state.area_selection.ok_or(EditorError::NoSelection)?;
    let layer = state.selected_layer().ok_or(EditorError::NoSelection)?;
    let clip = extract_area(layer, rect);
    copy_to_system_clipboard(&clip);
    state.clipboard = Some(clip);
    Ok(())
}

/// Copy, then clear the source rectangle in the layer's buffer.  The clear
/// is a pixel edit and is never recorded in history.
pub fn cut_area(state: &mut EditorState) -> Result<(), EditorError> {
    copy_area(state)?;

    let rect = state.area_selection.expect("checked by copy_area");
    let layer = state.selected_layer().expect("checked by copy_area");
    let id = layer.id;
    let scale_x = layer.original_width as f32 / layer.width;
    let scale_y = layer.original_height as f32 / layer.height;
    let x0 = ((rect.x - layer.x) * scale_x).floor().max(0.0) as u32;
    let y0 = ((rect.y - layer.y) * scale_y).floor().max(0.0) as u32;
    let x1 = (((rect.right() - layer.x) * scale_x).ceil()).min(layer.original_width as f32) as u32;
    let y1 = (((rect.bottom() - layer.y) * scale_y).ceil()).min(layer.original_height as f32) as u32;

    state.mutate_pixels(id, |img| {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
    })
}

/// Paste the clipboard as a brand-new image layer at the area-selection
/// origin (or a fixed fallback offset).  The new layer deep-copies the
/// buffer, and its creation is recorded.
pub fn paste_area(
    state: &mut EditorState,
    history: &mut HistoryManager,
) -> Result<u64, EditorError> {
    let clip = state
        .clipboard
        .as_ref()
        .cloned()
        .ok_or(EditorError::EmptyClipboard)?;
    paste_buffer(state, history, clip)
}

/// Paste whatever image the OS clipboard holds.  Shell-facing supplement to
/// [`paste_area`]; the engine clipboard always wins when it has content.
pub fn paste_from_system(
    state: &mut EditorState,
    history: &mut HistoryManager,
) -> Result<u64, EditorError> {
    if state.clipboard.is_some() {
        return paste_area(state, history);
    }
    let clip = system_clipboard_image().ok_or(EditorError::EmptyClipboard)?;
    paste_buffer(state, history, clip)
}

fn paste_buffer(
    state: &mut EditorState,
    history: &mut HistoryManager,
    clip: RgbaImage,
) -> Result<u64, EditorError> {
    let (x, y) = state
        .area_selection
        .map(|r| (r.x, r.y))
        .unwrap_or((10.0, 10.0));
    let id = state.alloc_layer_id();
    let layer = Layer::with_pixels(id, LayerContent::Image, x, y, clip);
    history.record(HistoryAction::LayerAdded {
        layer_id: id,
        after: LayerSnapshot::capture(&layer, true),
    });
    state.push_layer(layer);
    Ok(id)
}

/// Extract the display-space rect from the layer, resampled to the rect's
/// display dimensions.
fn extract_area(layer: &Layer, rect: Rect) -> RgbaImage {
    let out_w = (rect.width.round() as u32).max(1);
    let out_h = (rect.height.round() as u32).max(1);
    let scale_x = layer.original_width as f32 / layer.width;
    let scale_y = layer.original_height as f32 / layer.height;
    let src_x = (rect.x - layer.x) * scale_x;
    let src_y = (rect.y - layer.y) * scale_y;
    let src_w = rect.width * scale_x;
    let src_h = rect.height * scale_y;

    let raw = layer.pixels.as_raw();
    let w = layer.original_width as i32;
    let h = layer.original_height as i32;

    let mut out = RgbaImage::new(out_w, out_h);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let lx = src_x + (ox as f32 + 0.5) * src_w / out_w as f32 - 0.5;
            let ly = src_y + (oy as f32 + 0.5) * src_h / out_h as f32 - 0.5;
            if let Some(px) = compositor::sample_bilinear(raw, w, h, lx, ly) {
                out.put_pixel(ox, oy, Rgba(px));
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
//  OS clipboard (best effort; errors are swallowed)
// ---------------------------------------------------------------------------

fn copy_to_system_clipboard(img: &RgbaImage) {
    if let Ok(mut clip) = arboard::Clipboard::new() {
        let data = arboard::ImageData {
            width: img.width() as usize,
            height: img.height() as usize,
            bytes: std::borrow::Cow::Borrowed(img.as_raw()),
        };
        let _ = clip.set_image(data);
    }
}

fn system_clipboard_image() -> Option<RgbaImage> {
    let mut clip = arboard::Clipboard::new().ok()?;
    let data = clip.get_image().ok()?;
    RgbaImage::from_raw(data.width as u32, data.height as u32, data.bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_layer(id: u64, x: f32, y: f32, w: u32, h: u32) -> Layer {
        let pixels = RgbaImage::from_fn(w, h, |px, py| {
            Rgba([px as u8, py as u8, (px + py) as u8, 255])
        });
        Layer::with_pixels(id, LayerContent::Image, x, y, pixels)
    }

    fn select_area(state: &mut EditorState, id: u64, rect: Rect) {
        state.selected_layer_id = Some(id);
        state.area_selection = Some(rect);
    }

    #[test]
    fn copy_requires_selection_and_area() {
        let mut state = EditorState::new(200, 200).unwrap();
        state.push_layer(gradient_layer(1, 0.0, 0.0, 50, 50));

        assert!(matches!(copy_area(&mut state), Err(EditorError::NoSelection)));
        state.area_selection = Some(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(matches!(copy_area(&mut state), Err(EditorError::NoSelection)));
        state.selected_layer_id = Some(1);
        assert!(copy_area(&mut state).is_ok());
        assert!(state.clipboard.is_some());
    }

    #[test]
    fn copy_extracts_the_exact_subregion_at_unit_scale() {
        let mut state = EditorState::new(200, 200).unwrap();
        state.push_layer(gradient_layer(1, 20.0, 30.0, 50, 50));
        select_area(&mut state, 1, Rect::new(25.0, 36.0, 8.0, 4.0));

        copy_area(&mut state).unwrap();
        let clip = state.clipboard.as_ref().unwrap();
        assert_eq!(clip.dimensions(), (8, 4));
        // Display (25, 36) is local (5, 6) on the layer.
        assert_eq!(clip.get_pixel(0, 0).0, [5, 6, 11, 255]);
        assert_eq!(clip.get_pixel(7, 3).0, [12, 9, 21, 255]);
    }

    #[test]
    fn copy_resamples_to_display_dimensions() {
        let mut state = EditorState::new(200, 200).unwrap();
        // 100x100 buffer shown at 50x50 (scale 0.5).
        let mut layer = gradient_layer(1, 0.0, 0.0, 100, 100);
        layer.width = 50.0;
        layer.height = 50.0;
        state.push_layer(layer);
        select_area(&mut state, 1, Rect::new(10.0, 10.0, 20.0, 20.0));

        copy_area(&mut state).unwrap();
        // 20x20 display rect, even though it covers 40x40 source pixels.
        assert_eq!(state.clipboard.as_ref().unwrap().dimensions(), (20, 20));
    }

    #[test]
    fn cut_clears_the_source_without_recording() {
        let mut state = EditorState::new(200, 200).unwrap();
        let mut history = HistoryManager::default();
        state.push_layer(gradient_layer(1, 0.0, 0.0, 50, 50));
        select_area(&mut state, 1, Rect::new(10.0, 10.0, 5.0, 5.0));

        cut_area(&mut state).unwrap();
        assert_eq!(history.undo_count(), 0);
        let layer = state.layer(1).unwrap();
        assert_eq!(layer.pixels.get_pixel(12, 12).0, [0, 0, 0, 0]);
        // Outside the cut the gradient survives.
        assert_eq!(layer.pixels.get_pixel(20, 20).0, [20, 20, 40, 255]);
        // Clipboard holds the pre-cut content.
        assert_eq!(
            state.clipboard.as_ref().unwrap().get_pixel(2, 2).0,
            [12, 12, 24, 255]
        );
    }

    #[test]
    fn paste_with_empty_clipboard_fails_cleanly() {
        let mut state = EditorState::new(200, 200).unwrap();
        let mut history = HistoryManager::default();
        assert!(matches!(
            paste_area(&mut state, &mut history),
            Err(EditorError::EmptyClipboard)
        ));
        assert!(state.layers.is_empty());
        assert_eq!(history.undo_count(), 0);
    }

    #[test]
    fn copy_paste_round_trip_is_pixel_identical() {
        let mut state = EditorState::new(200, 200).unwrap();
        let mut history = HistoryManager::default();
        state.push_layer(gradient_layer(1, 0.0, 0.0, 60, 60));
        select_area(&mut state, 1, Rect::new(12.0, 8.0, 16.0, 10.0));

        copy_area(&mut state).unwrap();
        let expected = state.clipboard.as_ref().unwrap().clone();
        let id = paste_area(&mut state, &mut history).unwrap();

        let pasted = state.layer(id).unwrap();
        assert_eq!(pasted.pixels, expected);
        // Placed at the selection origin, natural size, recorded as an add.
        assert_eq!((pasted.x, pasted.y), (12.0, 8.0));
        assert_eq!((pasted.original_width, pasted.original_height), (16, 10));
        assert_eq!(history.undo_count(), 1);
    }

    #[test]
    fn pasted_buffer_is_a_deep_copy_of_the_clipboard() {
        let mut state = EditorState::new(200, 200).unwrap();
        let mut history = HistoryManager::default();
        state.push_layer(gradient_layer(1, 0.0, 0.0, 30, 30));
        select_area(&mut state, 1, Rect::new(0.0, 0.0, 10.0, 10.0));

        copy_area(&mut state).unwrap();
        let id = paste_area(&mut state, &mut history).unwrap();
        // Scribbling on the pasted layer must not touch the clipboard.
        state
            .mutate_pixels(id, |img| img.put_pixel(0, 0, Rgba([9, 9, 9, 9])))
            .unwrap();
        assert_ne!(
            state.clipboard.as_ref().unwrap().get_pixel(0, 0).0,
            [9, 9, 9, 9]
        );
    }

    #[test]
    fn paste_without_area_selection_uses_the_fallback_offset() {
        let mut state = EditorState::new(200, 200).unwrap();
        let mut history = HistoryManager::default();
        state.clipboard = Some(RgbaImage::from_pixel(6, 6, Rgba([1, 2, 3, 255])));

        let id = paste_area(&mut state, &mut history).unwrap();
        let layer = state.layer(id).unwrap();
        assert_eq!((layer.x, layer.y), (10.0, 10.0));
    }
}
