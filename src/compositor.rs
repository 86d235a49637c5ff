//! CPU compositor.
//!
//! Layers are painted bottom-to-top into an RGBA target by inverse-mapping
//! every covered target pixel through the layer's affine placement and
//! bilinear-sampling the buffer — the same row-parallel structure the rest of
//! the crate uses for pixel loops.  Mask-flagged layers are sampled through a
//! green-substitution filter computed on an isolated copy; the stored buffer
//! is never touched.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{EditorState, Layer, Tool, ToolContext};

/// Selection chrome color (outline + handles).
const OVERLAY_COLOR: [u8; 4] = [0x01, 0x8d, 0xff, 0xff];
/// On-screen handle square size, in display pixels, at any layer scale.
const HANDLE_SIZE: f32 = 8.0;
/// On-screen outline stroke width, in display pixels.
const OUTLINE_WIDTH: f32 = 2.0;

/// Flatten the full stack (no selection chrome).  This is what exports see.
pub fn composite(state: &EditorState) -> RgbaImage {
    composite_inner(state, None)
}

/// Flatten the full stack, drawing the selection outline and resize handles
/// over the selected layer when the active tool is Select.
pub fn composite_with_overlay(state: &EditorState, tools: &ToolContext) -> RgbaImage {
    let overlay = if tools.tool == Tool::Select {
        state.selected_layer_id
    } else {
        None
    };
    composite_inner(state, overlay)
}

fn composite_inner(state: &EditorState, overlay_layer: Option<u64>) -> RgbaImage {
    let mut target = RgbaImage::new(state.width, state.height);
    for layer in &state.layers {
        if !layer.visible {
            continue;
        }
        draw_layer(&mut target, layer, overlay_layer == Some(layer.id));
    }
    target
}

/// Flatten only the mask-flagged layers, each through the green filter.
/// Blank result when nothing is flagged.
pub fn composite_masks(state: &EditorState) -> RgbaImage {
    let mut target = RgbaImage::new(state.width, state.height);
    for layer in &state.layers {
        if !layer.visible || !layer.mask {
            continue;
        }
        draw_layer(&mut target, layer, false);
    }
    target
}

/// One layer alone at its natural (buffer) size — thumbnails and per-layer
/// export.  No placement transform; the mask filter still applies.
pub fn composite_single(layer: &Layer) -> RgbaImage {
    if layer.mask {
        mask_filter(&layer.pixels)
    } else {
        layer.pixels.clone()
    }
}

/// Aspect-fit preview of one layer for layer-list thumbnails: the layer is
/// rendered alone, scaled to fit the box, and centered on a transparent
/// letterbox.
pub fn thumbnail(layer: &Layer, width: u32, height: u32) -> RgbaImage {
    let src = composite_single(layer);
    let scale = (width as f32 / src.width() as f32).min(height as f32 / src.height() as f32);
    let nw = ((src.width() as f32 * scale).round() as u32).clamp(1, width);
    let nh = ((src.height() as f32 * scale).round() as u32).clamp(1, height);
    let scaled = image::imageops::resize(&src, nw, nh, image::imageops::FilterType::Triangle);
    let mut out = RgbaImage::new(width, height);
    image::imageops::replace(
        &mut out,
        &scaled,
        ((width - nw) / 2) as i64,
        ((height - nh) / 2) as i64,
    );
    out
}

/// Green-substitution filter: every pixel with alpha > 0 has its RGB forced
/// to pure green, alpha unchanged; fully transparent pixels are untouched.
/// Always returns a fresh buffer.
pub fn mask_filter(src: &RgbaImage) -> RgbaImage {
    let mut out = src.clone();
    for px in out.pixels_mut() {
        if px[3] > 0 {
            px[0] = 0;
            px[1] = 255;
            px[2] = 0;
        }
    }
    out
}

fn draw_layer(target: &mut RgbaImage, layer: &Layer, overlay: bool) {
    let forward = layer.transform();
    let inverse = forward.invert();
    let ow = layer.original_width as f32;
    let oh = layer.original_height as f32;

    // Handle/outline sizes compensated into local units so the chrome stays
    // a constant number of display pixels at any layer scale.
    let handle_local = HANDLE_SIZE / layer.scale_x();
    let handle_half = handle_local * 0.5;
    let outline_half = (OUTLINE_WIDTH / layer.scale_x()) * 0.5;
    let pad = if overlay { handle_half } else { 0.0 };

    // Display-space AABB of the (padded) local rect, clamped to the target.
    let corners = [
        forward.apply(-pad, -pad),
        forward.apply(ow + pad, -pad),
        forward.apply(-pad, oh + pad),
        forward.apply(ow + pad, oh + pad),
    ];
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(cx, cy) in &corners {
        min_x = min_x.min(cx);
        min_y = min_y.min(cy);
        max_x = max_x.max(cx);
        max_y = max_y.max(cy);
    }
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32 + 1).min(target.width());
    let y1 = (max_y.ceil().max(0.0) as u32 + 1).min(target.height());
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    // A pending-decode layer has no content yet but still shows its chrome.
    let filtered;
    let src = if layer.mask {
        filtered = mask_filter(&layer.pixels);
        &filtered
    } else {
        &layer.pixels
    };
    let src_raw = src.as_raw();
    let src_w = src.width() as i32;
    let src_h = src.height() as i32;
    let opacity = layer.opacity.clamp(0.0, 1.0);
    let skip_content = layer.pending_decode;

    let row_bytes = target.width() as usize * 4;
    target
        .as_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(dy, row)| {
            let dy = dy as u32;
            if dy < y0 || dy >= y1 {
                return;
            }
            for dx in x0..x1 {
                let (lx, ly) = inverse.apply(dx as f32, dy as f32);
                let idx = dx as usize * 4;
                if !skip_content
                    && let Some(px) = sample_bilinear(src_raw, src_w, src_h, lx, ly)
                {
                    blend_over(&mut row[idx..idx + 4], px, opacity);
                }
                if overlay && overlay_hit(lx, ly, ow, oh, outline_half, handle_half) {
                    blend_over(&mut row[idx..idx + 4], OVERLAY_COLOR, opacity);
                }
            }
        });
}

/// Bilinear sample with a transparent border; `None` when the point is
/// entirely outside the buffer or lands on nothing.
pub(crate) fn sample_bilinear(raw: &[u8], w: i32, h: i32, x: f32, y: f32) -> Option<[u8; 4]> {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return None;
    }
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let fetch = |sx: i32, sy: i32| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0.0; 4]
        } else {
            let idx = (sy as usize * w as usize + sx as usize) * 4;
            [
                raw[idx] as f32,
                raw[idx + 1] as f32,
                raw[idx + 2] as f32,
                raw[idx + 3] as f32,
            ]
        }
    };

    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1, y0);
    let bl = fetch(x0, y0 + 1);
    let br = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = tl[i] + (tr[i] - tl[i]) * fx;
        let bottom = bl[i] + (br[i] - bl[i]) * fx;
        out[i] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    if out[3] == 0 {
        return None;
    }
    Some(out)
}

/// Straight-alpha source-over into a 4-byte destination slice.
fn blend_over(dst: &mut [u8], src: [u8; 4], opacity: f32) {
    let sa = src[3] as f32 / 255.0 * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    for i in 0..3 {
        let s = src[i] as f32;
        let d = dst[i] as f32;
        dst[i] = ((s * sa + d * da * (1.0 - sa)) / oa).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Membership test for the selection chrome, all in local coordinates: a
/// stroke band centered on the `(0,0,ow,oh)` boundary plus eight handle
/// squares on the corners and edge midpoints.
fn overlay_hit(lx: f32, ly: f32, ow: f32, oh: f32, outline_half: f32, handle_half: f32) -> bool {
    if lx >= -outline_half
        && lx <= ow + outline_half
        && ly >= -outline_half
        && ly <= oh + outline_half
    {
        let on_vertical = lx.abs() <= outline_half || (lx - ow).abs() <= outline_half;
        let on_horizontal = ly.abs() <= outline_half || (ly - oh).abs() <= outline_half;
        if on_vertical || on_horizontal {
            return true;
        }
    }

    let centers = [
        (0.0, 0.0),
        (ow * 0.5, 0.0),
        (ow, 0.0),
        (0.0, oh * 0.5),
        (ow, oh * 0.5),
        (0.0, oh),
        (ow * 0.5, oh),
        (ow, oh),
    ];
    centers
        .iter()
        .any(|&(hx, hy)| (lx - hx).abs() <= handle_half && (ly - hy).abs() <= handle_half)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::LayerContent;

    fn solid_layer(id: u64, x: f32, y: f32, w: u32, h: u32, color: [u8; 4]) -> Layer {
        let pixels = RgbaImage::from_pixel(w, h, Rgba(color));
        Layer::with_pixels(id, LayerContent::Image, x, y, pixels)
    }

    #[test]
    fn mask_filter_greens_opaque_pixels_and_leaves_transparent_bytes() {
        let mut src = RgbaImage::new(4, 2);
        src.put_pixel(0, 0, Rgba([120, 13, 77, 255]));
        src.put_pixel(1, 0, Rgba([1, 2, 3, 1]));
        src.put_pixel(2, 0, Rgba([55, 66, 77, 0])); // transparent, RGB garbage kept
        let out = mask_filter(&src);

        assert_eq!(out.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [0, 255, 0, 1]);
        assert_eq!(out.get_pixel(2, 0).0, [55, 66, 77, 0]);
        assert_eq!(out.get_pixel(3, 1).0, [0, 0, 0, 0]);
        // Source untouched.
        assert_eq!(src.get_pixel(0, 0).0, [120, 13, 77, 255]);
    }

    #[test]
    fn composite_respects_stack_order_and_visibility() {
        let mut state = EditorState::new(40, 40).unwrap();
        state.push_layer(solid_layer(1, 0.0, 0.0, 40, 40, [200, 0, 0, 255]));
        state.push_layer(solid_layer(2, 0.0, 0.0, 40, 40, [0, 0, 200, 255]));

        let out = composite(&state);
        assert_eq!(out.get_pixel(20, 20).0, [0, 0, 200, 255]);

        state.layer_mut(2).unwrap().visible = false;
        let out = composite(&state);
        assert_eq!(out.get_pixel(20, 20).0, [200, 0, 0, 255]);
    }

    #[test]
    fn composite_places_and_scales_layers() {
        let mut state = EditorState::new(40, 40).unwrap();
        let mut layer = solid_layer(1, 10.0, 10.0, 5, 5, [9, 9, 9, 255]);
        layer.width = 20.0; // 4x scale up
        layer.height = 20.0;
        state.push_layer(layer);

        let out = composite(&state);
        assert_eq!(out.get_pixel(5, 5).0, [0, 0, 0, 0]);
        assert_eq!(out.get_pixel(15, 15).0, [9, 9, 9, 255]);
        assert_eq!(out.get_pixel(35, 35).0, [0, 0, 0, 0]);
    }

    #[test]
    fn composite_applies_opacity() {
        let mut state = EditorState::new(10, 10).unwrap();
        let mut layer = solid_layer(1, 0.0, 0.0, 10, 10, [100, 200, 60, 255]);
        layer.opacity = 0.5;
        state.push_layer(layer);

        let px = composite(&state).get_pixel(5, 5).0;
        assert_eq!(&px[..3], &[100, 200, 60]);
        assert!((px[3] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn mask_layers_flatten_green_in_stack_and_mask_channel() {
        let mut state = EditorState::new(20, 20).unwrap();
        state.push_layer(solid_layer(1, 0.0, 0.0, 20, 20, [50, 50, 50, 255]));
        let mut mask = solid_layer(2, 0.0, 0.0, 20, 20, [255, 0, 255, 255]);
        mask.mask = true;
        state.push_layer(mask);

        assert_eq!(composite(&state).get_pixel(10, 10).0, [0, 255, 0, 255]);
        assert_eq!(composite_masks(&state).get_pixel(10, 10).0, [0, 255, 0, 255]);

        state.layer_mut(2).unwrap().mask = false;
        // No mask layers left: blank mask channel.
        assert_eq!(composite_masks(&state).get_pixel(10, 10).0, [0, 0, 0, 0]);
    }

    #[test]
    fn composite_single_keeps_local_size() {
        let mut layer = solid_layer(1, 3.0, 4.0, 6, 8, [10, 20, 30, 255]);
        layer.width = 60.0;
        layer.height = 80.0;
        let out = composite_single(&layer);
        assert_eq!(out.dimensions(), (6, 8));
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 30, 255]);

        layer.mask = true;
        assert_eq!(composite_single(&layer).get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn selection_chrome_only_with_select_tool() {
        let mut state = EditorState::new(60, 60).unwrap();
        state.push_layer(solid_layer(7, 20.0, 20.0, 20, 20, [40, 40, 40, 255]));
        state.selected_layer_id = Some(7);
        let mut tools = ToolContext::default();

        // Outline band runs along local x = 0 → display x ≈ 20.
        let with = composite_with_overlay(&state, &tools);
        assert_eq!(with.get_pixel(20, 30).0, [0x01, 0x8d, 0xff, 255]);

        tools.tool = Tool::Pen;
        let without = composite_with_overlay(&state, &tools);
        assert_eq!(without.get_pixel(20, 30).0, [40, 40, 40, 255]);

        // Exports never carry chrome either.
        assert_eq!(composite(&state).get_pixel(20, 30).0, [40, 40, 40, 255]);
    }

    #[test]
    fn handles_extend_past_the_corner() {
        let mut state = EditorState::new(60, 60).unwrap();
        state.push_layer(solid_layer(7, 20.0, 20.0, 20, 20, [40, 40, 40, 255]));
        state.selected_layer_id = Some(7);
        let tools = ToolContext::default();

        // Corner handle is 8 display px centered on (20, 20): 17 is inside it,
        // 14 is outside everything.
        let out = composite_with_overlay(&state, &tools);
        assert_eq!(out.get_pixel(17, 17).0, [0x01, 0x8d, 0xff, 255]);
        assert_eq!(out.get_pixel(14, 14).0, [0, 0, 0, 0]);
    }

    #[test]
    fn thumbnail_letterboxes_to_the_requested_box() {
        // 100x50 source into an 80x80 box: scaled to 80x40, centered.
        let layer = solid_layer(1, 0.0, 0.0, 100, 50, [30, 60, 90, 255]);
        let out = thumbnail(&layer, 80, 80);
        assert_eq!(out.dimensions(), (80, 80));
        assert_eq!(out.get_pixel(40, 40).0, [30, 60, 90, 255]);
        assert_eq!(out.get_pixel(40, 10).0, [0, 0, 0, 0]);
        assert_eq!(out.get_pixel(40, 70).0, [0, 0, 0, 0]);
    }

    #[test]
    fn pending_decode_layer_renders_empty() {
        let mut state = EditorState::new(20, 20).unwrap();
        let mut layer = solid_layer(1, 0.0, 0.0, 20, 20, [99, 99, 99, 255]);
        layer.pending_decode = true;
        state.push_layer(layer);
        assert_eq!(composite(&state).get_pixel(10, 10).0, [0, 0, 0, 0]);
    }
}
