//! Encoding/decoding helpers and the `.pstk` project file format.
//!
//! All raster encode/decode goes through the `image` crate.  Project files
//! are a small magic header followed by a versioned bincode record, so old
//! readers fail loudly on newer files instead of misparsing them.

use std::fs;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::canvas::{EditorState, Layer, LayerContent};
use crate::error::{EditorError, ProjectError};

// ---------------------------------------------------------------------------
//  Raster codecs
// ---------------------------------------------------------------------------

/// Encode a buffer as PNG.  Encoding RGBA to PNG cannot realistically fail
/// for well-formed buffers; on the off chance it does, the error is logged
/// and an empty payload returned rather than poisoning the caller.
pub fn encode_png(img: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new(&mut out);
    if let Err(e) = encoder.write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8) {
        log_err!("png encode failed for {}x{} buffer: {}", img.width(), img.height(), e);
        out.clear();
    }
    out
}

/// Decode any supported image format into an RGBA buffer.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, EditorError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| EditorError::DecodeFailed(e.to_string()))
}

/// Scale factor that fits `src` within `bounds` while preserving aspect
/// ratio, never scaling up.
pub fn fit_scale(src_w: u32, src_h: u32, bounds_w: u32, bounds_h: u32) -> f32 {
    let sw = bounds_w as f32 / src_w as f32;
    let sh = bounds_h as f32 / src_h as f32;
    sw.min(sh).min(1.0)
}

// ---------------------------------------------------------------------------
//  Project files (.pstk)
// ---------------------------------------------------------------------------

const PROJECT_MAGIC: &[u8; 4] = b"PSTK";
const PROJECT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct ProjectFileV1 {
    width: u32,
    height: u32,
    selected_layer_id: Option<u64>,
    layers: Vec<LayerRecordV1>,
}

#[derive(Serialize, Deserialize)]
struct LayerRecordV1 {
    id: u64,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    original_width: u32,
    original_height: u32,
    rotation: f32,
    opacity: f32,
    visible: bool,
    mask: bool,
    content: LayerContent,
    /// Raw RGBA bytes, `original_width * original_height * 4`.
    pixels: Vec<u8>,
}

impl LayerRecordV1 {
    fn from_layer(layer: &Layer) -> Self {
        Self {
            id: layer.id,
            x: layer.x,
            y: layer.y,
            width: layer.width,
            height: layer.height,
            original_width: layer.original_width,
            original_height: layer.original_height,
            rotation: layer.rotation,
            opacity: layer.opacity,
            visible: layer.visible,
            mask: layer.mask,
            content: layer.content.clone(),
            pixels: layer.pixels.as_raw().clone(),
        }
    }

    fn into_layer(self) -> Result<Layer, ProjectError> {
        let pixels = RgbaImage::from_raw(self.original_width, self.original_height, self.pixels)
            .ok_or_else(|| {
                ProjectError::InvalidFormat(format!(
                    "pixel payload does not match {}x{} layer {}",
                    self.original_width, self.original_height, self.id
                ))
            })?;
        let mut layer = Layer::with_pixels(self.id, self.content, self.x, self.y, pixels);
        layer.width = self.width;
        layer.height = self.height;
        layer.rotation = self.rotation;
        layer.opacity = self.opacity;
        layer.visible = self.visible;
        layer.mask = self.mask;
        Ok(layer)
    }
}

/// Save the whole document (geometry + pixels, not history) to `path`.
pub fn save_project(state: &EditorState, path: &Path) -> Result<(), ProjectError> {
    let record = ProjectFileV1 {
        width: state.width,
        height: state.height,
        selected_layer_id: state.selected_layer_id,
        layers: state.layers.iter().map(LayerRecordV1::from_layer).collect(),
    };
    let payload = bincode::serialize(&record).map_err(|e| ProjectError::Serialize(e.to_string()))?;

    let mut raw = Vec::with_capacity(PROJECT_MAGIC.len() + 2 + payload.len());
    raw.extend_from_slice(PROJECT_MAGIC);
    raw.extend_from_slice(&PROJECT_VERSION.to_le_bytes());
    raw.extend_from_slice(&payload);
    fs::write(path, raw)?;
    log_info!("saved project to {} ({} layers)", path.display(), state.layers.len());
    Ok(())
}

/// Load a document previously written by [`save_project`].
pub fn load_project(path: &Path) -> Result<EditorState, ProjectError> {
    let raw = fs::read(path)?;
    if raw.len() < PROJECT_MAGIC.len() + 2 || &raw[..4] != PROJECT_MAGIC {
        return Err(ProjectError::InvalidFormat("missing PSTK header".to_string()));
    }
    let version = u16::from_le_bytes([raw[4], raw[5]]);
    if version != PROJECT_VERSION {
        return Err(ProjectError::InvalidFormat(format!(
            "unsupported project version {}",
            version
        )));
    }
    let record: ProjectFileV1 =
        bincode::deserialize(&raw[6..]).map_err(|e| ProjectError::Serialize(e.to_string()))?;

    let layers = record
        .layers
        .into_iter()
        .map(LayerRecordV1::into_layer)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EditorState::restore(
        record.width,
        record.height,
        layers,
        record.selected_layer_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::LayerContent;
    use image::Rgba;

    #[test]
    fn png_round_trip_preserves_pixels() {
        let mut img = RgbaImage::new(5, 3);
        img.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        img.put_pixel(4, 2, Rgba([250, 251, 252, 253]));
        let decoded = decode_image(&encode_png(&img)).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn decode_garbage_reports_decode_failed() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(EditorError::DecodeFailed(_))
        ));
    }

    #[test]
    fn fit_scale_never_scales_up() {
        assert_eq!(fit_scale(100, 100, 800, 600), 1.0);
        assert_eq!(fit_scale(1600, 600, 800, 600), 0.5);
        assert_eq!(fit_scale(800, 1200, 800, 600), 0.5);
    }

    #[test]
    fn project_round_trip() {
        let mut state = EditorState::new(320, 240).unwrap();
        let id = state.alloc_layer_id();
        let mut img = RgbaImage::new(8, 8);
        img.put_pixel(3, 3, Rgba([7, 8, 9, 255]));
        let mut layer = Layer::with_pixels(id, LayerContent::Image, 12.0, 34.0, img);
        layer.rotation = 15.0;
        layer.opacity = 0.5;
        layer.mask = true;
        state.push_layer(layer);
        state.selected_layer_id = Some(id);

        let path = std::env::temp_dir().join(format!("photostack-io-test-{}.pstk", std::process::id()));
        save_project(&state, &path).unwrap();
        let loaded = load_project(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.width, 320);
        assert_eq!(loaded.height, 240);
        assert_eq!(loaded.selected_layer_id, Some(id));
        let l = loaded.layer(id).unwrap();
        assert_eq!(l.rotation, 15.0);
        assert_eq!(l.opacity, 0.5);
        assert!(l.mask);
        assert_eq!(l.pixels.get_pixel(3, 3).0, [7, 8, 9, 255]);
    }

    #[test]
    fn load_rejects_wrong_magic() {
        let path = std::env::temp_dir().join(format!("photostack-io-bad-{}.pstk", std::process::id()));
        std::fs::write(&path, b"NOPE.....").unwrap();
        let err = load_project(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, ProjectError::InvalidFormat(_)));
    }
}
