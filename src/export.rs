//! The finish-action export contract.
//!
//! The shell's "finish" button asks the engine for one bundle: the flattened
//! stack, every layer rendered alone, and the mask-only composite.  All
//! bitmaps are PNG-encoded; the selection chrome is never part of an export.

use serde::Serialize;

use crate::canvas::{EditorState, Layer, LayerContent};
use crate::compositor;
use crate::io;

/// Per-layer type tag in the export, lowercase on the wire.
/// Resolution priority: Mask > Text > Shape > Image — a mask-flagged text
/// layer reports "mask".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportedLayerKind {
    Mask,
    Text,
    Shape,
    Image,
}

impl ExportedLayerKind {
    pub fn of(layer: &Layer) -> Self {
        if layer.mask {
            return ExportedLayerKind::Mask;
        }
        match layer.content {
            LayerContent::Text(_) => ExportedLayerKind::Text,
            LayerContent::Shape(_) => ExportedLayerKind::Shape,
            LayerContent::Image => ExportedLayerKind::Image,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportedLayerKind::Mask => "mask",
            ExportedLayerKind::Text => "text",
            ExportedLayerKind::Shape => "shape",
            ExportedLayerKind::Image => "image",
        }
    }
}

#[derive(Clone, Serialize)]
pub struct ExportedLayer {
    /// PNG of the layer alone at its natural size (mask layers in green).
    pub data: Vec<u8>,
    #[serde(rename = "type")]
    pub kind: ExportedLayerKind,
}

#[derive(Clone, Serialize)]
pub struct ExportBundle {
    /// PNG of the full stack flattened; mask layers render green.
    pub image: Vec<u8>,
    /// Every layer of the stack, bottom-to-top, including hidden ones.
    pub layers: Vec<ExportedLayer>,
    /// PNG of the mask-only flatten; empty when no layer is mask-flagged.
    pub masks: Vec<u8>,
}

/// Produce the export bundle for the current document.
pub fn export(state: &EditorState) -> ExportBundle {
    let image = io::encode_png(&compositor::composite(state));
    let layers = state
        .layers
        .iter()
        .map(|layer| ExportedLayer {
            data: io::encode_png(&compositor::composite_single(layer)),
            kind: ExportedLayerKind::of(layer),
        })
        .collect();
    let masks = if state.layers.iter().any(|l| l.mask) {
        io::encode_png(&compositor::composite_masks(state))
    } else {
        Vec::new()
    };
    ExportBundle {
        image,
        layers,
        masks,
    }
}
