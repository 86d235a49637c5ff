use std::collections::VecDeque;

use image::RgbaImage;

use crate::canvas::{EditorState, Layer, LayerContent};
use crate::decode::DecodePool;
use crate::io;

// ============================================================================
// LAYER SNAPSHOT — value copy of a layer, optionally with encoded pixels
// ============================================================================

/// A value-typed copy of every layer field.  Add/remove actions embed the
/// PNG-encoded pixel buffer so the layer can be fully resurrected; modify
/// actions normally omit it (move/resize/rotate/opacity/mask-toggle never
/// touch pixels) but may carry it when the edit rewrote the buffer.
#[derive(Clone, Debug)]
pub struct LayerSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub original_width: u32,
    pub original_height: u32,
    pub rotation: f32,
    pub opacity: f32,
    pub visible: bool,
    pub mask: bool,
    pub content: LayerContent,
    /// PNG-encoded copy of the buffer, when captured.
    pub pixel_data: Option<Vec<u8>>,
}

impl LayerSnapshot {
    pub fn capture(layer: &Layer, include_pixels: bool) -> Self {
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
            pixel_data: include_pixels.then(|| io::encode_png(&layer.pixels)),
        }
    }

    /// Reconstruct a full layer.  When the snapshot carries pixel data the
    /// layer comes back with a blank buffer and the decode is scheduled on
    /// the pool — it fills in without blocking and without any history event.
    pub fn make_layer(&self, decode: &mut DecodePool) -> Layer {
        let mut layer = Layer::new(
            self.id,
            self.content.clone(),
            self.x,
            self.y,
            self.original_width,
            self.original_height,
        );
        layer.width = self.width;
        layer.height = self.height;
        layer.rotation = self.rotation;
        layer.opacity = self.opacity;
        layer.visible = self.visible;
        layer.mask = self.mask;
        if let Some(data) = &self.pixel_data {
            layer.pending_decode = true;
            decode.decode_into_layer(layer.id, data.clone());
        }
        layer
    }

    /// Overwrite a live layer's fields from this snapshot.  The buffer is
    /// only touched when the snapshot carries pixel data (or the buffer
    /// dimensions changed and must be reallocated).
    pub fn apply_to(&self, layer: &mut Layer, decode: &mut DecodePool) {
        layer.x = self.x;
        layer.y = self.y;
        layer.width = self.width;
        layer.height = self.height;
        layer.rotation = self.rotation;
        layer.opacity = self.opacity;
        layer.visible = self.visible;
        layer.mask = self.mask;
        layer.content = self.content.clone();
        if (layer.original_width, layer.original_height)
            != (self.original_width, self.original_height)
        {
            layer.original_width = self.original_width;
            layer.original_height = self.original_height;
            layer.pixels = RgbaImage::new(self.original_width, self.original_height);
        }
        if let Some(data) = &self.pixel_data {
            layer.pending_decode = true;
            decode.decode_into_layer(layer.id, data.clone());
        }
    }

    pub fn memory_size(&self) -> usize {
        let content_bytes = match &self.content {
            LayerContent::Text(t) => t.text.len() + t.font_family.len(),
            _ => 0,
        };
        std::mem::size_of::<Self>()
            + content_bytes
            + self.pixel_data.as_ref().map_or(0, |d| d.len())
    }
}

// ============================================================================
// HISTORY ACTIONS
// ============================================================================

/// One completed structural edit.  Pen strokes and area cuts are pixel edits
/// and never appear here.
#[derive(Clone, Debug)]
pub enum HistoryAction {
    LayerAdded {
        layer_id: u64,
        after: LayerSnapshot,
    },
    LayerRemoved {
        layer_id: u64,
        before: LayerSnapshot,
    },
    LayerModified {
        layer_id: u64,
        before: LayerSnapshot,
        after: LayerSnapshot,
    },
}

impl HistoryAction {
    fn undo(&self, state: &mut EditorState, decode: &mut DecodePool) {
        match self {
            HistoryAction::LayerAdded { layer_id, .. } => {
                state.remove_layer(*layer_id);
            }
            HistoryAction::LayerRemoved { before, .. } => {
                // Reappears on top of the stack; the original z-position is
                // not restored (known limitation, see DESIGN.md).
                state.push_layer(before.make_layer(decode));
            }
            HistoryAction::LayerModified {
                layer_id, before, ..
            } => {
                if let Some(layer) = state.layer_mut(*layer_id) {
                    before.apply_to(layer, decode);
                }
            }
        }
    }

    fn redo(&self, state: &mut EditorState, decode: &mut DecodePool) {
        match self {
            HistoryAction::LayerAdded { after, .. } => {
                state.push_layer(after.make_layer(decode));
            }
            HistoryAction::LayerRemoved { layer_id, .. } => {
                state.remove_layer(*layer_id);
            }
            HistoryAction::LayerModified { layer_id, after, .. } => {
                if let Some(layer) = state.layer_mut(*layer_id) {
                    after.apply_to(layer, decode);
                }
            }
        }
    }

    pub fn description(&self) -> String {
        match self {
            HistoryAction::LayerAdded { layer_id, after } => {
                format!("Add {} #{}", after.content.label(), layer_id)
            }
            HistoryAction::LayerRemoved { layer_id, before } => {
                format!("Remove {} #{}", before.content.label(), layer_id)
            }
            HistoryAction::LayerModified { layer_id, .. } => {
                format!("Modify Layer #{}", layer_id)
            }
        }
    }

    pub fn memory_size(&self) -> usize {
        match self {
            HistoryAction::LayerAdded { after, .. } => after.memory_size(),
            HistoryAction::LayerRemoved { before, .. } => before.memory_size(),
            HistoryAction::LayerModified { before, after, .. } => {
                before.memory_size() + after.memory_size()
            }
        }
    }
}

// ============================================================================
// HISTORY MANAGER — two stacks, strictly LIFO, with depth/memory pruning
// ============================================================================

pub struct HistoryManager {
    undo_stack: VecDeque<HistoryAction>,
    redo_stack: VecDeque<HistoryAction>,
    max_depth: usize,
    /// Optional byte cap across both stacks.
    max_memory_bytes: Option<usize>,
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            max_memory_bytes: Some(100 * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// Record a completed structural edit.  Any pending redo future is gone.
    pub fn record(&mut self, action: HistoryAction) {
        for dropped in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
        }
        self.total_memory += action.memory_size();
        self.undo_stack.push_back(action);
        self.prune();
    }

    /// Apply the inverse of the most recent action.  Silent no-op on an
    /// empty stack.
    pub fn undo(&mut self, state: &mut EditorState, decode: &mut DecodePool) -> Option<String> {
        let action = self.undo_stack.pop_back()?;
        let description = action.description();
        action.undo(state, decode);
        self.redo_stack.push_back(action);
        Some(description)
    }

    /// Re-apply the most recently undone action.  Silent no-op on an empty
    /// stack.
    pub fn redo(&mut self, state: &mut EditorState, decode: &mut DecodePool) -> Option<String> {
        let action = self.redo_stack.pop_back()?;
        let description = action.description();
        action.redo(state, decode);
        self.undo_stack.push_back(action);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|a| a.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|a| a.description())
    }

    /// Current history memory footprint (O(1), cached).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Drop the oldest undo entries past the depth and byte caps.
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_depth {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }
}
