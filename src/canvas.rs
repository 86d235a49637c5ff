use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::components::history::{HistoryAction, HistoryManager, LayerSnapshot};
use crate::error::EditorError;
use crate::geometry::{LayerTransform, Rect};

/// Minimum display-space dimension for a layer; enforced by every resize path.
pub const MIN_LAYER_SIZE: f32 = 10.0;
/// Minimum working-canvas dimension.
pub const MIN_CANVAS_SIZE: u32 = 10;

// ============================================================================
// TOOLS & SESSION CONTEXT
// ============================================================================

/// The active tool.  The engine only branches on this for overlay drawing and
/// the drag state machine; everything else is the shell's concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    AreaSelect,
    Pen,
    Text,
    Shape,
    CanvasSettings,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::AreaSelect => "Select Area",
            Tool::Pen => "Pen",
            Tool::Text => "Text",
            Tool::Shape => "Shape",
            Tool::CanvasSettings => "Canvas Settings",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[
            Tool::Select,
            Tool::AreaSelect,
            Tool::Pen,
            Tool::Text,
            Tool::Shape,
            Tool::CanvasSettings,
        ]
    }
}

/// Mutable tool settings, passed explicitly to the operations that need them.
/// There is deliberately no ambient/global settings state in the crate.
#[derive(Clone, Debug)]
pub struct ToolContext {
    pub tool: Tool,
    pub pen_color: [u8; 4],
    pub pen_size: f32,
    pub shape: ShapeStyle,
    pub text: TextStyle,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            tool: Tool::Select,
            pen_color: [255, 0, 0, 255],
            pen_size: 5.0,
            shape: ShapeStyle::default(),
            text: TextStyle::default(),
        }
    }
}

// ============================================================================
// LAYER CONTENT
// ============================================================================

/// Shape primitives a shape layer can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Square,
    Circle,
    Triangle,
    Rectangle,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Square => "Square",
            ShapeKind::Circle => "Circle",
            ShapeKind::Triangle => "Triangle",
            ShapeKind::Rectangle => "Rectangle",
        }
    }

    pub fn all() -> &'static [ShapeKind] {
        &[
            ShapeKind::Square,
            ShapeKind::Circle,
            ShapeKind::Triangle,
            ShapeKind::Rectangle,
        ]
    }
}

/// How a shape is painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeFillMode {
    Filled,
    Outline,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub kind: ShapeKind,
    pub mode: ShapeFillMode,
    pub stroke_width: f32,
    pub color: [u8; 4],
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            kind: ShapeKind::Square,
            mode: ShapeFillMode::Filled,
            stroke_width: 2.0,
            color: [255, 0, 0, 255],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub text: String,
    pub color: [u8; 4],
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            text: String::new(),
            color: [0, 0, 0, 255],
            font_family: "Arial".to_string(),
            font_size: 24.0,
            bold: false,
            italic: false,
        }
    }
}

/// What a layer's pixels came from.  The mask flag is orthogonal: any content
/// origin can additionally be flagged as a mask (see [`Layer::mask`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayerContent {
    Image,
    Text(TextStyle),
    Shape(ShapeStyle),
}

impl LayerContent {
    pub fn label(&self) -> &'static str {
        match self {
            LayerContent::Image => "Image Layer",
            LayerContent::Text(_) => "Text Layer",
            LayerContent::Shape(_) => "Shape Layer",
        }
    }
}

// ============================================================================
// LAYER
// ============================================================================

/// One addressable, independently transformable content unit in the stack.
///
/// `pixels` is always `original_width × original_height` (local space) and is
/// exclusively owned by the layer; display placement and size live in
/// `x/y/width/height`, rotation in degrees about the layer center.
#[derive(Clone, Debug)]
pub struct Layer {
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
    pub pixels: RgbaImage,
    /// True while a background decode for this layer is outstanding; the
    /// layer renders as empty until the pool fills it in.
    pub pending_decode: bool,
}

impl Layer {
    /// New transparent layer displayed at its natural (buffer) size.
    pub fn new(
        id: u64,
        content: LayerContent,
        x: f32,
        y: f32,
        original_width: u32,
        original_height: u32,
    ) -> Self {
        let original_width = original_width.max(1);
        let original_height = original_height.max(1);
        Self {
            id,
            x,
            y,
            width: original_width as f32,
            height: original_height as f32,
            original_width,
            original_height,
            rotation: 0.0,
            opacity: 1.0,
            visible: true,
            mask: false,
            content,
            pixels: RgbaImage::new(original_width, original_height),
            pending_decode: false,
        }
    }

    /// New layer owning an existing buffer, displayed at buffer size.
    pub fn with_pixels(id: u64, content: LayerContent, x: f32, y: f32, pixels: RgbaImage) -> Self {
        let mut layer = Self::new(id, content, x, y, pixels.width(), pixels.height());
        layer.pixels = pixels;
        layer
    }

    /// Forward transform, local space → display space.
    pub fn transform(&self) -> LayerTransform {
        LayerTransform::forward(
            self.x,
            self.y,
            self.width,
            self.height,
            self.original_width,
            self.original_height,
            self.rotation,
        )
    }

    pub fn scale_x(&self) -> f32 {
        self.width / self.original_width as f32
    }

    pub fn scale_y(&self) -> f32 {
        self.height / self.original_height as f32
    }

    /// Display-space bounding box, axis-aligned, rotation ignored.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

// ============================================================================
// EDITOR STATE — layer store + session context
// ============================================================================

/// The document: working canvas bounds, the ordered layer stack (index 0 =
/// bottom), the selection, the area-select rectangle, and the clipboard.
/// All mutation happens on the single control thread; operations that must
/// be undoable go through [`EditorState::mutate_structural`], pixel edits
/// through [`EditorState::mutate_pixels`].
#[derive(Debug)]
pub struct EditorState {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
    pub selected_layer_id: Option<u64>,
    /// Single owned buffer, replaced wholesale on every copy/cut.
    pub clipboard: Option<RgbaImage>,
    /// Live area-selection rectangle (display space), if any.
    pub area_selection: Option<Rect>,
    next_layer_id: u64,
}

impl EditorState {
    pub fn new(width: u32, height: u32) -> Result<Self, EditorError> {
        if width < MIN_CANVAS_SIZE || height < MIN_CANVAS_SIZE {
            return Err(EditorError::InvalidCanvasSize { width, height });
        }
        Ok(Self {
            width,
            height,
            layers: Vec::new(),
            selected_layer_id: None,
            clipboard: None,
            area_selection: None,
            next_layer_id: 1,
        })
    }

    /// Rebuild a state from previously saved parts (project load).  The id
    /// counter resumes past the highest id present so ids are never reused.
    pub fn restore(
        width: u32,
        height: u32,
        layers: Vec<Layer>,
        selected_layer_id: Option<u64>,
    ) -> Self {
        let next_layer_id = layers.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        Self {
            width,
            height,
            layers,
            selected_layer_id,
            clipboard: None,
            area_selection: None,
            next_layer_id,
        }
    }

    /// Allocate the next layer id — monotonic, never reused in a session.
    pub fn alloc_layer_id(&mut self) -> u64 {
        let id = self.next_layer_id;
        self.next_layer_id += 1;
        id
    }

    pub fn layer(&self, id: u64) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: u64) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn layer_index(&self, id: u64) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected_layer_id.and_then(|id| self.layer(id))
    }

    pub fn selected_layer_mut(&mut self) -> Option<&mut Layer> {
        let id = self.selected_layer_id?;
        self.layer_mut(id)
    }

    /// Append a layer on top of the stack.
    pub fn push_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Remove a layer by id; clears the selection if it pointed there.
    pub fn remove_layer(&mut self, id: u64) -> Option<Layer> {
        let idx = self.layer_index(id)?;
        if self.selected_layer_id == Some(id) {
            self.selected_layer_id = None;
        }
        Some(self.layers.remove(idx))
    }

    // ---- hit testing --------------------------------------------------------

    /// Topmost visible layer whose buffer is opaque under the display-space
    /// point `(x, y)`.
    ///
    /// The bounding-box pre-filter is axis-aligned and the local mapping uses
    /// the plain scale factors — rotation is intentionally ignored, so a
    /// rotated layer is pickable over its enlarged axis-aligned box wherever
    /// the sampled local pixel is opaque.  One pixel read per candidate:
    /// fine at pointer rate, never called from render loops.
    pub fn topmost_layer_at(&self, x: f32, y: f32) -> Option<&Layer> {
        for layer in self.layers.iter().rev() {
            if !layer.visible {
                continue;
            }
            if x < layer.x || x > layer.x + layer.width {
                continue;
            }
            if y < layer.y || y > layer.y + layer.height {
                continue;
            }
            let tx = ((x - layer.x) * layer.original_width as f32 / layer.width).floor();
            let ty = ((y - layer.y) * layer.original_height as f32 / layer.height).floor();
            if tx < 0.0 || ty < 0.0 {
                continue;
            }
            let (tx, ty) = (tx as u32, ty as u32);
            if tx >= layer.original_width || ty >= layer.original_height {
                continue;
            }
            if layer.pixels.get_pixel(tx, ty)[3] > 0 {
                return Some(layer);
            }
        }
        None
    }

    // ---- mutation entry points ---------------------------------------------

    /// Structural edit: snapshot the layer's fields before and after `f` runs
    /// and record one `LayerModified` action.  Pixel data is not captured —
    /// use [`EditorState::mutate_structural_with_pixels`] when the edit also
    /// rewrites the buffer.
    pub fn mutate_structural<F>(
        &mut self,
        history: &mut HistoryManager,
        id: u64,
        f: F,
    ) -> Result<(), EditorError>
    where
        F: FnOnce(&mut Layer),
    {
        self.mutate_structural_inner(history, id, false, f)
    }

    /// Structural edit whose snapshots embed the pixel buffer (used when the
    /// modification changes pixel content, e.g. re-rasterizing a text layer).
    pub fn mutate_structural_with_pixels<F>(
        &mut self,
        history: &mut HistoryManager,
        id: u64,
        f: F,
    ) -> Result<(), EditorError>
    where
        F: FnOnce(&mut Layer),
    {
        self.mutate_structural_inner(history, id, true, f)
    }

    fn mutate_structural_inner<F>(
        &mut self,
        history: &mut HistoryManager,
        id: u64,
        include_pixels: bool,
        f: F,
    ) -> Result<(), EditorError>
    where
        F: FnOnce(&mut Layer),
    {
        let Some(layer) = self.layer_mut(id) else {
            return Err(EditorError::NoSelection);
        };
        let before = LayerSnapshot::capture(layer, include_pixels);
        f(layer);
        let after = LayerSnapshot::capture(layer, include_pixels);
        history.record(HistoryAction::LayerModified {
            layer_id: id,
            before,
            after,
        });
        Ok(())
    }

    /// Pixel edit: mutate the layer's buffer with no history record.  Pen
    /// strokes and area cuts go through here — the no-undo-for-pixel-edits
    /// policy is enforced by this API split, not by call-site convention.
    pub fn mutate_pixels<F>(&mut self, id: u64, f: F) -> Result<(), EditorError>
    where
        F: FnOnce(&mut RgbaImage),
    {
        let Some(layer) = self.layer_mut(id) else {
            return Err(EditorError::NoSelection);
        };
        f(&mut layer.pixels);
        Ok(())
    }
}

/// Fully transparent pixel constant used across the crate.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::history::HistoryManager;

    fn solid_layer(id: u64, x: f32, y: f32, w: u32, h: u32, color: [u8; 4]) -> Layer {
        let pixels = RgbaImage::from_pixel(w, h, Rgba(color));
        Layer::with_pixels(id, LayerContent::Image, x, y, pixels)
    }

    #[test]
    fn canvas_size_floor_is_enforced() {
        assert!(matches!(
            EditorState::new(9, 600),
            Err(EditorError::InvalidCanvasSize { .. })
        ));
        assert!(EditorState::new(10, 10).is_ok());
    }

    #[test]
    fn layer_ids_are_monotonic_and_not_reused() {
        let mut state = EditorState::new(800, 600).unwrap();
        let a = state.alloc_layer_id();
        let b = state.alloc_layer_id();
        assert!(b > a);
        state.push_layer(solid_layer(a, 0.0, 0.0, 4, 4, [255, 0, 0, 255]));
        state.remove_layer(a);
        assert!(state.alloc_layer_id() > b);
    }

    #[test]
    fn hit_test_misses_outside_every_bounding_box() {
        let mut state = EditorState::new(800, 600).unwrap();
        state.push_layer(solid_layer(1, 100.0, 100.0, 50, 50, [10, 20, 30, 255]));
        assert!(state.topmost_layer_at(10.0, 10.0).is_none());
        assert!(state.topmost_layer_at(151.0, 120.0).is_none());
    }

    #[test]
    fn hit_test_falls_through_transparent_pixels() {
        let mut state = EditorState::new(800, 600).unwrap();
        // Bottom layer solid; top layer overlapping but transparent at the probe.
        state.push_layer(solid_layer(1, 0.0, 0.0, 100, 100, [1, 2, 3, 255]));
        let mut top = solid_layer(2, 0.0, 0.0, 100, 100, [9, 9, 9, 255]);
        top.pixels.put_pixel(20, 20, TRANSPARENT);
        state.push_layer(top);

        assert_eq!(state.topmost_layer_at(10.0, 10.0).unwrap().id, 2);
        // Probe lands on the hole: skips layer 2, hits layer 1.
        assert_eq!(state.topmost_layer_at(20.0, 20.0).unwrap().id, 1);
    }

    #[test]
    fn hit_test_skips_invisible_layers() {
        let mut state = EditorState::new(800, 600).unwrap();
        state.push_layer(solid_layer(1, 0.0, 0.0, 40, 40, [1, 1, 1, 255]));
        let mut top = solid_layer(2, 0.0, 0.0, 40, 40, [2, 2, 2, 255]);
        top.visible = false;
        state.push_layer(top);
        assert_eq!(state.topmost_layer_at(5.0, 5.0).unwrap().id, 1);
    }

    #[test]
    fn hit_test_maps_through_display_scale() {
        let mut state = EditorState::new(800, 600).unwrap();
        // 10x10 buffer shown at 100x100: display (95, 95) maps to local (9, 9).
        let mut layer = solid_layer(1, 0.0, 0.0, 10, 10, [0, 0, 0, 0]);
        layer.width = 100.0;
        layer.height = 100.0;
        layer.pixels.put_pixel(9, 9, Rgba([5, 5, 5, 255]));
        state.push_layer(layer);
        assert_eq!(state.topmost_layer_at(95.0, 95.0).unwrap().id, 1);
        assert!(state.topmost_layer_at(5.0, 5.0).is_none());
    }

    #[test]
    fn structural_mutation_records_exactly_one_action() {
        let mut state = EditorState::new(800, 600).unwrap();
        let mut history = HistoryManager::default();
        state.push_layer(solid_layer(1, 0.0, 0.0, 20, 20, [1, 2, 3, 255]));

        state
            .mutate_structural(&mut history, 1, |l| l.rotation = 45.0)
            .unwrap();
        assert_eq!(history.undo_count(), 1);
        assert_eq!(state.layer(1).unwrap().rotation, 45.0);
    }

    #[test]
    fn pixel_mutation_is_never_recorded() {
        let mut state = EditorState::new(800, 600).unwrap();
        let history = HistoryManager::default();
        state.push_layer(solid_layer(1, 0.0, 0.0, 20, 20, [1, 2, 3, 255]));

        state
            .mutate_pixels(1, |img| img.put_pixel(0, 0, Rgba([9, 9, 9, 255])))
            .unwrap();
        assert_eq!(history.undo_count(), 0);
        assert_eq!(state.layer(1).unwrap().pixels.get_pixel(0, 0).0, [9, 9, 9, 255]);
    }

    #[test]
    fn missing_layer_is_no_selection() {
        let mut state = EditorState::new(800, 600).unwrap();
        let mut history = HistoryManager::default();
        assert!(matches!(
            state.mutate_structural(&mut history, 77, |_| {}),
            Err(EditorError::NoSelection)
        ));
        assert_eq!(history.undo_count(), 0);
    }
}
