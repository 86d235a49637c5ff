//! photostack — the layer engine behind a compositing image editor.
//!
//! The crate owns the document model (ordered, transformable raster/text/shape
//! layers), the CPU compositor, pointer hit testing, the drag/resize state
//! machine, the area clipboard, and the undo/redo history.  Everything a UI
//! shell needs beyond widgets: the shell wires pointer events and buttons to
//! the operations in [`ops`], pumps [`decode::DecodePool::poll`] once per
//! frame, and presents the [`compositor`] output.

#![allow(dead_code)] // API surface kept for shells and future tooling
#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod components;
pub mod compositor;
pub mod decode;
pub mod error;
pub mod export;
pub mod geometry;
pub mod io;
pub mod ops;

pub use canvas::{
    EditorState, Layer, LayerContent, ShapeFillMode, ShapeKind, ShapeStyle, TextStyle, Tool,
    ToolContext,
};
pub use components::history::{HistoryAction, HistoryManager, LayerSnapshot};
pub use decode::DecodePool;
pub use error::{EditorError, ProjectError};
pub use export::{ExportBundle, ExportedLayer, ExportedLayerKind};
pub use geometry::{LayerTransform, Rect};
