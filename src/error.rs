use thiserror::Error;

/// Recoverable engine errors.  Every variant aborts the operation with prior
/// state unchanged and nothing recorded in history; none is fatal.
#[derive(Debug, Error)]
pub enum EditorError {
    /// An operation that needs a selected layer was invoked with none
    /// (copy/cut/area ops, structural setters on the selection).
    #[error("no layer selected")]
    NoSelection,
    /// Paste was requested with nothing on the clipboard.
    #[error("clipboard is empty")]
    EmptyClipboard,
    /// Requested working-canvas dimensions below the 10x10 floor.
    #[error("invalid canvas size {width}x{height} (minimum is 10x10)")]
    InvalidCanvasSize { width: u32, height: u32 },
    /// An imported or snapshot-embedded image failed to decode.
    #[error("image decode failed: {0}")]
    DecodeFailed(String),
}

/// Errors for project-file save/load.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(String),
    #[error("invalid project file: {0}")]
    InvalidFormat(String),
}
