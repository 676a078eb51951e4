//! fOS Canvas
//!
//! Native drawing surfaces behind the scripted 2D canvas.
//!
//! Features:
//! - Generation-checked resource table for script-held surface handles
//! - Surface operations: clear, fill, composite draw, pixel read-back
//! - Canvas color strings, composite modes and transforms
//! - Save/restore drawing state stack
//! - PNG/JPEG loading from files and data URLs

pub mod color;
pub mod compositing;
pub mod drawing;
pub mod loader;
pub mod resources;
pub mod state;
pub mod surface;
pub mod transforms;

use std::path::PathBuf;

pub use color::{PackedColor, parse_color};
pub use compositing::CompositeMode;
pub use drawing::{DrawOperation, ImagePart, RectF};
pub use loader::{ImageSource, decode_image, load_surface};
pub use resources::{Handle, ResourceTable};
pub use state::{DrawingState, LineCap, LineJoin, PropKind, StateStack, StyleValue, TextAlign, TextBaseline};
pub use surface::Surface;
pub use transforms::TransformMatrix;

/// Canvas error
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode image {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid style format: {0}")]
    InvalidColorFormat(String),

    #[error("not supported composite mode: {0}")]
    UnsupportedMode(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, CanvasError>;
