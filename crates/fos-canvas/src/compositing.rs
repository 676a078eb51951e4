//! Compositing Operations
//!
//! Composite modes accepted by `drawImage` and their raster blend modes.

use std::fmt;
use std::str::FromStr;

use tiny_skia::BlendMode;

use crate::CanvasError;

/// Composite operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompositeMode {
    #[default]
    SourceOver,
    SourceIn,
    SourceOut,
    SourceAtop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
    Clear,
    /// Recognized but not rendered: draws degrade to a no-op
    Multiply,
}

impl CompositeMode {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceOver => "source-over",
            Self::SourceIn => "source-in",
            Self::SourceOut => "source-out",
            Self::SourceAtop => "source-atop",
            Self::DestinationOver => "destination-over",
            Self::DestinationIn => "destination-in",
            Self::DestinationOut => "destination-out",
            Self::DestinationAtop => "destination-atop",
            Self::Lighter => "lighter",
            Self::Copy => "copy",
            Self::Xor => "xor",
            Self::Clear => "clear",
            Self::Multiply => "multiply",
        }
    }

    /// Raster blend mode, or `None` when the mode is degraded to a no-op
    pub fn blend_mode(&self) -> Option<BlendMode> {
        Some(match self {
            Self::SourceOver => BlendMode::SourceOver,
            Self::SourceIn => BlendMode::SourceIn,
            Self::SourceOut => BlendMode::SourceOut,
            Self::SourceAtop => BlendMode::SourceAtop,
            Self::DestinationOver => BlendMode::DestinationOver,
            Self::DestinationIn => BlendMode::DestinationIn,
            Self::DestinationOut => BlendMode::DestinationOut,
            Self::DestinationAtop => BlendMode::DestinationAtop,
            Self::Lighter => BlendMode::Plus,
            Self::Copy => BlendMode::Source,
            Self::Xor => BlendMode::Xor,
            Self::Clear => BlendMode::Clear,
            Self::Multiply => return None,
        })
    }

    /// Whether draws with this mode are skipped
    pub fn is_degraded(&self) -> bool {
        self.blend_mode().is_none()
    }
}

impl FromStr for CompositeMode {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "source-over" => Self::SourceOver,
            "source-in" => Self::SourceIn,
            "source-out" => Self::SourceOut,
            "source-atop" => Self::SourceAtop,
            "destination-over" => Self::DestinationOver,
            "destination-in" => Self::DestinationIn,
            "destination-out" => Self::DestinationOut,
            "destination-atop" => Self::DestinationAtop,
            "lighter" => Self::Lighter,
            "copy" => Self::Copy,
            "xor" => Self::Xor,
            "clear" => Self::Clear,
            "multiply" => Self::Multiply,
            other => return Err(CanvasError::UnsupportedMode(other.to_string())),
        })
    }
}

impl fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
