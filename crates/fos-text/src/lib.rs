//! fOS Text - Text Rendering for the player
//!
//! This crate draws canvas text for the fOS player:
//! - Font loading (ttf-parser)
//! - Text shaping with kerning (rustybuzz - HarfBuzz port)
//! - Glyph rasterization into a reusable scratch buffer (tiny-skia)
//! - Outline emulation by dilating glyph coverage ("fat" stroke)

pub mod font;
pub mod rasterizer;
pub mod renderer;
pub mod shaping;
pub mod stroke;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::path::PathBuf;

pub use font::{Align, Font, font_size};
pub use renderer::{TextDraw, TextRenderer};
pub use shaping::{ShapedGlyph, ShapedRun, shape};

/// Text rendering error types
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error("cannot load font {path}: {reason}")]
    FontLoad { path: PathBuf, reason: String },

    #[error("invalid font: {0}")]
    InvalidFont(String),

    #[error("not supported align: {0}")]
    UnsupportedAlign(String),
}

pub type Result<T> = std::result::Result<T, TextError>;
