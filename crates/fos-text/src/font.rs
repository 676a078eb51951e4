//! Font loading
//!
//! The player uses one outline font for every canvas text call. It is read
//! once at startup and shared read-only afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ttf_parser::Face;

use crate::{Result, TextError};

/// A parsed typeface
pub struct Font {
    data: Vec<u8>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
}

impl Font {
    /// Read and validate a font file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| TextError::FontLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let font = Self::from_bytes(data).map_err(|e| match e {
            TextError::FontLoad { reason, .. } => TextError::FontLoad {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        tracing::info!(font = %path.display(), units_per_em = font.units_per_em, "font loaded");
        Ok(font)
    }

    /// Validate in-memory font data
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let invalid = |reason: String| TextError::FontLoad {
            path: PathBuf::from("<memory>"),
            reason,
        };
        let face = Face::parse(&data, 0).map_err(|e| invalid(e.to_string()))?;
        let (units_per_em, ascender, descender) =
            (face.units_per_em(), face.ascender(), face.descender());
        // shaping parses the same bytes again, make sure it can
        if rustybuzz::Face::from_slice(&data, 0).is_none() {
            return Err(invalid("not usable for shaping".to_string()));
        }
        Ok(Self {
            data,
            units_per_em,
            ascender,
            descender,
        })
    }

    /// Raw font data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Outline view of the font
    pub fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, 0).map_err(|e| TextError::InvalidFont(e.to_string()))
    }

    /// Shaping view of the font
    pub fn shaping_face(&self) -> Result<rustybuzz::Face<'_>> {
        rustybuzz::Face::from_slice(&self.data, 0)
            .ok_or_else(|| TextError::InvalidFont("font cannot be shaped".to_string()))
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Ascender (above baseline)
    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    /// Descender (below baseline, usually negative)
    pub fn descender(&self) -> i16 {
        self.descender
    }

    /// Pixels per font unit at `size`
    pub fn scale(&self, size: f32) -> f32 {
        size / f32::from(self.units_per_em)
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("bytes", &self.data.len())
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

/// Pixel size from a CSS-like font string: the first `<digits>px` token
pub fn font_size(spec: &str) -> Result<u32> {
    spec.split(' ')
        .find_map(|token| {
            let digits = token.strip_suffix("px")?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse::<u32>().ok()
        })
        .filter(|&size| size > 0)
        .ok_or_else(|| TextError::InvalidFont(spec.to_string()))
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Origin shift for text of `width` pixels
    pub fn offset(self, width: i32) -> i32 {
        match self {
            Self::Left => 0,
            Self::Center => (width / 2).saturating_neg(),
            Self::Right => width.saturating_neg(),
        }
    }
}

impl FromStr for Align {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" | "start" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" | "end" => Ok(Self::Right),
            other => Err(TextError::UnsupportedAlign(other.to_string())),
        }
    }
}
