//! Image loading
//!
//! Surfaces from project-relative image files or inline `data:` URLs.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::surface::Surface;
use crate::{CanvasError, Result};

/// Where image bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Already-decoded base64 payload of a `data:image/...;base64,` URL
    Inline(Vec<u8>),
    /// File on disk
    File(PathBuf),
}

impl ImageSource {
    /// Classify a script-provided reference, resolving paths against `base`
    pub fn resolve(base: &Path, reference: &str) -> Result<Self> {
        if let Some(rest) = reference.strip_prefix("data:") {
            let (meta, payload) = rest.split_once(',').ok_or_else(|| CanvasError::Decode {
                what: "data URL".to_string(),
                reason: "missing ','".to_string(),
            })?;
            if !meta.starts_with("image/") || !meta.ends_with(";base64") {
                return Err(CanvasError::Decode {
                    what: "data URL".to_string(),
                    reason: format!("unsupported media type {meta}"),
                });
            }
            let bytes = STANDARD.decode(payload.trim()).map_err(|e| CanvasError::Decode {
                what: "data URL".to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Self::Inline(bytes));
        }
        let relative = percent_decode(reference.split(['?', '#']).next().unwrap_or_default());
        Ok(Self::File(base.join(relative.trim_start_matches('/'))))
    }

    fn describe(&self) -> String {
        match self {
            Self::Inline(bytes) => format!("data URL ({} bytes)", bytes.len()),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Decode PNG/JPEG bytes into a surface
pub fn decode_image(bytes: &[u8], what: &str) -> Result<Surface> {
    let image = image::load_from_memory(bytes).map_err(|e| CanvasError::Decode {
        what: what.to_string(),
        reason: e.to_string(),
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Surface::from_rgba(width, height, rgba.into_raw())
}

/// Load a surface from a path or data URL
pub fn load_surface(base: &Path, reference: &str) -> Result<Surface> {
    let source = ImageSource::resolve(base, reference)?;
    let what = source.describe();
    let surface = match source {
        ImageSource::Inline(bytes) => decode_image(&bytes, &what)?,
        ImageSource::File(path) => {
            let bytes = fs::read(&path).map_err(|source| CanvasError::Io { path, source })?;
            decode_image(&bytes, &what)?
        }
    };
    tracing::debug!(image = %what, width = surface.width(), height = surface.height(), "image loaded");
    Ok(surface)
}

/// `%XX` escapes in script-provided URLs
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(v) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
