//! Draw operations
//!
//! A composite-draw request as it arrives from script: flat numbers only.

use crate::compositing::CompositeMode;
use crate::transforms::TransformMatrix;
use crate::{CanvasError, Result};

/// Axis-aligned rectangle given by its corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl RectF {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_xywh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    fn is_finite(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1].iter().all(|v| v.is_finite())
    }
}

/// One (source, destination) rectangle pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePart {
    pub src: RectF,
    pub dst: RectF,
}

impl ImagePart {
    /// Numbers per part in the flat encoding
    pub const STRIDE: usize = 8;

    /// Decode `[sx0, sy0, sx1, sy1, dx0, dy0, dx1, dy1, ...]`
    pub fn from_flat(values: &[f64]) -> Result<Vec<Self>> {
        if values.len() % Self::STRIDE != 0 {
            return Err(CanvasError::InvalidArgument(format!(
                "image parts need a multiple of {} numbers, got {}",
                Self::STRIDE,
                values.len()
            )));
        }
        values
            .chunks_exact(Self::STRIDE)
            .map(|v| {
                let part = Self {
                    src: RectF::new(v[0], v[1], v[2], v[3]),
                    dst: RectF::new(v[4], v[5], v[6], v[7]),
                };
                if part.src.is_finite() && part.dst.is_finite() {
                    Ok(part)
                } else {
                    Err(CanvasError::InvalidArgument(format!("non-finite image part {v:?}")))
                }
            })
            .collect()
    }
}

/// A composite-draw request
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOperation {
    /// Empty means the whole source at the origin
    pub parts: Vec<ImagePart>,
    pub transform: TransformMatrix,
    /// Clamped into `[0, 1]` when applied
    pub alpha: f64,
    pub mode: CompositeMode,
}

impl DrawOperation {
    /// Build from the flat arguments of the script-side bridge
    pub fn from_flat(parts: &[f64], geom: &[f64], mode: &str, alpha: f64) -> Result<Self> {
        let transform = match geom {
            [] => TransformMatrix::identity(),
            [a, b, c, d, e, f] => TransformMatrix::new(*a, *b, *c, *d, *e, *f),
            other => {
                return Err(CanvasError::InvalidArgument(format!(
                    "transform needs 6 numbers, got {}",
                    other.len()
                )));
            }
        };
        if !transform.is_finite() {
            return Err(CanvasError::InvalidArgument(format!("non-finite transform {geom:?}")));
        }
        Ok(Self {
            parts: ImagePart::from_flat(parts)?,
            transform,
            alpha: if alpha.is_nan() { 1.0 } else { alpha },
            mode: mode.parse()?,
        })
    }
}

impl Default for DrawOperation {
    fn default() -> Self {
        Self {
            parts: Vec::new(),
            transform: TransformMatrix::identity(),
            alpha: 1.0,
            mode: CompositeMode::SourceOver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_parts() {
        let parts = ImagePart::from_flat(&[0.0, 0.0, 2.0, 2.0, 5.0, 5.0, 9.0, 9.0]).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].src.width(), 2.0);
        assert_eq!(parts[0].dst.height(), 4.0);
        assert!(ImagePart::from_flat(&[0.0; 7]).is_err());
        assert!(ImagePart::from_flat(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_operation_from_flat() {
        let op = DrawOperation::from_flat(&[], &[1.0, 0.0, 0.0, 1.0, 3.0, 4.0], "copy", 0.5).unwrap();
        assert_eq!(op.mode, CompositeMode::Copy);
        assert_eq!(op.transform.e, 3.0);
        assert!(DrawOperation::from_flat(&[], &[1.0, 0.0], "copy", 1.0).is_err());
        assert!(matches!(
            DrawOperation::from_flat(&[], &[], "hue", 1.0),
            Err(CanvasError::UnsupportedMode(_))
        ));
    }
}
