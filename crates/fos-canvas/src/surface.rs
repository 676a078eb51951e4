//! Drawing surfaces
//!
//! A [`Surface`] is a premultiplied RGBA pixel buffer. Every operation the
//! script side needs reduces to a rectangle fill or a composite draw.

use tiny_skia::{
    ColorU8, FilterQuality, IntSize, Paint, Pattern, Pixmap, PremultipliedColorU8, Rect,
    SpreadMode, Transform,
};

use crate::color::PackedColor;
use crate::compositing::CompositeMode;
use crate::drawing::{DrawOperation, ImagePart, RectF};
use crate::{CanvasError, Result};

/// Native drawing surface
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    /// Create a transparent surface
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            CanvasError::InvalidArgument(format!("invalid surface size {width}x{height}"))
        })?;
        Ok(Self { pixmap })
    }

    /// Create from straight (non-premultiplied) RGBA bytes
    pub fn from_rgba(width: u32, height: u32, mut rgba: Vec<u8>) -> Result<Self> {
        let size = IntSize::from_wh(width, height).ok_or_else(|| {
            CanvasError::InvalidArgument(format!("invalid surface size {width}x{height}"))
        })?;
        for px in rgba.chunks_exact_mut(4) {
            let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
            px.copy_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let pixmap = Pixmap::from_vec(rgba, size).ok_or_else(|| {
            CanvasError::InvalidArgument(format!("pixel data does not match {width}x{height}"))
        })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Make every pixel transparent
    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    /// Clear a rectangle.
    ///
    /// A rectangle covering the surface is a plain clear; anything smaller
    /// is a `clear`-mode composite of a blank pixel stretched over it.
    pub fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
        let rect = normalize(x, y, w, h);
        if rect.x0 <= 0.0
            && rect.y0 <= 0.0
            && rect.x1 >= f64::from(self.width())
            && rect.y1 >= f64::from(self.height())
        {
            self.clear();
            return Ok(());
        }
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Ok(());
        }
        let blank = Surface::new(1, 1)?;
        let op = DrawOperation {
            parts: vec![ImagePart {
                src: RectF::new(0.0, 0.0, 1.0, 1.0),
                dst: rect,
            }],
            mode: CompositeMode::Clear,
            ..DrawOperation::default()
        };
        self.draw_image(&blank, &op);
        Ok(())
    }

    /// Fill a rectangle with a solid color, source-over
    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: PackedColor) {
        let r = normalize(x, y, w, h);
        let Some(rect) = Rect::from_ltrb(r.x0 as f32, r.y0 as f32, r.x1 as f32, r.y1 as f32) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r(), color.g(), color.b(), color.a());
        paint.anti_alias = false;
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    /// Composite `src` onto this surface
    pub fn draw_image(&mut self, src: &Surface, op: &DrawOperation) {
        let Some(blend_mode) = op.mode.blend_mode() else {
            return;
        };
        let whole = [ImagePart {
            src: RectF::new(0.0, 0.0, f64::from(src.width()), f64::from(src.height())),
            dst: RectF::new(0.0, 0.0, f64::from(src.width()), f64::from(src.height())),
        }];
        let parts = if op.parts.is_empty() { &whole[..] } else { &op.parts[..] };
        let alpha = op.alpha.clamp(0.0, 1.0) as f32;
        let transform = op.transform.to_skia();

        for part in parts {
            let (sw, sh) = (part.src.width(), part.src.height());
            if sw == 0.0 || sh == 0.0 {
                continue;
            }
            let d = normalize(part.dst.x0, part.dst.y0, part.dst.width(), part.dst.height());
            let Some(dst) = Rect::from_ltrb(d.x0 as f32, d.y0 as f32, d.x1 as f32, d.y1 as f32)
            else {
                continue;
            };
            // maps source pixels onto the destination rectangle
            let (kx, ky) = (part.dst.width() / sw, part.dst.height() / sh);
            let pattern_ts = Transform::from_translate(part.dst.x0 as f32, part.dst.y0 as f32)
                .pre_scale(kx as f32, ky as f32)
                .pre_translate(-part.src.x0 as f32, -part.src.y0 as f32);
            let paint = Paint {
                shader: Pattern::new(
                    src.pixmap.as_ref(),
                    SpreadMode::Pad,
                    FilterQuality::Nearest,
                    alpha,
                    pattern_ts,
                ),
                blend_mode,
                anti_alias: false,
                ..Paint::default()
            };
            self.pixmap.fill_rect(dst, &paint, transform, None);
        }
    }

    /// Straight RGBA bytes of a region, row-major, `w * h * 4` long
    pub fn read_pixels(&self, x: i64, y: i64, w: i64, h: i64) -> Result<Vec<u8>> {
        let (width, height) = (i64::from(self.width()), i64::from(self.height()));
        let inside = |origin: i64, extent: i64, limit: i64| {
            origin >= 0 && extent >= 0 && origin.checked_add(extent).is_some_and(|end| end <= limit)
        };
        if !inside(x, w, width) || !inside(y, h, height) {
            return Err(CanvasError::InvalidArgument(format!(
                "region {x},{y} {w}x{h} is outside the {width}x{height} surface"
            )));
        }
        let pixels = self.pixmap.pixels();
        let mut out = Vec::with_capacity((w * h * 4) as usize);
        for row in y..y + h {
            let start = (row * width + x) as usize;
            for px in &pixels[start..start + w as usize] {
                out.extend_from_slice(&straight(*px));
            }
        }
        Ok(out)
    }

    /// The whole surface as straight RGBA bytes
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixmap.pixels().iter().flat_map(|px| straight(*px)).collect()
    }
}

fn straight(px: PremultipliedColorU8) -> [u8; 4] {
    let c = px.demultiply();
    [c.red(), c.green(), c.blue(), c.alpha()]
}

/// Rectangle with non-negative extent
fn normalize(x: f64, y: f64, w: f64, h: f64) -> RectF {
    RectF::new(x.min(x + w), y.min(y + h), x.max(x + w), y.max(y + h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::TransformMatrix;

    fn checker() -> Surface {
        Surface::from_rgba(
            2,
            2,
            vec![
                255, 0, 0, 255, 0, 255, 0, 255, //
                0, 0, 255, 255, 10, 20, 30, 255,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(Surface::new(0, 5), Err(CanvasError::InvalidArgument(_))));
    }

    #[test]
    fn test_fill_then_read() {
        let mut s = Surface::new(10, 10).unwrap();
        s.fill_rect(0.0, 0.0, 10.0, 10.0, PackedColor::BLACK);
        let px = s.read_pixels(0, 0, 10, 10).unwrap();
        assert_eq!(px.len(), 400);
        assert!(px.chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_read_out_of_bounds() {
        let s = Surface::new(4, 4).unwrap();
        assert!(s.read_pixels(2, 2, 3, 1).is_err());
        assert!(s.read_pixels(-1, 0, 1, 1).is_err());
        assert_eq!(s.read_pixels(4, 4, 0, 0).unwrap().len(), 0);
    }

    #[test]
    fn test_draw_identity_is_exact() {
        let src = checker();
        let mut dst = Surface::new(2, 2).unwrap();
        dst.draw_image(&src, &DrawOperation::default());
        assert_eq!(dst.to_rgba(), src.to_rgba());
    }

    #[test]
    fn test_draw_sub_rect_scaled() {
        let src = checker();
        let mut dst = Surface::new(4, 4).unwrap();
        let op = DrawOperation {
            parts: ImagePart::from_flat(&[1.0, 1.0, 2.0, 2.0, 0.0, 0.0, 2.0, 2.0]).unwrap(),
            ..DrawOperation::default()
        };
        dst.draw_image(&src, &op);
        let px = dst.read_pixels(0, 0, 2, 2).unwrap();
        assert!(px.chunks(4).all(|p| p == [10, 20, 30, 255]));
        assert_eq!(dst.read_pixels(2, 2, 1, 1).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_draw_with_translation() {
        let src = checker();
        let mut dst = Surface::new(4, 4).unwrap();
        let op = DrawOperation {
            transform: TransformMatrix::translation(2.0, 2.0),
            ..DrawOperation::default()
        };
        dst.draw_image(&src, &op);
        assert_eq!(dst.read_pixels(2, 2, 1, 1).unwrap(), vec![255, 0, 0, 255]);
        assert_eq!(dst.read_pixels(0, 0, 1, 1).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_clear_rect_partial() {
        let mut s = Surface::new(4, 4).unwrap();
        s.fill_rect(0.0, 0.0, 4.0, 4.0, PackedColor::WHITE);
        s.clear_rect(1.0, 1.0, 2.0, 2.0).unwrap();
        assert_eq!(s.read_pixels(1, 1, 1, 1).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(s.read_pixels(0, 0, 1, 1).unwrap(), vec![255, 255, 255, 255]);
        s.clear_rect(0.0, 0.0, 4.0, 4.0).unwrap();
        assert!(s.to_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_multiply_is_noop() {
        let src = checker();
        let mut dst = Surface::new(2, 2).unwrap();
        let op = DrawOperation {
            mode: CompositeMode::Multiply,
            ..DrawOperation::default()
        };
        dst.draw_image(&src, &op);
        assert!(dst.to_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_mode_replaces() {
        let mut dst = Surface::new(2, 2).unwrap();
        dst.fill_rect(0.0, 0.0, 2.0, 2.0, PackedColor::WHITE);
        let clear_src = Surface::new(2, 2).unwrap();
        let op = DrawOperation {
            mode: CompositeMode::Copy,
            ..DrawOperation::default()
        };
        dst.draw_image(&clear_src, &op);
        assert!(dst.to_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_pixels_rejects_overflowing_regions() {
        let s = Surface::new(4, 4).unwrap();
        assert!(matches!(s.read_pixels(i64::MAX, 0, 1, 1), Err(CanvasError::InvalidArgument(_))));
        assert!(matches!(s.read_pixels(0, i64::MAX, 1, 1), Err(CanvasError::InvalidArgument(_))));
        assert!(matches!(s.read_pixels(1, 1, i64::MAX, 1), Err(CanvasError::InvalidArgument(_))));
    }

    #[test]
    fn test_draw_with_global_alpha() {
        let mut src = Surface::new(1, 1).unwrap();
        src.fill_rect(0.0, 0.0, 1.0, 1.0, PackedColor::WHITE);
        let mut dst = Surface::new(1, 1).unwrap();
        let op = DrawOperation {
            alpha: 0.5,
            ..DrawOperation::default()
        };
        dst.draw_image(&src, &op);
        assert_eq!(dst.to_rgba(), vec![255, 255, 255, 128]);
    }

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const NONE: [u8; 4] = [0, 0, 0, 0];

    /// Source `[blue, blue, -, -]` composited over destination `[red, -, red, -]`
    fn composite(mode: CompositeMode) -> Vec<[u8; 4]> {
        let src = Surface::from_rgba(4, 1, [BLUE, BLUE, NONE, NONE].concat()).unwrap();
        let mut dst = Surface::from_rgba(4, 1, [RED, NONE, RED, NONE].concat()).unwrap();
        let op = DrawOperation {
            mode,
            ..DrawOperation::default()
        };
        dst.draw_image(&src, &op);
        dst.to_rgba()
            .chunks(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect()
    }

    #[test]
    fn test_composite_modes() {
        let cases = [
            (CompositeMode::SourceOver, [BLUE, BLUE, RED, NONE]),
            (CompositeMode::SourceIn, [BLUE, NONE, NONE, NONE]),
            (CompositeMode::SourceOut, [NONE, BLUE, NONE, NONE]),
            (CompositeMode::SourceAtop, [BLUE, NONE, RED, NONE]),
            (CompositeMode::DestinationOver, [RED, BLUE, RED, NONE]),
            (CompositeMode::DestinationIn, [RED, NONE, NONE, NONE]),
            (CompositeMode::DestinationOut, [NONE, NONE, RED, NONE]),
            (CompositeMode::DestinationAtop, [RED, BLUE, NONE, NONE]),
            (CompositeMode::Lighter, [[255, 0, 255, 255], BLUE, RED, NONE]),
            (CompositeMode::Xor, [NONE, BLUE, RED, NONE]),
            (CompositeMode::Copy, [BLUE, BLUE, NONE, NONE]),
            (CompositeMode::Clear, [NONE, NONE, NONE, NONE]),
        ];
        for (mode, expected) in cases {
            assert_eq!(composite(mode), expected, "{}", mode.as_str());
        }
    }
}
