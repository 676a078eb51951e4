//! Text renderer
//!
//! Draws a string into a reusable scratch pixmap, then composites the
//! scratch onto the target. The scratch never grows: text outside it is
//! clipped.

use tiny_skia::{ColorU8, Pixmap, PixmapPaint, Transform};

use crate::font::{Align, Font};
use crate::rasterizer::{Placement, fill_run};
use crate::shaping::shape;
use crate::stroke::dilate;
use crate::{Result, TextError};

/// Default scratch size
pub const SCRATCH_WIDTH: u32 = 800;
pub const SCRATCH_HEIGHT: u32 = 600;

/// One text draw request
#[derive(Debug, Clone)]
pub struct TextDraw<'a> {
    pub text: &'a str,
    /// Pixel size
    pub size: u32,
    /// Outline width, 0 for plain fill
    pub line_width: u32,
    pub x: i32,
    /// Baseline
    pub y: i32,
    /// Squeeze text wider than this, 0 for no limit
    pub max_width: u32,
    pub align: Align,
    /// Straight (non-premultiplied) color
    pub color: ColorU8,
}

/// Font plus scratch buffer
pub struct TextRenderer {
    font: Font,
    scratch: Pixmap,
}

impl TextRenderer {
    /// Renderer with the default 800x600 scratch
    pub fn new(font: Font) -> Result<Self> {
        Self::with_scratch_size(font, SCRATCH_WIDTH, SCRATCH_HEIGHT)
    }

    pub fn with_scratch_size(font: Font, width: u32, height: u32) -> Result<Self> {
        let scratch = Pixmap::new(width, height).ok_or_else(|| {
            TextError::InvalidFont(format!("scratch size {width}x{height} is empty"))
        })?;
        Ok(Self { font, scratch })
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    /// `(width, height)` in pixels. The width is the one alignment uses.
    pub fn measure(&self, text: &str, size: u32) -> Result<(u32, u32)> {
        let run = shape(&self.font, text, size as f32)?;
        let extent = i32::from(self.font.ascender()) - i32::from(self.font.descender());
        let height = (extent as f32 * size as f32 / f32::from(self.font.units_per_em())).ceil();
        Ok((run.pixel_width(), height as u32))
    }

    /// Draw text onto `dst`
    pub fn draw(&mut self, dst: &mut Pixmap, req: &TextDraw<'_>) -> Result<()> {
        let run = shape(&self.font, req.text, req.size as f32)?;
        let mut width = run.pixel_width();
        let mut stretch = 1.0;
        if req.max_width > 0 && width > req.max_width {
            stretch = req.max_width as f32 / width as f32;
            width = req.max_width;
        }
        let width_px = i32::try_from(width).unwrap_or(i32::MAX);
        let x = req.x.saturating_add(req.align.offset(width_px));

        self.scratch.fill(tiny_skia::Color::TRANSPARENT);
        let face = self.font.face()?;
        let at = Placement {
            x: x as f32,
            y: req.y as f32,
            stretch,
        };
        if !fill_run(&mut self.scratch, &face, &run, at, req.color) {
            return Ok(());
        }
        if req.line_width > 0 {
            dilate(&mut self.scratch, req.line_width / 2, req.color);
        }
        dst.draw_pixmap(
            0,
            0,
            self.scratch.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        tracing::trace!(text = req.text, size = req.size, x, y = req.y, "text drawn");
        Ok(())
    }
}
