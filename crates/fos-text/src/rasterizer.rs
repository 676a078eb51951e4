//! Glyph rasterization

use tiny_skia::{ColorU8, FillRule, Paint, Pixmap, Transform};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use crate::shaping::ShapedRun;

/// Where and how a run lands in the target
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    /// Pen position of the first glyph
    pub x: f32,
    /// Baseline
    pub y: f32,
    /// Horizontal squeeze, 1.0 for none
    pub stretch: f32,
}

/// Fill every glyph of `run` into `pixmap`.
///
/// Returns `false` when the run has no visible outline.
pub fn fill_run(
    pixmap: &mut Pixmap,
    face: &Face,
    run: &ShapedRun,
    at: Placement,
    color: ColorU8,
) -> bool {
    let scale = run.scale();
    let mut builder = PathBuilder {
        builder: tiny_skia::PathBuilder::new(),
        scale_x: scale * at.stretch,
        scale_y: scale,
        origin_x: 0.0,
        origin_y: 0.0,
    };
    for (glyph_id, dx, dy) in run.positioned() {
        builder.origin_x = at.x + dx * at.stretch;
        builder.origin_y = at.y - dy;
        // empty glyphs (spaces) have no outline
        face.outline_glyph(GlyphId(glyph_id), &mut builder);
    }
    let Some(path) = builder.finish() else {
        return false;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(color.red(), color.green(), color.blue(), color.alpha());
    paint.anti_alias = true;
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    true
}

/// Path builder that converts ttf-parser outlines to tiny-skia paths
struct PathBuilder {
    builder: tiny_skia::PathBuilder,
    scale_x: f32,
    scale_y: f32,
    origin_x: f32,
    origin_y: f32,
}

impl PathBuilder {
    fn transform_x(&self, x: f32) -> f32 {
        self.origin_x + x * self.scale_x
    }

    fn transform_y(&self, y: f32) -> f32 {
        self.origin_y - y * self.scale_y // Flip Y axis
    }

    fn finish(self) -> Option<tiny_skia::Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for PathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(self.transform_x(x), self.transform_y(y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(self.transform_x(x), self.transform_y(y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(
            self.transform_x(x1), self.transform_y(y1),
            self.transform_x(x), self.transform_y(y),
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            self.transform_x(x1), self.transform_y(y1),
            self.transform_x(x2), self.transform_y(y2),
            self.transform_x(x), self.transform_y(y),
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::Font;
    use crate::shaping::shape;
    use crate::testing::test_font;

    #[test]
    fn test_box_glyph_lands_on_baseline() {
        let font = Font::from_bytes(test_font()).unwrap();
        let face = font.face().unwrap();
        let run = shape(&font, "A", 100.0).unwrap();
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        let at = Placement { x: 10.0, y: 80.0, stretch: 1.0 };
        assert!(fill_run(&mut pixmap, &face, &run, at, ColorU8::from_rgba(255, 0, 0, 255)));

        // the square spans x 15..65 and y 10..80
        assert_eq!(pixmap.pixel(40, 50).unwrap().alpha(), 255);
        assert_eq!(pixmap.pixel(40, 50).unwrap().red(), 255);
        assert_eq!(pixmap.pixel(12, 50).unwrap().alpha(), 0);
        assert_eq!(pixmap.pixel(40, 85).unwrap().alpha(), 0);
        assert_eq!(pixmap.pixel(70, 50).unwrap().alpha(), 0);
    }

    #[test]
    fn test_space_only_is_invisible() {
        let font = Font::from_bytes(test_font()).unwrap();
        let face = font.face().unwrap();
        let run = shape(&font, "  ", 20.0).unwrap();
        let mut pixmap = Pixmap::new(10, 10).unwrap();
        let at = Placement { x: 0.0, y: 8.0, stretch: 1.0 };
        assert!(!fill_run(&mut pixmap, &face, &run, at, ColorU8::from_rgba(0, 0, 0, 255)));
    }
}
