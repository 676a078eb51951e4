//! Text shaping using rustybuzz
//!
//! Shaping applies the font's kerning, so the advances here are the single
//! source of truth for both measuring and drawing.

use rustybuzz::UnicodeBuffer;

use crate::Result;
use crate::font::Font;

/// A shaped glyph with position
#[derive(Debug, Clone, Copy)]
pub struct ShapedGlyph {
    /// Glyph ID in the font
    pub glyph_id: u16,
    /// X offset from current position (in font units)
    pub x_offset: i32,
    /// Y offset from current position (in font units)
    pub y_offset: i32,
    /// Horizontal advance (in font units)
    pub x_advance: i32,
}

/// A run of shaped glyphs
#[derive(Debug, Clone)]
pub struct ShapedRun {
    /// The shaped glyphs
    pub glyphs: Vec<ShapedGlyph>,
    /// Font size used for shaping
    pub font_size: f32,
    /// Units per em from the font
    pub units_per_em: u16,
}

impl ShapedRun {
    /// Scale factor to convert font units to pixels
    pub fn scale(&self) -> f32 {
        self.font_size / f32::from(self.units_per_em)
    }

    /// Total advance in pixels
    pub fn width(&self) -> f32 {
        let units: i32 = self.glyphs.iter().map(|g| g.x_advance).sum();
        // multiply before dividing so exact widths stay exact
        units as f32 * self.font_size / f32::from(self.units_per_em)
    }

    /// Advance rounded up to whole pixels, the width alignment uses
    pub fn pixel_width(&self) -> u32 {
        self.width().max(0.0).ceil() as u32
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Glyphs with their pen position in pixels, relative to the origin
    pub fn positioned(&self) -> impl Iterator<Item = (u16, f32, f32)> + '_ {
        let (size, upem) = (self.font_size, f32::from(self.units_per_em));
        let mut pen = 0i32;
        self.glyphs.iter().map(move |g| {
            let x = (pen + g.x_offset) as f32 * size / upem;
            let y = g.y_offset as f32 * size / upem;
            pen += g.x_advance;
            (g.glyph_id, x, y)
        })
    }
}

/// Shape `text` at `size` pixels
pub fn shape(font: &Font, text: &str, size: f32) -> Result<ShapedRun> {
    let face = font.shaping_face()?;

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.set_direction(rustybuzz::Direction::LeftToRight);

    let output = rustybuzz::shape(&face, &[], buffer);
    let glyphs = output
        .glyph_infos()
        .iter()
        .zip(output.glyph_positions())
        .map(|(info, pos)| ShapedGlyph {
            glyph_id: info.glyph_id as u16,
            x_offset: pos.x_offset,
            y_offset: pos.y_offset,
            x_advance: pos.x_advance,
        })
        .collect();

    Ok(ShapedRun {
        glyphs,
        font_size: size,
        units_per_em: font.units_per_em(),
    })
}
