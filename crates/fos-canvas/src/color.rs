//! Canvas color strings
//!
//! Colors travel between script and host as a packed `0xRRGGBBAA` integer,
//! alpha in the least-significant byte.

use crate::{CanvasError, Result};

/// Packed RGBA color (`0xRRGGBBAA`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackedColor(pub u32);

impl PackedColor {
    pub const BLACK: Self = Self(0x0000_00ff);
    pub const WHITE: Self = Self(0xffff_ffff);

    /// Pack channel values
    pub const fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self((r as u32) << 24 | (g as u32) << 16 | (b as u32) << 8 | a as u32)
    }

    /// Accept a script number. Values that went through `|0` arrive negative.
    pub fn from_f64(value: f64) -> Self {
        Self(value as i64 as u32)
    }

    pub fn r(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn g(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn a(self) -> u8 {
        self.0 as u8
    }

    /// Channels as `[r, g, b, a]`
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r(), self.g(), self.b(), self.a()]
    }

    /// Non-premultiplied tiny-skia color
    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r(), self.g(), self.b(), self.a())
    }
}

/// Parse a canvas style string and fold in the global alpha.
///
/// Accepts `#RGB`, `#RRGGBB`, `rgb(r,g,b)`, `rgba(r,g,b,a)`, `black` and
/// `white`. The resulting alpha is `alpha * global_alpha`, truncated.
pub fn parse_color(style: &str, global_alpha: f64) -> Result<PackedColor> {
    let invalid = || CanvasError::InvalidColorFormat(style.to_string());

    let ([r, g, b], alpha) = if let Some(hex) = style.strip_prefix('#') {
        (parse_hex(hex).ok_or_else(invalid)?, 255)
    } else if let Some(args) = function_args(style, "rgba") {
        let [r, g, b, a] = args.as_slice() else {
            return Err(invalid());
        };
        let rgb = [channel(r), channel(g), channel(b)];
        let alpha = alpha_channel(a);
        match (rgb, alpha) {
            ([Some(r), Some(g), Some(b)], Some(a)) => ([r, g, b], a),
            _ => return Err(invalid()),
        }
    } else if let Some(args) = function_args(style, "rgb") {
        let [r, g, b] = args.as_slice() else {
            return Err(invalid());
        };
        match [channel(r), channel(g), channel(b)] {
            [Some(r), Some(g), Some(b)] => ([r, g, b], 255),
            _ => return Err(invalid()),
        }
    } else {
        match style {
            "black" => ([0, 0, 0], 255),
            "white" => ([255, 255, 255], 255),
            _ => return Err(invalid()),
        }
    };

    let alpha = (f64::from(alpha) * global_alpha.clamp(0.0, 1.0)) as u8;
    Ok(PackedColor::from_rgba(r, g, b, alpha))
}

fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (slot, digit) in out.iter_mut().zip(hex.chars()) {
                *slot = digit.to_digit(16)? as u8 * 0x11;
            }
            Some(out)
        }
        6 => {
            let mut out = [0u8; 3];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
            }
            Some(out)
        }
        _ => None,
    }
}

/// `name(a, b, c)` -> `["a", "b", "c"]`
fn function_args<'a>(style: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let inner = style.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.split(',').map(str::trim).collect())
}

fn channel(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // out-of-range channels clamp like browsers do
    Some(s.parse::<u32>().map_or(255, |v| v.min(255)) as u8)
}

fn alpha_channel(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|c| c.is_ascii_digit() || c == b'.') {
        return None;
    }
    let value: f64 = s.parse().ok()?;
    Some((value.clamp(0.0, 1.0) * 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        assert_eq!(parse_color("#fff", 1.0).unwrap(), PackedColor::WHITE);
        assert_eq!(parse_color("#1a2B3c", 1.0).unwrap(), PackedColor::from_rgba(0x1a, 0x2b, 0x3c, 0xff));
        assert_eq!(parse_color("#0f8", 1.0).unwrap(), PackedColor::from_rgba(0x00, 0xff, 0x88, 0xff));
    }

    #[test]
    fn test_function_forms() {
        assert_eq!(parse_color("rgb(1,2,3)", 1.0).unwrap(), PackedColor::from_rgba(1, 2, 3, 255));
        assert_eq!(parse_color("rgb(10, 20, 30)", 1.0).unwrap(), PackedColor::from_rgba(10, 20, 30, 255));
        assert_eq!(parse_color("rgba(0,0,0,0.5)", 1.0).unwrap(), PackedColor::from_rgba(0, 0, 0, 127));
        assert_eq!(parse_color("rgba(255, 255, 255, 1)", 1.0).unwrap(), PackedColor::WHITE);
    }

    #[test]
    fn test_named() {
        assert_eq!(parse_color("black", 1.0).unwrap(), PackedColor::BLACK);
        assert_eq!(parse_color("white", 1.0).unwrap(), PackedColor::WHITE);
    }

    #[test]
    fn test_roundtrip_from_channels() {
        for &(r, g, b) in &[(0u8, 0u8, 0u8), (255, 128, 1), (17, 34, 51), (200, 100, 50)] {
            let hex = format!("#{r:02x}{g:02x}{b:02x}");
            let c = parse_color(&hex, 1.0).unwrap();
            assert_eq!(c.to_rgba(), [r, g, b, 255]);

            let func = format!("rgb({r},{g},{b})");
            assert_eq!(parse_color(&func, 1.0).unwrap().to_rgba(), [r, g, b, 255]);

            let short = format!("#{:x}{:x}{:x}", r >> 4, g >> 4, b >> 4);
            let c = parse_color(&short, 1.0).unwrap();
            assert_eq!(c.to_rgba(), [(r >> 4) * 0x11, (g >> 4) * 0x11, (b >> 4) * 0x11, 255]);
        }
    }

    #[test]
    fn test_global_alpha_truncates() {
        assert_eq!(parse_color("#000", 0.5).unwrap().a(), 127);
        assert_eq!(parse_color("rgba(0,0,0,0.5)", 0.5).unwrap().a(), 63);
        assert_eq!(parse_color("white", 0.0).unwrap().a(), 0);
    }

    #[test]
    fn test_invalid() {
        for s in ["", "red", "#ff", "#ggg", "#12345", "rgb(1,2)", "rgb(1,2,3,4)", "rgba(1,2,3)",
                  "rgb(-1,2,3)", "rgb(a,b,c)", "hsl(0,0%,0%)", "#1234567", "rgb 1,2,3"] {
            assert!(
                matches!(parse_color(s, 1.0), Err(CanvasError::InvalidColorFormat(_))),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_packed_from_script_number() {
        // 0xff0000ff | 0 is negative in script land
        assert_eq!(PackedColor::from_f64(-16776961.0), PackedColor(0xff00_00ff));
        assert_eq!(PackedColor::from_f64(4278190335.0), PackedColor(0xff00_00ff));
        assert_eq!(PackedColor(0x11223344).to_rgba(), [0x11, 0x22, 0x33, 0x44]);
    }
}
