//! Fat stroke
//!
//! Text outlines are emulated by growing the glyph coverage with a disc
//! kernel instead of stroking the vector outline. The result is a visual
//! approximation.

use tiny_skia::{ColorU8, Pixmap};

/// Disc coverage, `(2r + 1)²` values, anti-aliased over a one pixel rim
pub fn disc(radius: u32) -> Vec<u8> {
    let r = radius as f64;
    let w = 2 * radius as usize + 1;
    let (inner, outer) = ((r - 0.5) * (r - 0.5), (r + 0.5) * (r + 0.5));
    let mut out = vec![0u8; w * w];
    for j in 0..w {
        for i in 0..w {
            let dx = i as f64 - r;
            let dy = j as f64 - r;
            let d = dx * dx + dy * dy;
            let v = if d < inner {
                1.0
            } else if d < outer {
                1.0 - (d.sqrt() - (r - 0.5))
            } else {
                0.0
            };
            out[j * w + i] = (v * 255.0) as u8;
        }
    }
    out
}

/// Dilate the coverage of `pixmap` by a disc of `radius`.
///
/// Every covered source pixel spreads its alpha, weighted by the kernel,
/// to its neighbours; a pixel keeps the larger of its own alpha and what
/// it receives. Pixels that already had color keep their hue, newly
/// covered pixels take `color`.
pub fn dilate(pixmap: &mut Pixmap, radius: u32, color: ColorU8) {
    if radius == 0 {
        return;
    }
    let (width, height) = (pixmap.width() as i64, pixmap.height() as i64);
    let kernel = disc(radius);
    let r = radius as i64;
    let kw = 2 * r + 1;
    let source_alpha: Vec<u8> = pixmap.pixels().iter().map(|p| p.alpha()).collect();
    let data = pixmap.data_mut();

    for j in 0..height {
        for i in 0..width {
            let orig = source_alpha[(j * width + i) as usize];
            if orig == 0 {
                continue;
            }
            for cj in (-r).max(-j)..=r.min(height - 1 - j) {
                for ci in (-r).max(-i)..=r.min(width - 1 - i) {
                    let k = kernel[((cj + r) * kw + (ci + r)) as usize];
                    let spread = (u32::from(k) * u32::from(orig) / 255) as u8;
                    let idx = (((j + cj) * width + (i + ci)) * 4) as usize;
                    let px = &mut data[idx..idx + 4];
                    let a = px[3];
                    if spread <= a {
                        continue;
                    }
                    if a > 0 {
                        // premultiplied: rescale channels to the new alpha
                        for c in &mut px[..3] {
                            *c = (u32::from(*c) * u32::from(spread) / u32::from(a)) as u8;
                        }
                    } else {
                        let p = ColorU8::from_rgba(color.red(), color.green(), color.blue(), spread)
                            .premultiply();
                        px[..3].copy_from_slice(&[p.red(), p.green(), p.blue()]);
                    }
                    px[3] = spread;
                }
            }
        }
    }
}
