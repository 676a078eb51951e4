//! Test font
//!
//! Builds a minimal TrueType font in memory so tests never depend on
//! font files being present.
//!
//! Metrics: 1000 units per em, ascender 800, descender -200.
//! - glyph 0 (`.notdef`): empty, advance 500
//! - glyph 1: square from (50, 0) to (550, 700), advance 600, used for
//!   every printable ASCII character except space
//! - glyph 2: empty, advance 300, used for space

/// Advance of the box glyph in font units
pub const BOX_ADVANCE: u16 = 600;
/// Advance of the space glyph in font units
pub const SPACE_ADVANCE: u16 = 300;

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn head() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0001_0000); // version
    be32(&mut t, 0x0001_0000); // font revision
    be32(&mut t, 0); // checksum adjustment
    be32(&mut t, 0x5F0F_3CF5); // magic
    be16(&mut t, 0); // flags
    be16(&mut t, 1000); // units per em
    t.extend_from_slice(&[0; 16]); // created, modified
    for v in [50i16, 0, 550, 700] {
        be16(&mut t, v as u16);
    }
    be16(&mut t, 0); // mac style
    be16(&mut t, 8); // lowest ppem
    be16(&mut t, 2); // direction hint
    be16(&mut t, 1); // long loca
    be16(&mut t, 0); // glyph data format
    t
}

fn hhea() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0001_0000);
    be16(&mut t, 800); // ascender
    be16(&mut t, (-200i16) as u16); // descender
    be16(&mut t, 0); // line gap
    be16(&mut t, BOX_ADVANCE); // advance width max
    t.extend_from_slice(&[0; 22]);
    be16(&mut t, 3); // number of h metrics
    t
}

fn maxp() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, 0x0000_5000);
    be16(&mut t, 3);
    t
}

fn hmtx() -> Vec<u8> {
    let mut t = Vec::new();
    for (advance, lsb) in [(500u16, 0u16), (BOX_ADVANCE, 50), (SPACE_ADVANCE, 0)] {
        be16(&mut t, advance);
        be16(&mut t, lsb);
    }
    t
}

fn glyf() -> Vec<u8> {
    let mut t = Vec::new();
    be16(&mut t, 1); // contours
    for v in [50u16, 0, 550, 700] {
        be16(&mut t, v);
    }
    be16(&mut t, 3); // end point of the contour
    be16(&mut t, 0); // instructions
    t.extend_from_slice(&[0x01; 4]); // on-curve, full-width deltas
    for dx in [50i16, 500, 0, -500] {
        be16(&mut t, dx as u16);
    }
    for dy in [0i16, 0, 700, 0] {
        be16(&mut t, dy as u16);
    }
    while t.len() % 4 != 0 {
        t.push(0);
    }
    t
}

fn loca(glyf_len: u32) -> Vec<u8> {
    let mut t = Vec::new();
    for offset in [0, 0, glyf_len, glyf_len] {
        be32(&mut t, offset);
    }
    t
}

fn cmap() -> Vec<u8> {
    let groups: [(u32, u32, u32); 2] = [(0x20, 0x20, 2), (0x21, 0x7E, 1)];
    let mut t = Vec::new();
    be16(&mut t, 0); // version
    be16(&mut t, 1); // subtables
    be16(&mut t, 0); // unicode platform
    be16(&mut t, 6); // full repertoire
    be32(&mut t, 12);
    be16(&mut t, 13); // many-to-one ranges
    be16(&mut t, 0);
    be32(&mut t, 16 + 12 * groups.len() as u32);
    be32(&mut t, 0); // language
    be32(&mut t, groups.len() as u32);
    for (start, end, glyph) in groups {
        be32(&mut t, start);
        be32(&mut t, end);
        be32(&mut t, glyph);
    }
    t
}

/// The complete font file
pub fn test_font() -> Vec<u8> {
    let glyf = glyf();
    let loca = loca(glyf.len() as u32);
    // table records are looked up by binary search: keep them sorted
    let tables: [(&[u8; 4], Vec<u8>); 7] = [
        (b"cmap", cmap()),
        (b"glyf", glyf),
        (b"head", head()),
        (b"hhea", hhea()),
        (b"hmtx", hmtx()),
        (b"loca", loca),
        (b"maxp", maxp()),
    ];

    let mut out = Vec::new();
    be32(&mut out, 0x0001_0000);
    be16(&mut out, tables.len() as u16);
    be16(&mut out, 64); // search range
    be16(&mut out, 2); // entry selector
    be16(&mut out, tables.len() as u16 * 16 - 64); // range shift

    let mut offset = 12 + 16 * tables.len() as u32;
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        be32(&mut out, 0); // checksum, unchecked by parsers
        be32(&mut out, offset);
        be32(&mut out, data.len() as u32);
        offset += (data.len() as u32).next_multiple_of(4);
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }
    out
}
