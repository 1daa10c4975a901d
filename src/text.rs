//! # Text Rendering
//!
//! The compositor only depends on the [`TextRenderer`] contract: it asks for
//! the pixel footprint of a string and then has the renderer stamp glyphs
//! into a scratch buffer. [`SpleenText`] is the built-in implementation,
//! backed by the Spleen bitmap fonts.
//!
//! ## Layout
//!
//! Glyphs sit on a fixed grid; `font_size` is an integer pixel multiplier.
//! Newlines start a new row of cells.
//!
//! ```text
//! font_size = 2, face 6x12, "HI"
//! ┌──────────┬──────────┐
//! │ 12 x 24  │ 12 x 24  │   measure() -> Some((24, 24))
//! └──────────┴──────────┘
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spleen_font::{FONT_6X12, FONT_8X16, FONT_12X24, PSF2Font};

use crate::buffer::PixelBuffer;

/// Contract for anything that can rasterize a string into a [`PixelBuffer`].
pub trait TextRenderer {
    /// Pixel footprint `(width, height)` of `text` at `font_size`, or
    /// `None` when either side does not fit in a `u32`.
    fn measure(&self, text: &str, font_size: u32) -> Option<(u32, u32)>;

    /// Stamp `text` into `buffer` with its top-left corner at `(x, y)`.
    ///
    /// Glyph strokes are written with `color`. When `invert` is set, each
    /// glyph cell is first filled with `color` and strokes are drawn in the
    /// opposite color instead. Pixels outside `buffer` are dropped.
    #[allow(clippy::too_many_arguments)]
    fn stamp(
        &self,
        buffer: &mut PixelBuffer,
        text: &str,
        x: i32,
        y: i32,
        font_size: u32,
        color: u8,
        invert: bool,
    );
}

/// Spleen font face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpleenFace {
    #[default]
    Small6x12,
    Medium8x16,
    Large12x24,
}

impl SpleenFace {
    /// Glyph cell size in pixels.
    pub fn cell(&self) -> (u32, u32) {
        match self {
            SpleenFace::Small6x12 => (6, 12),
            SpleenFace::Medium8x16 => (8, 16),
            SpleenFace::Large12x24 => (12, 24),
        }
    }

    fn data(&self) -> &'static [u8] {
        match self {
            SpleenFace::Small6x12 => FONT_6X12,
            SpleenFace::Medium8x16 => FONT_8X16,
            SpleenFace::Large12x24 => FONT_12X24,
        }
    }
}

/// Bitmap text renderer using a Spleen face.
///
/// Printable ASCII glyphs are decoded once at construction; other characters
/// are decoded on first use and cached. Characters missing from the font
/// render as a box.
#[derive(Debug, Clone)]
pub struct SpleenText {
    face: SpleenFace,
    cache: RefCell<HashMap<char, Rc<[bool]>>>,
}

impl Default for SpleenText {
    fn default() -> Self {
        Self::new(SpleenFace::default())
    }
}

impl SpleenText {
    pub fn new(face: SpleenFace) -> Self {
        let mut cache = HashMap::new();
        if let Ok(mut font) = PSF2Font::new(face.data()) {
            for ch in (0x20u8..0x7f).map(char::from) {
                if let Some(glyph) = decode_glyph(&mut font, face, ch) {
                    cache.insert(ch, Rc::from(glyph));
                }
            }
        }
        Self {
            face,
            cache: RefCell::new(cache),
        }
    }

    pub fn face(&self) -> SpleenFace {
        self.face
    }

    /// Glyph bitmap for `ch`, row-major, `true` = stroke.
    fn glyph(&self, ch: char) -> Rc<[bool]> {
        if let Some(glyph) = self.cache.borrow().get(&ch) {
            return Rc::clone(glyph);
        }
        let glyph: Rc<[bool]> = PSF2Font::new(self.face.data())
            .ok()
            .and_then(|mut font| decode_glyph(&mut font, self.face, ch))
            .unwrap_or_else(|| box_glyph(self.face))
            .into();
        self.cache.borrow_mut().insert(ch, Rc::clone(&glyph));
        glyph
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

fn decode_glyph(font: &mut PSF2Font, face: SpleenFace, ch: char) -> Option<Vec<bool>> {
    let (cw, ch_h) = face.cell();
    let (cw, ch_h) = (cw as usize, ch_h as usize);
    let utf8 = ch.to_string();
    let rows = font.glyph_for_utf8(utf8.as_bytes())?;

    let mut glyph = vec![false; cw * ch_h];
    for (row_y, row) in rows.enumerate() {
        for (col_x, on) in row.enumerate() {
            // Rows are padded to whole bytes; ignore the padding bits.
            if row_y < ch_h && col_x < cw {
                glyph[row_y * cw + col_x] = on;
            }
        }
    }
    Some(glyph)
}

/// Outline box used for characters the font cannot render.
fn box_glyph(face: SpleenFace) -> Vec<bool> {
    let (w, h) = face.cell();
    let (w, h) = (w as usize, h as usize);
    let mut glyph = vec![false; w * h];
    for x in 0..w {
        glyph[x] = true;
        glyph[(h - 1) * w + x] = true;
    }
    for y in 0..h {
        glyph[y * w] = true;
        glyph[y * w + w - 1] = true;
    }
    glyph
}

impl TextRenderer for SpleenText {
    fn measure(&self, text: &str, font_size: u32) -> Option<(u32, u32)> {
        if text.is_empty() {
            return Some((0, 0));
        }
        let scale = font_size.max(1);
        let (cw, chh) = self.face.cell();
        let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let columns = u32::try_from(widest).ok()?;
        let rows = u32::try_from(text.lines().count().max(1)).ok()?;
        let width = columns.checked_mul(cw)?.checked_mul(scale)?;
        let height = rows.checked_mul(chh)?.checked_mul(scale)?;
        Some((width, height))
    }

    fn stamp(
        &self,
        buffer: &mut PixelBuffer,
        text: &str,
        x: i32,
        y: i32,
        font_size: u32,
        color: u8,
        invert: bool,
    ) {
        // Geometry in i64: scaled cells can run far past i32 before clipping.
        let scale = i64::from(font_size.max(1));
        let (cw, chh) = self.face.cell();
        let (cw, chh) = (i64::from(cw), i64::from(chh));
        let (cell_w, cell_h) = (cw * scale, chh * scale);
        let (buf_w, buf_h) = (i64::from(buffer.width()), i64::from(buffer.height()));
        let (stroke, ground) = if invert { (255 - color, Some(color)) } else { (color, None) };

        for (line_idx, line) in text.lines().enumerate() {
            let origin_y = i64::from(y) + line_idx as i64 * cell_h;
            if origin_y >= buf_h {
                break;
            }
            if origin_y + cell_h <= 0 {
                continue;
            }
            for (col, ch) in line.chars().enumerate() {
                let origin_x = i64::from(x) + col as i64 * cell_w;
                if origin_x >= buf_w {
                    break;
                }
                if origin_x + cell_w <= 0 {
                    continue;
                }
                if let Some(fill) = ground {
                    fill_clipped(buffer, origin_x, origin_y, cell_w, cell_h, fill);
                }
                let glyph = self.glyph(ch);
                for gy in 0..chh {
                    for gx in 0..cw {
                        if glyph[(gy * cw + gx) as usize] {
                            fill_clipped(
                                buffer,
                                origin_x + gx * scale,
                                origin_y + gy * scale,
                                scale,
                                scale,
                                stroke,
                            );
                        }
                    }
                }
            }
        }
    }
}

/// `fill_rect` over the part of the rectangle inside `buffer`.
fn fill_clipped(buffer: &mut PixelBuffer, x: i64, y: i64, w: i64, h: i64, color: u8) {
    let x1 = x.max(0);
    let y1 = y.max(0);
    let x2 = (x + w).min(i64::from(buffer.width()));
    let y2 = (y + h).min(i64::from(buffer.height()));
    if x1 < x2 && y1 < y2 {
        // Clipped to the buffer, so every value fits its target type.
        buffer.fill_rect(x1 as i32, y1 as i32, (x2 - x1) as u32, (y2 - y1) as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BLACK, WHITE};

    #[test]
    fn test_measure_scales_with_font_size() {
        let text = SpleenText::default();
        assert_eq!(text.measure("HELLO", 1), Some((30, 12)));
        assert_eq!(text.measure("HELLO", 2), Some((60, 24)));
        assert_eq!(text.measure("", 3), Some((0, 0)));
    }

    #[test]
    fn test_measure_overflow_is_none() {
        let text = SpleenText::default();
        assert_eq!(text.measure("HELLO", 3_000_000_000), None);
        assert_eq!(text.measure("A", u32::MAX), None);
    }

    #[test]
    fn test_measure_multiline() {
        let text = SpleenText::new(SpleenFace::Large12x24);
        assert_eq!(text.measure("AB\nCDEF", 1), Some((48, 48)));
    }

    #[test]
    fn test_stamp_stays_inside_footprint() {
        let text = SpleenText::default();
        let (w, h) = text.measure("HELLO", 1).unwrap();
        let mut buf = PixelBuffer::new(w + 10, h + 10, WHITE);
        text.stamp(&mut buf, "HELLO", 5, 5, 1, BLACK, false);

        assert!(buf.count(BLACK) > 0, "glyph strokes should be drawn");
        for y in 0..buf.height() {
            for x in 0..buf.width() {
                let inside = (5..5 + w).contains(&x) && (5..5 + h).contains(&y);
                if !inside {
                    assert_eq!(buf.get(x, y).unwrap(), WHITE, "stray pixel at ({}, {})", x, y);
                }
            }
        }
    }

    #[test]
    fn test_stamp_scale_doubles_ink() {
        let text = SpleenText::default();
        let mut small = PixelBuffer::new(12, 12, WHITE);
        text.stamp(&mut small, "A", 0, 0, 1, BLACK, false);
        let mut big = PixelBuffer::new(24, 24, WHITE);
        text.stamp(&mut big, "A", 0, 0, 2, BLACK, false);
        assert_eq!(big.count(BLACK), small.count(BLACK) * 4);
    }

    #[test]
    fn test_stamp_invert_fills_cell() {
        let text = SpleenText::default();
        let mut normal = PixelBuffer::new(6, 12, WHITE);
        text.stamp(&mut normal, "A", 0, 0, 1, BLACK, false);
        let mut inverted = PixelBuffer::new(6, 12, WHITE);
        text.stamp(&mut inverted, "A", 0, 0, 1, BLACK, true);
        assert_eq!(inverted.count(WHITE), normal.count(BLACK));
    }

    #[test]
    fn test_stamp_clips() {
        let text = SpleenText::default();
        let mut buf = PixelBuffer::new(4, 4, WHITE);
        text.stamp(&mut buf, "WWWW", -3, -3, 2, BLACK, false);
        assert_eq!(buf.dimensions(), (4, 4));
    }

    #[test]
    fn test_stamp_huge_scale_fills_visible_part() {
        let text = SpleenText::default();
        let mut buf = PixelBuffer::new(8, 8, WHITE);
        text.stamp(&mut buf, "  ", 0, 0, u32::MAX, BLACK, true);
        assert_eq!(buf.count(BLACK), 64);

        let mut far = PixelBuffer::new(8, 8, WHITE);
        text.stamp(&mut far, "  ", i32::MAX, i32::MIN, u32::MAX, BLACK, true);
        assert_eq!(far.count(BLACK), 0);
    }

    #[test]
    fn test_non_ascii_glyphs_are_cached() {
        let text = SpleenText::default();
        let before = text.cached();
        let mut buf = PixelBuffer::new(60, 12, WHITE);
        text.stamp(&mut buf, "ééééé", 0, 0, 1, BLACK, false);
        assert_eq!(text.cached(), before + 1);
    }

    #[test]
    fn test_space_has_no_ink() {
        let text = SpleenText::default();
        let mut buf = PixelBuffer::new(6, 12, WHITE);
        text.stamp(&mut buf, " ", 0, 0, 1, BLACK, false);
        assert_eq!(buf.count(BLACK), 0);
    }
}
