//! # Pixel Buffer
//!
//! A fixed-size grayscale canvas with one byte per pixel.
//!
//! ```text
//! 0 ────────────── 128 ────────────── 255
//! black          midpoint           white
//! ```
//!
//! Grayscale buffers may hold any value; binary buffers (after dithering)
//! hold exactly `0` or `255`. Pixels are stored row-major, so the pixel at
//! `(x, y)` lives at index `y * width + x`.
//!
//! ## Example
//!
//! ```
//! use tinta::buffer::PixelBuffer;
//!
//! let mut canvas = PixelBuffer::new(16, 8, 255);
//! canvas.set(3, 2, 0).unwrap();
//! assert_eq!(canvas.get(3, 2).unwrap(), 0);
//!
//! // Pasting is clipped: the part of `dot` past the right edge is dropped.
//! let dot = PixelBuffer::new(4, 4, 0);
//! canvas.blit(&dot, 14, 0);
//! assert_eq!(canvas.get(15, 3).unwrap(), 0);
//! ```

use std::path::Path;

use image::{DynamicImage, GrayImage};

use crate::error::{Result, TintaError};

/// Value of a white pixel.
pub const WHITE: u8 = 255;

/// Value of a black pixel.
pub const BLACK: u8 = 0;

/// Row-major 8-bit grayscale pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl PixelBuffer {
    /// Create a buffer of `width x height` pixels, all set to `fill`.
    pub fn new(width: u32, height: u32, fill: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// Wrap existing row-major pixel data.
    ///
    /// Fails with [`TintaError::SizeMismatch`] if `pixels.len() != width * height`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(TintaError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `true` for a zero-area buffer.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Raw row-major pixel data.
    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the buffer and return its pixel data.
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(TintaError::OutOfBounds {
                x: x as i64,
                y: y as i64,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    /// Read the pixel at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Result<u8> {
        let idx = self.index(x, y)?;
        Ok(self.pixels[idx])
    }

    /// Write the pixel at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: u8) -> Result<()> {
        let idx = self.index(x, y)?;
        self.pixels[idx] = value;
        Ok(())
    }

    /// Unchecked-by-contract read used by the hot loops in this crate.
    /// Callers guarantee `x < width && y < height`.
    #[inline]
    pub(crate) fn at(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub(crate) fn put(&mut self, x: u32, y: u32, value: u8) {
        let w = self.width as usize;
        self.pixels[y as usize * w + x as usize] = value;
    }

    /// Set every pixel to `value`.
    pub fn fill(&mut self, value: u8) {
        self.pixels.fill(value);
    }

    /// Set every pixel of a rectangle to `value`, clipped to the buffer.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, value: u8) {
        let Some((x1, y1, x2, y2)) = self.clip(x, y, width, height) else {
            return;
        };
        let w = self.width as usize;
        for row in y1..y2 {
            let start = row as usize * w;
            self.pixels[start + x1 as usize..start + x2 as usize].fill(value);
        }
    }

    /// Clip a rectangle to the buffer, returning `(x1, y1, x2, y2)` with
    /// exclusive upper bounds, or `None` when nothing remains.
    pub fn clip(&self, x: i32, y: i32, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = (x as i64).max(0);
        let y1 = (y as i64).max(0);
        let x2 = (x as i64 + width as i64).min(self.width as i64);
        let y2 = (y as i64 + height as i64).min(self.height as i64);
        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some((x1 as u32, y1 as u32, x2 as u32, y2 as u32))
    }

    /// Copy `src` into `self` with its top-left corner at `(dst_x, dst_y)`.
    ///
    /// Pixels that would land outside `self` are silently dropped.
    pub fn blit(&mut self, src: &PixelBuffer, dst_x: i32, dst_y: i32) {
        self.blit_where(src, dst_x, dst_y, |_| true);
    }

    /// Like [`blit`](Self::blit), but only copies source pixels for which
    /// `mask` returns `true`. Masked-out pixels leave the destination intact.
    pub fn blit_where<F>(&mut self, src: &PixelBuffer, dst_x: i32, dst_y: i32, mask: F)
    where
        F: Fn(u8) -> bool,
    {
        let Some((x1, y1, x2, y2)) = self.clip(dst_x, dst_y, src.width, src.height) else {
            return;
        };
        for y in y1..y2 {
            let sy = (y as i64 - dst_y as i64) as u32;
            for x in x1..x2 {
                let sx = (x as i64 - dst_x as i64) as u32;
                let value = src.at(sx, sy);
                if mask(value) {
                    self.put(x, y, value);
                }
            }
        }
    }

    /// `true` if every pixel is exactly black or white.
    pub fn is_binary(&self) -> bool {
        self.pixels.iter().all(|&p| p == BLACK || p == WHITE)
    }

    /// Count pixels with the given value.
    pub fn count(&self, value: u8) -> usize {
        self.pixels.iter().filter(|&&p| p == value).count()
    }

    /// Apply `f` to every pixel, producing a new buffer.
    pub fn map<F>(&self, f: F) -> PixelBuffer
    where
        F: Fn(u8) -> u8,
    {
        PixelBuffer {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|&p| f(p)).collect(),
        }
    }

    // ========================================================================
    // IMAGE CRATE INTEROP
    // ========================================================================

    /// Convert to an `image` crate grayscale image.
    pub fn to_gray_image(&self) -> GrayImage {
        // Dimensions always agree with the pixel vector, so this cannot fail.
        GrayImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// Build from an `image` crate grayscale image.
    pub fn from_gray_image(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Build from any decoded image, converting to 8-bit luma.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        Self::from_gray_image(img.to_luma8())
    }

    /// Decode an image file as grayscale.
    ///
    /// Fails with [`TintaError::SourceLoad`] if the file is missing or undecodable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| TintaError::SourceLoad(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_dynamic(&img))
    }

    /// Decode an in-memory encoded image (PNG, BMP, ...) as grayscale.
    pub fn load_from_memory(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| TintaError::SourceLoad(format!("in-memory image: {}", e)))?;
        Ok(Self::from_dynamic(&img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills() {
        let buf = PixelBuffer::new(4, 3, 200);
        assert_eq!(buf.dimensions(), (4, 3));
        assert_eq!(buf.as_raw().len(), 12);
        assert!(buf.as_raw().iter().all(|&p| p == 200));
    }

    #[test]
    fn test_get_set_bounds() {
        let mut buf = PixelBuffer::new(4, 3, WHITE);
        buf.set(3, 2, 7).unwrap();
        assert_eq!(buf.get(3, 2).unwrap(), 7);
        assert!(matches!(
            buf.get(4, 0),
            Err(TintaError::OutOfBounds { x: 4, y: 0, .. })
        ));
        assert!(matches!(buf.set(0, 3, 0), Err(TintaError::OutOfBounds { .. })));
    }

    #[test]
    fn test_from_raw_size_check() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 4]).is_ok());
        assert!(matches!(
            PixelBuffer::from_raw(2, 2, vec![0; 5]),
            Err(TintaError::SizeMismatch {
                expected: 4,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_fill() {
        let mut buf = PixelBuffer::new(3, 3, WHITE);
        buf.fill(BLACK);
        assert_eq!(buf.count(BLACK), 9);
    }

    #[test]
    fn test_blit_clips_right_and_bottom() {
        let mut canvas = PixelBuffer::new(8, 8, WHITE);
        let src = PixelBuffer::new(4, 4, BLACK);
        canvas.blit(&src, 6, 6);
        assert_eq!(canvas.count(BLACK), 4);
        assert_eq!(canvas.get(7, 7).unwrap(), BLACK);
        assert_eq!(canvas.get(5, 5).unwrap(), WHITE);
    }

    #[test]
    fn test_blit_clips_negative_origin() {
        let mut canvas = PixelBuffer::new(8, 8, WHITE);
        let mut src = PixelBuffer::new(4, 4, BLACK);
        src.set(3, 3, 100).unwrap();
        canvas.blit(&src, -2, -2);
        assert_eq!(canvas.count(BLACK), 3);
        assert_eq!(canvas.get(1, 1).unwrap(), 100);
    }

    #[test]
    fn test_blit_fully_outside_is_noop() {
        let mut canvas = PixelBuffer::new(8, 8, WHITE);
        let src = PixelBuffer::new(4, 4, BLACK);
        canvas.blit(&src, 8, 0);
        canvas.blit(&src, 0, -4);
        assert_eq!(canvas.count(WHITE), 64);
    }

    #[test]
    fn test_blit_where_mask() {
        let mut canvas = PixelBuffer::new(2, 1, BLACK);
        let src = PixelBuffer::from_raw(2, 1, vec![WHITE, 10]).unwrap();
        canvas.blit_where(&src, 0, 0, |p| p < WHITE);
        assert_eq!(canvas.as_raw(), &[BLACK, 10]);
    }

    #[test]
    fn test_fill_rect_clipped() {
        let mut buf = PixelBuffer::new(5, 5, WHITE);
        buf.fill_rect(3, 3, 10, 10, BLACK);
        assert_eq!(buf.count(BLACK), 4);
        buf.fill_rect(-10, 0, 5, 5, BLACK);
        assert_eq!(buf.count(BLACK), 4);
    }

    #[test]
    fn test_gray_image_roundtrip() {
        let buf = PixelBuffer::from_raw(3, 2, vec![0, 50, 100, 150, 200, 255]).unwrap();
        let back = PixelBuffer::from_gray_image(buf.to_gray_image());
        assert_eq!(back, buf);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PixelBuffer::load("/nonexistent/tinta/missing.png").unwrap_err();
        assert!(matches!(err, TintaError::SourceLoad(_)));
    }

    #[test]
    fn test_is_binary() {
        assert!(PixelBuffer::from_raw(2, 1, vec![0, 255]).unwrap().is_binary());
        assert!(!PixelBuffer::from_raw(2, 1, vec![0, 128]).unwrap().is_binary());
    }
}
