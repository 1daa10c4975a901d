//! # Dithering and Bit Packing
//!
//! This module converts grayscale canvases to strictly binary ones (every
//! pixel `0` or `255`) and packs binary canvases into the 1-bit format the
//! panel controller consumes.
//!
//! ## Algorithms
//!
//! | Method | Error propagation | Look |
//! |--------|-------------------|------|
//! | Floyd-Steinberg | To 4 unvisited neighbours | Fine grain, preserves tone |
//! | Threshold | None | Hard edges, banding on gradients |
//! | None | n/a | Leaves grayscale untouched |
//!
//! ## Floyd-Steinberg Kernel
//!
//! Pixels are visited in plain raster order (left to right, top to bottom).
//! The quantization error of the current pixel `*` is pushed forward:
//!
//! ```text
//!          *    7/16
//!  3/16  5/16   1/16
//! ```
//!
//! The pass runs over an `f32` working copy so that error already pushed into
//! a pixel is part of its own quantization when the scan reaches it.
//!
//! ## Bit Packing
//!
//! ```text
//! pixels: W W B B W B W B | W ...
//! bits:   1 1 0 0 1 0 1 0 | 1 0 0 0 0 0 0 0
//!         └── 0xCA ──────┘  └── padding ──┘
//! ```
//!
//! - Bit 7 (MSB) = leftmost pixel
//! - 1 = white (255), 0 = black (0)
//! - Every row starts on a byte boundary: `ceil(width / 8)` bytes per row
//!
//! ## Example
//!
//! ```
//! use tinta::buffer::PixelBuffer;
//! use tinta::dither;
//!
//! let img = PixelBuffer::new(10, 2, 255);
//! let packed = dither::pack(&img);
//! assert_eq!(packed, vec![0xFF, 0xC0, 0xFF, 0xC0]);
//! assert_eq!(dither::unpack(&packed, 10, 2).unwrap(), img);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::{BLACK, PixelBuffer, WHITE};
use crate::error::{Result, TintaError};

/// Cutoff used by thresholding, Floyd-Steinberg quantization and packing.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Dithering algorithm selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitherMode {
    /// Floyd-Steinberg error diffusion.
    #[default]
    FloydSteinberg,
    /// Flat threshold at [`DEFAULT_THRESHOLD`].
    Threshold,
    /// No dithering; grayscale passes through.
    None,
}

impl DitherMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DitherMode::FloydSteinberg => "floyd-steinberg",
            DitherMode::Threshold => "threshold",
            DitherMode::None => "none",
        }
    }

    /// Run this algorithm over `img`.
    pub fn apply(&self, img: &PixelBuffer) -> PixelBuffer {
        match self {
            DitherMode::FloydSteinberg => floyd_steinberg(img),
            DitherMode::Threshold => threshold(img, DEFAULT_THRESHOLD),
            DitherMode::None => img.clone(),
        }
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherMode {
    type Err = TintaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "floyd-steinberg" | "floyd_steinberg" | "fs" => Ok(DitherMode::FloydSteinberg),
            "threshold" => Ok(DitherMode::Threshold),
            "none" => Ok(DitherMode::None),
            _ => Err(TintaError::UnsupportedMode(format!("dither mode '{}'", s))),
        }
    }
}

// ============================================================================
// DITHERING
// ============================================================================

/// Floyd-Steinberg error diffusion to a binary buffer.
///
/// A pixel becomes white when its accumulated value exceeds 128.
pub fn floyd_steinberg(img: &PixelBuffer) -> PixelBuffer {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let mut work: Vec<f32> = img.as_raw().iter().map(|&p| p as f32).collect();
    let cutoff = DEFAULT_THRESHOLD as f32;

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = work[idx];
            let new = if old > cutoff { 255.0 } else { 0.0 };
            work[idx] = new;

            let error = old - new;
            if x + 1 < width {
                work[idx + 1] += error * 7.0 / 16.0;
            }
            if y + 1 < height {
                let below = idx + width;
                if x > 0 {
                    work[below - 1] += error * 3.0 / 16.0;
                }
                work[below] += error * 5.0 / 16.0;
                if x + 1 < width {
                    work[below + 1] += error * 1.0 / 16.0;
                }
            }
        }
    }

    let pixels = work
        .into_iter()
        .map(|v| if v > 0.0 { WHITE } else { BLACK })
        .collect();
    // `work` has exactly width * height entries.
    PixelBuffer::from_raw(img.width(), img.height(), pixels)
        .unwrap_or_else(|_| PixelBuffer::new(img.width(), img.height(), WHITE))
}

/// Flat threshold: `pixel > cutoff` becomes white, everything else black.
pub fn threshold(img: &PixelBuffer, cutoff: u8) -> PixelBuffer {
    img.map(|p| if p > cutoff { WHITE } else { BLACK })
}

// ============================================================================
// BIT PACKING
// ============================================================================

/// Bytes per packed row.
#[inline]
pub fn row_bytes(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

/// Total packed length for a `width x height` image.
#[inline]
pub fn packed_len(width: u32, height: u32) -> usize {
    row_bytes(width) * height as usize
}

/// Pack one row of pixels, MSB first. Pixels above 128 set their bit.
///
/// ```
/// use tinta::dither::pack_row;
///
/// assert_eq!(pack_row(&[255, 255, 0, 0, 255, 0, 255, 0]), vec![0xCA]);
/// assert_eq!(pack_row(&[255; 9]), vec![0xFF, 0x80]);
/// ```
pub fn pack_row(pixels: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; pixels.len().div_ceil(8)];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel > DEFAULT_THRESHOLD {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8); // MSB first
            bytes[byte_idx] |= 1 << bit_idx;
        }
    }

    bytes
}

/// Pack a binary buffer into `ceil(width/8) * height` bytes.
///
/// Packing quantizes at the same cutoff as [`threshold`], so a grayscale
/// buffer packs as if it had been thresholded first.
pub fn pack(img: &PixelBuffer) -> Vec<u8> {
    let width = img.width() as usize;
    let mut data = Vec::with_capacity(packed_len(img.width(), img.height()));
    if width == 0 {
        return data;
    }
    for row in img.as_raw().chunks(width) {
        data.extend(pack_row(row));
    }
    data
}

/// Exact inverse of [`pack`].
///
/// Fails with [`TintaError::SizeMismatch`] unless
/// `data.len() == ceil(width/8) * height`.
pub fn unpack(data: &[u8], width: u32, height: u32) -> Result<PixelBuffer> {
    let expected = packed_len(width, height);
    if data.len() != expected {
        return Err(TintaError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    let stride = row_bytes(width);
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let byte = data[y * stride + x / 8];
            let bit = 7 - (x % 8);
            pixels.push(if byte >> bit & 1 == 1 { WHITE } else { BLACK });
        }
    }
    PixelBuffer::from_raw(width, height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut img = PixelBuffer::new(width, height, 0);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, ((x * 255) / width.max(1)) as u8).unwrap();
            }
        }
        img
    }

    #[test]
    fn test_threshold_cutoff_is_exclusive() {
        let img = PixelBuffer::from_raw(4, 1, vec![0, 128, 129, 255]).unwrap();
        assert_eq!(threshold(&img, 128).as_raw(), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_threshold_idempotent() {
        let once = threshold(&gradient(64, 8), DEFAULT_THRESHOLD);
        let twice = threshold(&once, DEFAULT_THRESHOLD);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_floyd_steinberg_is_binary() {
        let out = floyd_steinberg(&gradient(97, 31));
        assert_eq!(out.dimensions(), (97, 31));
        assert!(out.is_binary());
    }

    #[test]
    fn test_floyd_steinberg_preserves_extremes() {
        let black = PixelBuffer::new(20, 20, 0);
        assert_eq!(floyd_steinberg(&black).count(0), 400);
        let white = PixelBuffer::new(20, 20, 255);
        assert_eq!(floyd_steinberg(&white).count(255), 400);
    }

    #[test]
    fn test_floyd_steinberg_mid_gray_half_ink() {
        let out = floyd_steinberg(&PixelBuffer::new(128, 128, 128));
        let white = out.count(WHITE) as f64 / (128.0 * 128.0);
        assert!(
            (white - 0.5).abs() < 0.02,
            "mid-gray should dither to ~50% white, got {:.3}",
            white
        );
    }

    #[test]
    fn test_floyd_steinberg_first_row_diffusion() {
        // 129 goes white (error -126); the right neighbour receives
        // -126 * 7/16 = -55.125 before its own quantization.
        let img = PixelBuffer::from_raw(2, 1, vec![129, 200]).unwrap();
        let out = floyd_steinberg(&img);
        assert_eq!(out.as_raw(), &[255, 255]);

        let img = PixelBuffer::from_raw(2, 1, vec![129, 180]).unwrap();
        // 180 - 55.125 = 124.875 -> black
        assert_eq!(floyd_steinberg(&img).as_raw(), &[255, 0]);
    }

    #[test]
    fn test_dither_mode_parse() {
        assert_eq!("fs".parse::<DitherMode>().unwrap(), DitherMode::FloydSteinberg);
        assert_eq!(
            "Floyd-Steinberg".parse::<DitherMode>().unwrap(),
            DitherMode::FloydSteinberg
        );
        assert_eq!("none".parse::<DitherMode>().unwrap(), DitherMode::None);
        assert!(matches!(
            "bayer".parse::<DitherMode>(),
            Err(TintaError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn test_dither_mode_serde_names() {
        let json = serde_json::to_string(&DitherMode::FloydSteinberg).unwrap();
        assert_eq!(json, "\"floyd-steinberg\"");
        let mode: DitherMode = serde_json::from_str("\"threshold\"").unwrap();
        assert_eq!(mode, DitherMode::Threshold);
    }

    #[test]
    fn test_pack_row_msb_first() {
        assert_eq!(pack_row(&[255; 8]), vec![0xFF]);
        assert_eq!(pack_row(&[0; 8]), vec![0x00]);
        assert_eq!(pack_row(&[255, 0, 255, 0, 255, 0, 255, 0]), vec![0xAA]);
        assert_eq!(pack_row(&[255, 255, 255, 255]), vec![0xF0]);
        assert_eq!(pack_row(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_pack_rows_start_on_byte_boundary() {
        // 3 pixels wide: each row gets its own byte.
        let img = PixelBuffer::from_raw(3, 2, vec![255, 0, 0, 0, 0, 255]).unwrap();
        assert_eq!(pack(&img), vec![0x80, 0x20]);
    }

    #[test]
    fn test_pack_length() {
        let img = PixelBuffer::new(128, 250, 255);
        assert_eq!(pack(&img).len(), 4000);
        assert_eq!(packed_len(250, 128), 32 * 128);
    }

    #[test]
    fn test_unpack_roundtrip_odd_width() {
        let img = threshold(&gradient(13, 5), DEFAULT_THRESHOLD);
        assert_eq!(unpack(&pack(&img), 13, 5).unwrap(), img);
    }

    #[test]
    fn test_unpack_size_mismatch() {
        assert!(matches!(
            unpack(&[0u8; 3], 16, 2),
            Err(TintaError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }
}
