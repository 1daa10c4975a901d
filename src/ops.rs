//! # Image Operations
//!
//! Stateless geometric and tone transforms over a [`PixelBuffer`]. Every
//! function borrows its input and returns a new owned buffer.
//!
//! Resampling goes through the `image` crate with a Lanczos3 filter, the
//! same filter used for photo preparation elsewhere in the pipeline.
//!
//! ## Resize Modes
//!
//! ```text
//! source 2:1        stretch          fit              crop
//! ┌────────┐       ┌────┐          ┌────┐           ┌────┐
//! │ ▓▓▓▓▓▓ │  →    │▓▓▓▓│          │    │           │▓▓▓▓│
//! └────────┘       │▓▓▓▓│          │▓▓▓▓│           │▓▓▓▓│
//!                  └────┘          │    │           └────┘
//!                 (distorts)       └────┘         (overflow cut)
//! ```

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{Result, TintaError};

// ============================================================================
// MODES
// ============================================================================

/// How an image is scaled into its layer footprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    /// Scale each axis independently to the exact target size.
    Stretch,
    /// Preserve aspect ratio, fit inside the target, centre on a background.
    #[default]
    Fit,
    /// Preserve aspect ratio, cover the target, cut the overflow.
    Crop,
}

impl ResizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::Stretch => "stretch",
            ResizeMode::Fit => "fit",
            ResizeMode::Crop => "crop",
        }
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeMode {
    type Err = TintaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stretch" => Ok(ResizeMode::Stretch),
            "fit" => Ok(ResizeMode::Fit),
            "crop" => Ok(ResizeMode::Crop),
            _ => Err(TintaError::UnsupportedMode(format!("resize mode '{}'", s))),
        }
    }
}

/// Counter-clockwise rotation in quarter turns.
///
/// Serialized as degrees (`0`, `90`, `180`, `270`). Any multiple of 90 is
/// accepted and normalized modulo 360; anything else is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    None,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    /// Rotation from degrees counter-clockwise.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(TintaError::UnsupportedMode(format!(
                "rotation {} (must be a multiple of 90)",
                degrees
            )));
        }
        Ok(match degrees.rem_euclid(360) / 90 {
            0 => Rotation::None,
            1 => Rotation::Ccw90,
            2 => Rotation::Ccw180,
            _ => Rotation::Ccw270,
        })
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Ccw90 => 90,
            Rotation::Ccw180 => 180,
            Rotation::Ccw270 => 270,
        }
    }

    /// Rotate `img` by this amount.
    pub fn apply(&self, img: &PixelBuffer) -> PixelBuffer {
        match self {
            Rotation::None => img.clone(),
            Rotation::Ccw90 => rotate_ccw_90(img),
            Rotation::Ccw180 => rotate_180(img),
            Rotation::Ccw270 => rotate_cw_90(img),
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = TintaError;

    fn try_from(degrees: i32) -> Result<Self> {
        Self::from_degrees(degrees)
    }
}

impl From<Rotation> for i32 {
    fn from(r: Rotation) -> i32 {
        r.degrees()
    }
}

// ============================================================================
// RESIZE
// ============================================================================

fn resample(img: &PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    let resized = imageops::resize(&img.to_gray_image(), width, height, FilterType::Lanczos3);
    PixelBuffer::from_gray_image(resized)
}

/// Resize `img` to exactly `target_w x target_h` using `mode`.
///
/// - `bg_color` fills the bands left by [`ResizeMode::Fit`].
/// - `crop_x` / `crop_y` choose the window for [`ResizeMode::Crop`]; `None`
///   centres it, `Some` is clamped to `[0, scaled - target]`.
///
/// `Fit` never enlarges: an image already inside the target is centred at
/// its native size.
pub fn resize(
    img: &PixelBuffer,
    target_w: u32,
    target_h: u32,
    mode: ResizeMode,
    bg_color: u8,
    crop_x: Option<i32>,
    crop_y: Option<i32>,
) -> PixelBuffer {
    if target_w == 0 || target_h == 0 {
        return PixelBuffer::new(target_w, target_h, bg_color);
    }
    if img.is_empty() {
        return PixelBuffer::new(target_w, target_h, bg_color);
    }

    let (src_w, src_h) = img.dimensions();

    match mode {
        ResizeMode::Stretch => resample(img, target_w, target_h),
        ResizeMode::Fit => {
            let scale = (target_w as f64 / src_w as f64)
                .min(target_h as f64 / src_h as f64)
                .min(1.0);
            let new_w = ((src_w as f64 * scale).round() as u32).clamp(1, target_w);
            let new_h = ((src_h as f64 * scale).round() as u32).clamp(1, target_h);
            let scaled = resample(img, new_w, new_h);

            let mut result = PixelBuffer::new(target_w, target_h, bg_color);
            let x = (target_w - new_w) / 2;
            let y = (target_h - new_h) / 2;
            result.blit(&scaled, x as i32, y as i32);
            result
        }
        ResizeMode::Crop => {
            let img_ratio = src_w as f64 / src_h as f64;
            let target_ratio = target_w as f64 / target_h as f64;

            // Match the limiting axis, let the other overflow.
            let (new_w, new_h) = if img_ratio > target_ratio {
                ((target_h as f64 * img_ratio) as u32, target_h)
            } else {
                (target_w, (target_w as f64 / img_ratio) as u32)
            };
            let new_w = new_w.max(target_w);
            let new_h = new_h.max(target_h);
            let scaled = resample(img, new_w, new_h);

            let max_x = (new_w - target_w) as i32;
            let max_y = (new_h - target_h) as i32;
            let x = crop_x.map_or(max_x / 2, |cx| cx.clamp(0, max_x));
            let y = crop_y.map_or(max_y / 2, |cy| cy.clamp(0, max_y));

            crop(&scaled, x, y, target_w, target_h)
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Mirror left-right.
pub fn flip_horizontal(img: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_gray_image(imageops::flip_horizontal(&img.to_gray_image()))
}

/// Mirror top-bottom.
pub fn flip_vertical(img: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_gray_image(imageops::flip_vertical(&img.to_gray_image()))
}

/// Rotate 90° counter-clockwise. Output is `height x width`.
pub fn rotate_ccw_90(img: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_gray_image(imageops::rotate270(&img.to_gray_image()))
}

/// Rotate 90° clockwise. Output is `height x width`.
pub fn rotate_cw_90(img: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_gray_image(imageops::rotate90(&img.to_gray_image()))
}

/// Rotate 180°.
pub fn rotate_180(img: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_gray_image(imageops::rotate180(&img.to_gray_image()))
}

/// Extract a rectangle, clamped to the image bounds.
///
/// The origin is clamped into the image first, then the far edge is clipped,
/// so the result may be smaller than requested.
pub fn crop(img: &PixelBuffer, x: i32, y: i32, width: u32, height: u32) -> PixelBuffer {
    let (img_w, img_h) = img.dimensions();
    if img.is_empty() {
        return PixelBuffer::new(0, 0, 0);
    }
    let x = x.clamp(0, img_w as i32 - 1) as u32;
    let y = y.clamp(0, img_h as i32 - 1) as u32;
    let x2 = (x as u64 + width as u64).min(img_w as u64) as u32;
    let y2 = (y as u64 + height as u64).min(img_h as u64) as u32;

    let mut out = PixelBuffer::new(x2 - x, y2 - y, 0);
    out.blit(img, -(x as i32), -(y as i32));
    out
}

// ============================================================================
// TONE
// ============================================================================

/// `pixel -> 255 - pixel`
pub fn invert(img: &PixelBuffer) -> PixelBuffer {
    img.map(|p| 255 - p)
}

/// Contrast parameter to multiplier: `-100..100` maps onto `0..2`.
///
/// `0` is neutral, `100` doubles every pixel's distance from the midpoint,
/// `-100` (or lower) collapses the image to flat mid-gray.
#[inline]
pub fn contrast_factor(contrast: f32) -> f32 {
    (1.0 + contrast / 100.0).max(0.0)
}

/// Scale brightness, then stretch contrast around 128.
///
/// ```text
/// v   = old * brightness
/// new = clamp(128 + contrast_factor(contrast) * (v - 128), 0, 255)
/// ```
pub fn adjust_brightness_contrast(
    img: &PixelBuffer,
    brightness: f32,
    contrast: f32,
) -> PixelBuffer {
    let factor = contrast_factor(contrast);
    img.map(|p| {
        let v = p as f32 * brightness;
        (128.0 + factor * (v - 128.0)).round().clamp(0.0, 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BLACK, WHITE};

    /// 3x2 image with distinct values:
    /// ```text
    /// 0 1 2
    /// 3 4 5
    /// ```
    fn sample() -> PixelBuffer {
        PixelBuffer::from_raw(3, 2, vec![0, 1, 2, 3, 4, 5]).unwrap()
    }

    #[test]
    fn test_flip_horizontal() {
        assert_eq!(flip_horizontal(&sample()).as_raw(), &[2, 1, 0, 5, 4, 3]);
    }

    #[test]
    fn test_flip_vertical() {
        assert_eq!(flip_vertical(&sample()).as_raw(), &[3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn test_rotate_ccw_90() {
        // CCW: the right column becomes the top row.
        let r = rotate_ccw_90(&sample());
        assert_eq!(r.dimensions(), (2, 3));
        assert_eq!(r.as_raw(), &[2, 5, 1, 4, 0, 3]);
    }

    #[test]
    fn test_rotate_cw_90() {
        let r = rotate_cw_90(&sample());
        assert_eq!(r.dimensions(), (2, 3));
        assert_eq!(r.as_raw(), &[3, 0, 4, 1, 5, 2]);
    }

    #[test]
    fn test_rotate_180() {
        assert_eq!(rotate_180(&sample()).as_raw(), &[5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_four_ccw_turns_identity() {
        let img = sample();
        let mut r = img.clone();
        for _ in 0..4 {
            r = rotate_ccw_90(&r);
        }
        assert_eq!(r, img);
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0).unwrap(), Rotation::None);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::Ccw90);
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Ccw270);
        assert!(matches!(
            Rotation::from_degrees(45),
            Err(TintaError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn test_rotation_apply_matches_turns() {
        let img = sample();
        assert_eq!(Rotation::Ccw270.apply(&img), rotate_cw_90(&img));
        assert_eq!(
            Rotation::Ccw180.apply(&img),
            rotate_ccw_90(&rotate_ccw_90(&img))
        );
    }

    #[test]
    fn test_invert() {
        let img = PixelBuffer::from_raw(3, 1, vec![0, 100, 255]).unwrap();
        assert_eq!(invert(&img).as_raw(), &[255, 155, 0]);
    }

    #[test]
    fn test_crop_clamps() {
        let img = sample();
        let c = crop(&img, 1, 0, 10, 10);
        assert_eq!(c.dimensions(), (2, 2));
        assert_eq!(c.as_raw(), &[1, 2, 4, 5]);

        let c = crop(&img, -5, -5, 1, 1);
        assert_eq!(c.as_raw(), &[0]);
    }

    #[test]
    fn test_resize_stretch_exact_size() {
        let img = PixelBuffer::new(100, 50, 90);
        let r = resize(&img, 20, 70, ResizeMode::Stretch, WHITE, None, None);
        assert_eq!(r.dimensions(), (20, 70));
        // Uniform input stays uniform under any resampling filter.
        assert!(r.as_raw().iter().all(|&p| (p as i32 - 90).abs() <= 1));
    }

    #[test]
    fn test_resize_fit_centres_with_bands() {
        let img = PixelBuffer::new(100, 50, BLACK);
        let r = resize(&img, 50, 50, ResizeMode::Fit, WHITE, None, None);
        assert_eq!(r.dimensions(), (50, 50));

        let row_is = |y: u32, v: u8| (0..50).all(|x| r.get(x, y).unwrap() == v);
        let top = (0..50).take_while(|&y| row_is(y, WHITE)).count();
        let bottom = (0..50).rev().take_while(|&y| row_is(y, WHITE)).count();
        assert!(top > 0);
        assert!((top as i32 - bottom as i32).abs() <= 1, "top {} bottom {}", top, bottom);
        assert!(row_is(25, BLACK));
        // Full width is used.
        assert_eq!(r.get(0, 25).unwrap(), BLACK);
        assert_eq!(r.get(49, 25).unwrap(), BLACK);
    }

    #[test]
    fn test_resize_fit_does_not_enlarge() {
        let img = PixelBuffer::new(10, 10, BLACK);
        let r = resize(&img, 30, 30, ResizeMode::Fit, WHITE, None, None);
        assert_eq!(r.count(BLACK), 100);
        assert_eq!(r.get(10, 10).unwrap(), BLACK);
        assert_eq!(r.get(9, 9).unwrap(), WHITE);
    }

    #[test]
    fn test_resize_crop_window() {
        // Left half black, right half white; 2:1 into a square keeps one half
        // when the crop window is pushed to an edge.
        let mut img = PixelBuffer::new(100, 50, WHITE);
        img.fill_rect(0, 0, 50, 50, BLACK);

        let left = resize(&img, 20, 20, ResizeMode::Crop, WHITE, Some(0), None);
        assert_eq!(left.dimensions(), (20, 20));
        assert!(left.get(2, 10).unwrap() < 20);

        let right = resize(&img, 20, 20, ResizeMode::Crop, WHITE, Some(1000), None);
        assert!(right.get(17, 10).unwrap() > 235);
    }

    #[test]
    fn test_resize_zero_target() {
        let img = sample();
        let r = resize(&img, 0, 5, ResizeMode::Fit, WHITE, None, None);
        assert!(r.is_empty());
    }

    #[test]
    fn test_resize_mode_parse() {
        assert_eq!("crop".parse::<ResizeMode>().unwrap(), ResizeMode::Crop);
        assert!(matches!(
            "zoom".parse::<ResizeMode>(),
            Err(TintaError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn test_contrast_factor_mapping() {
        assert_eq!(contrast_factor(0.0), 1.0);
        assert_eq!(contrast_factor(100.0), 2.0);
        assert_eq!(contrast_factor(-100.0), 0.0);
        assert_eq!(contrast_factor(-250.0), 0.0);
    }

    #[test]
    fn test_adjust_brightness_contrast_numeric() {
        let img = PixelBuffer::from_raw(3, 1, vec![100, 128, 200]).unwrap();
        // Contrast 50 => factor 1.5
        let c = adjust_brightness_contrast(&img, 1.0, 50.0);
        assert_eq!(c.as_raw(), &[86, 128, 236]);
        // Brightness scales before contrast: 100 * 2 = 200
        let b = adjust_brightness_contrast(&img, 2.0, 0.0);
        assert_eq!(b.as_raw(), &[200, 255, 255]);
        // Fully flattened
        let f = adjust_brightness_contrast(&img, 1.0, -100.0);
        assert!(f.as_raw().iter().all(|&p| p == 128));
    }
}
