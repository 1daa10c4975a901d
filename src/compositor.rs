//! # Compositor
//!
//! Paints a [`Composition`] onto a grayscale canvas and turns the result into
//! something a file or a display can take.
//!
//! ## Pipeline
//!
//! ```text
//! canvas = background_color
//!    │
//!    ├── for each visible layer, in order
//!    │     image      load → flip_h → flip_v → rotate → resize → tone → dither → blit
//!    │     text       measure → stamp → flip_h → flip_v → rotate → (masked) blit
//!    │     rectangle  clip → fill or outline
//!    │
//!    ├── final dither (optional)
//!    └── transformations, in list order
//! ```
//!
//! An image layer whose source cannot be loaded, or a text layer whose
//! footprint is too large to rasterize, is logged and skipped; the rest of
//! the composition still renders.
//!
//! ## Example
//!
//! ```
//! use tinta::compositor::{Compositor, RenderOptions};
//! use tinta::layer::{Composition, RectangleLayer};
//!
//! let mut comp = Composition::new(16, 8);
//! comp.add_rectangle_layer("box", 0, 0, RectangleLayer::new(8, 8)).unwrap();
//!
//! let packed = Compositor::default().render_binary(&comp, &RenderOptions::default());
//! assert_eq!(packed, vec![0x00, 0xFF].repeat(8));
//! ```

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{DynamicImage, ImageFormat};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::{BLACK, PixelBuffer, WHITE};
use crate::dither::{self, DEFAULT_THRESHOLD, DitherMode};
use crate::error::{Result, TintaError};
use crate::layer::{Composition, ImageLayer, Layer, LayerKind, RectangleLayer, TextLayer};
use crate::ops;
use crate::panel::{Frame, RefreshMode};
use crate::text::{SpleenText, TextRenderer};

/// Largest text scratch raster, in pixels, before a layer is skipped.
pub const MAX_TEXT_PIXELS: u64 = 1 << 26;

// ============================================================================
// OPTIONS
// ============================================================================

/// Whole-canvas transform applied after compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    #[serde(rename = "flip-h")]
    FlipH,
    #[serde(rename = "flip-v")]
    FlipV,
    /// Quarter turn counter-clockwise.
    #[serde(rename = "rotate-90")]
    Rotate90,
    #[serde(rename = "invert")]
    Invert,
}

impl Transform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::FlipH => "flip-h",
            Transform::FlipV => "flip-v",
            Transform::Rotate90 => "rotate-90",
            Transform::Invert => "invert",
        }
    }

    pub fn apply(&self, img: &PixelBuffer) -> PixelBuffer {
        match self {
            Transform::FlipH => ops::flip_horizontal(img),
            Transform::FlipV => ops::flip_vertical(img),
            Transform::Rotate90 => ops::rotate_ccw_90(img),
            Transform::Invert => ops::invert(img),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transform {
    type Err = TintaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "flip-h" => Ok(Transform::FlipH),
            "flip-v" => Ok(Transform::FlipV),
            "rotate-90" => Ok(Transform::Rotate90),
            "invert" => Ok(Transform::Invert),
            _ => Err(TintaError::UnsupportedMode(format!("transform '{}'", s))),
        }
    }
}

/// Canvas-level render settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Initial canvas fill.
    pub background_color: u8,
    /// Dither pass over the finished canvas.
    pub final_dither: DitherMode,
    /// Applied in order after the final dither.
    pub transformations: Vec<Transform>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background_color: WHITE,
            final_dither: DitherMode::None,
            transformations: Vec::new(),
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background(mut self, color: u8) -> Self {
        self.background_color = color;
        self
    }

    pub fn dither(mut self, mode: DitherMode) -> Self {
        self.final_dither = mode;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transformations.push(transform);
        self
    }
}

/// File format for [`Compositor::save`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 8-bit grayscale PNG of the canvas as rendered.
    #[default]
    Png,
    /// Bitmap re-thresholded to pure black and white.
    Bmp,
    /// Packed 1-bit buffer, the panel's native format.
    Binary,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Binary => "binary",
        }
    }

    /// Guess from a file extension; unknown extensions yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = TintaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "bmp" => Ok(OutputFormat::Bmp),
            "binary" | "bin" => Ok(OutputFormat::Binary),
            _ => Err(TintaError::UnsupportedMode(format!("output format '{}'", s))),
        }
    }
}

// ============================================================================
// COMPOSITOR
// ============================================================================

/// Renders compositions. Holds no per-render state, so one instance can
/// serve any number of compositions.
pub struct Compositor {
    text: Box<dyn TextRenderer>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::with_text_renderer(SpleenText::default())
    }
}

impl fmt::Debug for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor").finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text_renderer(renderer: impl TextRenderer + 'static) -> Self {
        Self {
            text: Box::new(renderer),
        }
    }

    /// Render to a grayscale canvas. The composition is left untouched.
    pub fn render(&self, composition: &Composition, options: &RenderOptions) -> PixelBuffer {
        let mut canvas = PixelBuffer::new(
            composition.width,
            composition.height,
            options.background_color,
        );

        for layer in composition.layers().iter().filter(|l| l.visible) {
            debug!("Rendering {} layer '{}'", layer.kind.type_name(), layer.id);
            match &layer.kind {
                LayerKind::Image(img) => {
                    if let Err(e) = self.render_image(&mut canvas, layer, img) {
                        warn!("Skipping image layer '{}': {}", layer.id, e);
                    }
                }
                LayerKind::Text(text) => {
                    if let Err(e) = self.render_text(&mut canvas, layer, text) {
                        warn!("Skipping text layer '{}': {}", layer.id, e);
                    }
                }
                LayerKind::Rectangle(rect) => render_rectangle(&mut canvas, layer, rect),
            }
        }

        if options.final_dither != DitherMode::None {
            canvas = options.final_dither.apply(&canvas);
        }
        for transform in &options.transformations {
            canvas = transform.apply(&canvas);
        }
        canvas
    }

    /// Render and pack to `ceil(width/8) * height` bytes.
    ///
    /// Without a final dither the canvas is quantized at 128 while packing.
    pub fn render_binary(&self, composition: &Composition, options: &RenderOptions) -> Vec<u8> {
        dither::pack(&self.render(composition, options))
    }

    /// Render, pack and wrap as a [`Frame`] for a display driver.
    ///
    /// The frame's dimensions are the canvas's after transformations.
    pub fn render_frame(
        &self,
        composition: &Composition,
        options: &RenderOptions,
        mode: RefreshMode,
    ) -> Result<Frame> {
        let canvas = self.render(composition, options);
        Frame::new(dither::pack(&canvas), canvas.width(), canvas.height(), mode)
    }

    /// Render and write to `path` in `format`.
    ///
    /// The file appears atomically: bytes go to a scratch sibling first,
    /// which is renamed into place.
    pub fn save(
        &self,
        composition: &Composition,
        path: impl AsRef<Path>,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> Result<()> {
        let canvas = self.render(composition, options);
        let bytes = encode(&canvas, format)?;
        write_atomic(path.as_ref(), &bytes)
    }

    fn render_image(
        &self,
        canvas: &mut PixelBuffer,
        layer: &Layer,
        img: &ImageLayer,
    ) -> Result<()> {
        let mut src = img.load_source()?;
        if img.flip_h {
            src = ops::flip_horizontal(&src);
        }
        if img.flip_v {
            src = ops::flip_vertical(&src);
        }
        src = img.rotate.apply(&src);

        let target = match (img.width, img.height) {
            (Some(w), Some(h)) => (w, h),
            _ => (
                remaining(canvas.width(), layer.x),
                remaining(canvas.height(), layer.y),
            ),
        };
        if src.dimensions() != target {
            src = ops::resize(
                &src,
                target.0,
                target.1,
                img.resize_mode,
                WHITE,
                img.crop_x,
                img.crop_y,
            );
        }

        if img.brightness != 1.0 || img.contrast != 0.0 {
            src = ops::adjust_brightness_contrast(&src, img.brightness, img.contrast);
        }
        src = img.dither_mode.apply(&src);

        canvas.blit(&src, layer.x, layer.y);
        Ok(())
    }

    fn render_text(
        &self,
        canvas: &mut PixelBuffer,
        layer: &Layer,
        text: &TextLayer,
    ) -> Result<()> {
        if text.text.is_empty() {
            return Ok(());
        }
        let too_large = || {
            TintaError::TooLarge(format!(
                "font_size {} with padding {}",
                text.font_size, text.padding
            ))
        };
        let (text_w, text_h) = self
            .text
            .measure(&text.text, text.font_size)
            .ok_or_else(too_large)?;
        if text_w == 0 || text_h == 0 {
            return Ok(());
        }
        let pad = if text.background { text.padding } else { 0 };
        let scratch_w = pad.checked_mul(2).and_then(|p| p.checked_add(text_w));
        let scratch_h = pad.checked_mul(2).and_then(|p| p.checked_add(text_h));
        let (Some(scratch_w), Some(scratch_h)) = (scratch_w, scratch_h) else {
            return Err(too_large());
        };
        if u64::from(scratch_w) * u64::from(scratch_h) > MAX_TEXT_PIXELS {
            return Err(too_large());
        }

        // Without a background the scratch ground is the opposite of the ink,
        // so strokes are exactly the pixels that differ from it.
        let (mut scratch, ground, origin) = if text.background {
            let scratch = PixelBuffer::new(scratch_w, scratch_h, WHITE);
            (scratch, WHITE, i32::try_from(pad).map_err(|_| too_large())?)
        } else {
            let ground = if text.color > DEFAULT_THRESHOLD { BLACK } else { WHITE };
            (PixelBuffer::new(text_w, text_h, ground), ground, 0)
        };

        self.text.stamp(
            &mut scratch,
            &text.text,
            origin,
            origin,
            text.font_size,
            text.color,
            false,
        );

        if text.flip_h {
            scratch = ops::flip_horizontal(&scratch);
        }
        if text.flip_v {
            scratch = ops::flip_vertical(&scratch);
        }
        scratch = text.rotate.apply(&scratch);

        if text.background {
            canvas.blit(&scratch, layer.x, layer.y);
        } else {
            canvas.blit_where(&scratch, layer.x, layer.y, |p| p != ground);
        }
        Ok(())
    }
}

/// Canvas space left from `origin` to the far edge.
fn remaining(extent: u32, origin: i32) -> u32 {
    (extent as i64 - origin as i64).max(0) as u32
}

fn render_rectangle(canvas: &mut PixelBuffer, layer: &Layer, rect: &RectangleLayer) {
    let Some((x1, y1, x2, y2)) = canvas.clip(layer.x, layer.y, rect.width, rect.height) else {
        return;
    };
    let (w, h) = (x2 - x1, y2 - y1);
    let (x1, y1) = (x1 as i32, y1 as i32);

    if rect.filled {
        canvas.fill_rect(x1, y1, w, h, rect.color);
    } else {
        canvas.fill_rect(x1, y1, w, 1, rect.color);
        canvas.fill_rect(x1, y2 as i32 - 1, w, 1, rect.color);
        canvas.fill_rect(x1, y1, 1, h, rect.color);
        canvas.fill_rect(x2 as i32 - 1, y1, 1, h, rect.color);
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Encode a canvas as file bytes in `format`.
pub fn encode(canvas: &PixelBuffer, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Png => encode_image(canvas, ImageFormat::Png),
        OutputFormat::Bmp => {
            let mono = dither::threshold(canvas, DEFAULT_THRESHOLD);
            encode_image(&mono, ImageFormat::Bmp)
        }
        OutputFormat::Binary => Ok(dither::pack(canvas)),
    }
}

fn encode_image(canvas: &PixelBuffer, format: ImageFormat) -> Result<Vec<u8>> {
    let img = DynamicImage::ImageLuma8(canvas.to_gray_image());
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|e| TintaError::Image(e.to_string()))?;
    Ok(bytes)
}

/// Write `bytes` to `path` via a uniquely named sibling and a rename.
/// The sibling is removed if anything fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let scratch = scratch_sibling(path);
    let result = fs::write(&scratch, bytes).and_then(|()| fs::rename(&scratch, path));
    if result.is_err() {
        let _ = fs::remove_file(&scratch);
    }
    Ok(result?)
}

fn scratch_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}
