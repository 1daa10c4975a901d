//! # Template Rendering
//!
//! A template is a composition document whose layers may be placeholders,
//! filled in with live values at render time:
//!
//! | `placeholder_type` | Layer | Substitution |
//! |--------------------|-------|--------------|
//! | `ip` | text | text replaced by [`Substitutions::ip_address`] |
//! | `qr` | image | source replaced by a QR code of [`Substitutions::qr_data`] |
//!
//! Every other layer passes through unchanged, except that relative image
//! paths are resolved against the template's directory. Invisible layers are
//! dropped.
//!
//! ## Scratch Files
//!
//! QR bitmaps stay in memory by default. With
//! [`TemplateRenderer::with_scratch_dir`] they are written out as PNG files
//! instead; each file is owned by the [`ScratchFiles`] guard inside the
//! [`RenderedTemplate`] and removed when it drops, whether rendering
//! succeeded or not.
//!
//! ## Example
//!
//! ```
//! use tinta::template::{Substitutions, TemplateRenderer};
//!
//! let json = r#"{
//!     "width": 250, "height": 128,
//!     "layers": [
//!         {"id": "ip", "type": "text", "text": "0.0.0.0", "placeholder_type": "ip"},
//!         {"id": "qr", "type": "image", "x": 170, "y": 40, "placeholder_type": "qr"}
//!     ]
//! }"#;
//!
//! let renderer = TemplateRenderer::from_json(json, ".").unwrap();
//! let rendered = renderer
//!     .render(&Substitutions::new("10.0.0.7", "https://example.com"))
//!     .unwrap();
//! assert_eq!(rendered.composition().len(), 2);
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use qrcode::{EcLevel, QrCode};
use uuid::Uuid;

use crate::buffer::{BLACK, PixelBuffer, WHITE};
use crate::compositor::{self, Compositor, OutputFormat, RenderOptions, Transform};
use crate::dither::DitherMode;
use crate::error::{Result, TintaError};
use crate::layer::{
    Composition, DEFAULT_QR_SIZE, ErrorCorrection, ImageLayer, LayerKind, PlaceholderType,
};
use crate::ops::ResizeMode;
use crate::panel::{DisplayDriver, PanelConfig, RefreshMode};

/// Transforms from template orientation to panel orientation.
pub const PANEL_TRANSFORMS: [Transform; 2] = [Transform::FlipV, Transform::Rotate90];

// ============================================================================
// QR GENERATION
// ============================================================================

/// Produces a QR code bitmap of exactly the requested size.
pub trait QrGenerator {
    fn generate(
        &self,
        data: &str,
        width: u32,
        height: u32,
        level: ErrorCorrection,
    ) -> Result<PixelBuffer>;
}

/// [`QrGenerator`] backed by the `qrcode` crate.
///
/// The symbol gets a quiet zone of `border` modules and is scaled
/// nearest-neighbour to the target size, so the output is strictly binary.
#[derive(Debug, Clone, Copy)]
pub struct QrCodeGenerator {
    pub border: u32,
}

impl Default for QrCodeGenerator {
    fn default() -> Self {
        Self { border: 1 }
    }
}

impl QrGenerator for QrCodeGenerator {
    fn generate(
        &self,
        data: &str,
        width: u32,
        height: u32,
        level: ErrorCorrection,
    ) -> Result<PixelBuffer> {
        let ec_level = match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        };
        let code = QrCode::with_error_correction_level(data, ec_level)
            .map_err(|e| TintaError::QrCode(format!("QR code generation failed: {}", e)))?;

        let modules = code.width() as u32;
        let span = modules + 2 * self.border;
        debug!(
            "QR code: {} modules, EC {}, scaled to {}x{}",
            modules, level, width, height
        );

        let mut img = PixelBuffer::new(width, height, WHITE);
        for y in 0..height {
            let my = (y as u64 * span as u64 / height as u64) as u32;
            for x in 0..width {
                let mx = (x as u64 * span as u64 / width as u64) as u32;
                let inside = (self.border..self.border + modules).contains(&mx)
                    && (self.border..self.border + modules).contains(&my);
                if inside {
                    let (qx, qy) = ((mx - self.border) as usize, (my - self.border) as usize);
                    if code[(qx, qy)] == qrcode::Color::Dark {
                        img.put(x, y, BLACK);
                    }
                }
            }
        }
        Ok(img)
    }
}

// ============================================================================
// SCRATCH FILES
// ============================================================================

/// Owns temporary files and deletes them on drop.
#[derive(Debug, Default)]
pub struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `path`; it is removed on cleanup.
    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every tracked file. Files already gone are ignored.
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ============================================================================
// RENDERER
// ============================================================================

/// Live values substituted into placeholder layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pub ip_address: String,
    pub qr_data: String,
}

impl Substitutions {
    pub fn new(ip_address: impl Into<String>, qr_data: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            qr_data: qr_data.into(),
        }
    }
}

/// A template with its placeholders filled in.
///
/// Holds the scratch files backing the composition, if any; they live as
/// long as this value.
#[derive(Debug)]
pub struct RenderedTemplate {
    composition: Composition,
    scratch: ScratchFiles,
}

impl RenderedTemplate {
    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn scratch_files(&self) -> &[PathBuf] {
        self.scratch.paths()
    }

    /// Release scratch files now rather than at drop.
    pub fn cleanup(mut self) {
        self.scratch.cleanup();
    }
}

/// Turns a template document into concrete compositions.
pub struct TemplateRenderer {
    template: Composition,
    base_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
    compositor: Compositor,
    qr: Box<dyn QrGenerator>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("template", &self.template)
            .field("base_dir", &self.base_dir)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl TemplateRenderer {
    /// Load a template file. Relative image paths resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            TintaError::Template(format!("failed to load template {}: {}", path.display(), e))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let renderer = Self::from_json(&json, base_dir)?;
        info!(
            "Loaded template {} ({} layers)",
            path.display(),
            renderer.template.len()
        );
        Ok(renderer)
    }

    /// Parse a template document; relative image paths resolve against `base_dir`.
    pub fn from_json(json: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let template = Composition::from_json(json).map_err(|e| match e {
            TintaError::Json(e) => TintaError::Template(e.to_string()),
            other => other,
        })?;
        Ok(Self {
            template,
            base_dir: base_dir.into(),
            scratch_dir: None,
            compositor: Compositor::default(),
            qr: Box::new(QrCodeGenerator::default()),
        })
    }

    /// Spill generated QR bitmaps to PNG files under `dir`.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_qr_generator(mut self, qr: impl QrGenerator + 'static) -> Self {
        self.qr = Box::new(qr);
        self
    }

    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    /// The parsed template, placeholders unfilled.
    pub fn template(&self) -> &Composition {
        &self.template
    }

    /// Fill placeholders and build the composition.
    ///
    /// Any scratch files written before a failure are removed before the
    /// error is returned.
    pub fn render(&self, subs: &Substitutions) -> Result<RenderedTemplate> {
        let mut composition = Composition::new(self.template.width, self.template.height);
        let mut scratch = ScratchFiles::new();

        for layer in self.template.layers().iter().filter(|l| l.visible) {
            let mut layer = layer.clone();
            match &mut layer.kind {
                LayerKind::Text(text) if text.placeholder_type == PlaceholderType::Ip => {
                    text.text = subs.ip_address.clone();
                }
                LayerKind::Image(img) if img.placeholder_type == PlaceholderType::Qr => {
                    self.fill_qr(img, &subs.qr_data, &mut scratch)?;
                }
                LayerKind::Image(img) => {
                    if let Some(ref path) = img.image_path {
                        img.image_path = Some(self.resolve(path));
                    }
                }
                _ => {}
            }
            composition.add_layer(layer)?;
        }

        info!(
            "Rendered template: {}x{}, {} layers",
            composition.width,
            composition.height,
            composition.len()
        );
        Ok(RenderedTemplate {
            composition,
            scratch,
        })
    }

    /// Render and write the result to `path`. Scratch files are released
    /// on every path out.
    pub fn render_and_save(
        &self,
        subs: &Substitutions,
        path: impl AsRef<Path>,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        let rendered = self.render(subs)?;
        self.compositor
            .save(rendered.composition(), path, format, options)?;
        rendered.cleanup();
        info!("Saved rendered template to {}", path.display());
        Ok(())
    }

    /// Render, turn into panel orientation and hand the frame to `driver`.
    ///
    /// The template is laid out sideways relative to the panel:
    /// [`PANEL_TRANSFORMS`] flip it vertically and turn it a quarter
    /// counter-clockwise, so a `250x128` template fills an `EPD128x250`.
    pub fn render_and_display(
        &self,
        subs: &Substitutions,
        driver: &mut dyn DisplayDriver,
        panel: &PanelConfig,
        mode: RefreshMode,
    ) -> Result<()> {
        let (width, height) = (self.template.width, self.template.height);
        if (width, height) != panel.landscape() {
            let (lw, lh) = panel.landscape();
            return Err(TintaError::Display(format!(
                "template is {}x{}, panel {} takes {}x{} before turning",
                width, height, panel.name, lw, lh
            )));
        }
        let rendered = self.render(subs)?;
        let options = RenderOptions {
            transformations: PANEL_TRANSFORMS.to_vec(),
            ..RenderOptions::default()
        };
        let frame = self
            .compositor
            .render_frame(rendered.composition(), &options, mode)?;
        frame.check_panel(panel)?;
        driver.display(&frame)?;
        rendered.cleanup();
        info!("Displayed template on {} ({} refresh)", panel, mode);
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path.strip_prefix("./").unwrap_or(path))
        }
    }

    fn fill_qr(&self, img: &mut ImageLayer, data: &str, scratch: &mut ScratchFiles) -> Result<()> {
        let width = img.width.unwrap_or(DEFAULT_QR_SIZE);
        let height = img.height.unwrap_or(DEFAULT_QR_SIZE);
        let level = img.error_correction.unwrap_or_default();
        let bitmap = self.qr.generate(data, width, height, level)?;

        img.width = Some(width);
        img.height = Some(height);
        img.resize_mode = ResizeMode::Stretch;
        img.dither_mode = DitherMode::None;

        match self.scratch_dir {
            Some(ref dir) => {
                let path = dir.join(format!("tinta-qr-{}.png", Uuid::new_v4()));
                let png = compositor::encode(&bitmap, OutputFormat::Png)?;
                compositor::write_atomic(&path, &png)?;
                scratch.track(path.clone());
                img.image_path = Some(path);
                img.image_data = None;
            }
            None => {
                img.image_data = Some(bitmap);
            }
        }
        Ok(())
    }
}
