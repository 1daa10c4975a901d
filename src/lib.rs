//! # Tinta - Layered Compositing for E-Paper Panels
//!
//! Tinta renders stacks of declarative layers (images, text, rectangles)
//! onto a monochrome canvas and packs the result into the 1-bit format small
//! e-paper panels consume. It provides:
//!
//! - **Compositing**: ordered layers with per-layer transforms and blending
//! - **Dithering**: Floyd-Steinberg error diffusion and flat thresholding
//! - **Bit packing**: MSB-first, row-aligned frames for the display driver
//! - **Templates**: JSON layouts with live IP-address and QR-code slots
//!
//! ## Quick Start
//!
//! ```
//! use tinta::{
//!     compositor::{Compositor, RenderOptions},
//!     layer::{Composition, RectangleLayer, TextLayer},
//!     panel::PanelConfig,
//! };
//!
//! let mut comp = Composition::for_panel(&PanelConfig::EPD128X250);
//! comp.add_rectangle_layer("bg", 0, 0, RectangleLayer::new(128, 250).color(255))?;
//! comp.add_text_layer("hello", 20, 120, TextLayer::new("HELLO"))?;
//!
//! let packed = Compositor::default().render_binary(&comp, &RenderOptions::default());
//! assert_eq!(packed.len(), 4000);
//!
//! # Ok::<(), tinta::TintaError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`buffer`] | Grayscale pixel buffer |
//! | [`ops`] | Resize, flip, rotate, crop, tone |
//! | [`dither`] | Dithering and bit packing |
//! | [`text`] | Text renderer contract and Spleen bitmap fonts |
//! | [`layer`] | Layer types and compositions |
//! | [`compositor`] | Rendering, output formats, saving |
//! | [`template`] | Placeholder templates and QR generation |
//! | [`panel`] | Panel profiles, frames, display driver contract |
//! | [`error`] | Error types |

pub mod buffer;
pub mod compositor;
pub mod dither;
pub mod error;
pub mod layer;
pub mod ops;
pub mod panel;
pub mod template;
pub mod text;

// Re-exports for convenience
pub use buffer::PixelBuffer;
pub use compositor::{Compositor, OutputFormat, RenderOptions, Transform};
pub use dither::DitherMode;
pub use error::{Result, TintaError};
pub use layer::{Composition, ImageLayer, Layer, LayerKind, RectangleLayer, TextLayer};
pub use ops::{ResizeMode, Rotation};
pub use panel::{DisplayDriver, Frame, PanelConfig, RefreshMode};
pub use template::{Substitutions, TemplateRenderer};
