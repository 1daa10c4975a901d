//! # Panel Configuration and Display Hand-off
//!
//! Hardware profiles for the supported e-paper panels, the refresh mode
//! passed through to the driver, and the packed [`Frame`] that crosses the
//! boundary to a [`DisplayDriver`].
//!
//! ## Supported Panels
//!
//! | Profile | Width | Height | Row bytes | Frame bytes |
//! |---------|-------|--------|-----------|-------------|
//! | EPD128x250 | 128 | 250 | 16 | 4000 |
//! | EPD240x416 | 240 | 416 | 30 | 12480 |
//!
//! ## Usage
//!
//! ```
//! use tinta::panel::PanelConfig;
//!
//! let panel = PanelConfig::EPD128X250;
//! assert_eq!(panel.packed_len(), 4000);
//! ```

use std::fmt;
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};

use crate::dither::{packed_len, row_bytes};
use crate::error::{Result, TintaError};

/// Environment variable naming the panel profile.
pub const PANEL_ENV: &str = "TINTA_PANEL";

/// # Panel Configuration
///
/// Native dimensions of an e-paper panel. `width_bytes` is the packed row
/// stride (`ceil(width / 8)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Profile name
    pub name: &'static str,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Bytes per packed row
    pub width_bytes: u32,
}

impl PanelConfig {
    /// 2.13" panel, 128x250.
    pub const EPD128X250: Self = Self {
        name: "EPD128x250",
        width: 128,
        height: 250,
        width_bytes: 16,
    };

    /// 3.7" panel, 240x416.
    pub const EPD240X416: Self = Self {
        name: "EPD240x416",
        width: 240,
        height: 416,
        width_bytes: 30,
    };

    pub const ALL: [Self; 2] = [Self::EPD128X250, Self::EPD240X416];

    /// Look up a profile by name (`"epd128x250"`) or size (`"128x250"`),
    /// case-insensitively.
    pub fn parse(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        let wanted = wanted.strip_prefix("epd").unwrap_or(&wanted);
        Self::ALL
            .into_iter()
            .find(|p| format!("{}x{}", p.width, p.height) == wanted)
            .ok_or_else(|| TintaError::UnsupportedMode(format!("panel '{}'", s)))
    }

    /// Profile named by `TINTA_PANEL`, falling back to [`Self::EPD128X250`].
    pub fn from_env() -> Self {
        match std::env::var(PANEL_ENV) {
            Ok(name) => match Self::parse(&name) {
                Ok(panel) => {
                    info!("Using panel {} from {}", panel.name, PANEL_ENV);
                    panel
                }
                Err(_) => {
                    info!("Unknown {}='{}', using {}", PANEL_ENV, name, Self::EPD128X250.name);
                    Self::EPD128X250
                }
            },
            Err(_) => Self::EPD128X250,
        }
    }

    /// Packed frame size in bytes.
    #[inline]
    pub fn packed_len(&self) -> usize {
        packed_len(self.width, self.height)
    }

    /// The panel turned a quarter: width and height swapped.
    pub fn landscape(&self) -> (u32, u32) {
        (self.height, self.width)
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self::EPD128X250
    }
}

impl fmt::Display for PanelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

// ============================================================================
// REFRESH MODE
// ============================================================================

/// Panel refresh mode. Opaque to the renderer; passed through to the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    #[default]
    Full,
    Partial,
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::Full => "full",
            RefreshMode::Partial => "partial",
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshMode {
    type Err = TintaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" => Ok(RefreshMode::Full),
            "partial" => Ok(RefreshMode::Partial),
            _ => Err(TintaError::UnsupportedMode(format!("refresh mode '{}'", s))),
        }
    }
}

// ============================================================================
// FRAME
// ============================================================================

/// Packed 1-bit frame ready for a display driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    mode: RefreshMode,
}

impl Frame {
    /// Wrap packed bytes, checking `data.len() == ceil(width / 8) * height`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, mode: RefreshMode) -> Result<Self> {
        let expected = row_bytes(width) * height as usize;
        if data.len() != expected {
            return Err(TintaError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            mode,
        })
    }

    /// Like [`Frame::new`], also requiring the panel's native dimensions.
    pub fn for_panel(data: Vec<u8>, panel: &PanelConfig, mode: RefreshMode) -> Result<Self> {
        Self::new(data, panel.width, panel.height, mode)
    }

    /// Check this frame fits `panel` exactly.
    pub fn check_panel(&self, panel: &PanelConfig) -> Result<()> {
        if (self.width, self.height) != (panel.width, panel.height) {
            return Err(TintaError::Display(format!(
                "frame is {}x{}, panel {} needs {}x{}",
                self.width, self.height, panel.name, panel.width, panel.height
            )));
        }
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }
}

/// Collaborator that moves a frame onto physical hardware.
///
/// Failures are propagated to the caller unchanged; nothing here retries.
pub trait DisplayDriver {
    fn display(&mut self, frame: &Frame) -> Result<()>;
}
