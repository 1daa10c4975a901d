//! # Error Types
//!
//! This module defines the error type used throughout the tinta library.
//!
//! Geometry and enum errors are programmer errors and surface immediately.
//! Image-layer source failures and oversized text are recovered: the
//! compositor logs them and skips the layer (see [`crate::compositor`]).

use thiserror::Error;

/// Main error type for tinta operations
#[derive(Debug, Error)]
pub enum TintaError {
    /// Pixel or geometry access outside a buffer
    #[error("Coordinates ({x}, {y}) out of bounds for {width}x{height} buffer")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    /// A layer id is already present in the composition
    #[error("Duplicate layer id: {0}")]
    DuplicateId(String),

    /// No layer with the given id exists
    #[error("Unknown layer id: {0}")]
    UnknownId(String),

    /// Unknown resize, dither, transform, rotation or format value
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    /// An image layer's file or bitmap is missing or undecodable
    #[error("Failed to load image source: {0}")]
    SourceLoad(String),

    /// A layer's raster footprint is too large to allocate
    #[error("Layer too large: {0}")]
    TooLarge(String),

    /// A packed buffer's length disagrees with its declared dimensions
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A layer patch names a protected field or carries a bad value
    #[error("Invalid layer patch: {0}")]
    InvalidPatch(String),

    /// Template document could not be loaded or interpreted
    #[error("Template error: {0}")]
    Template(String),

    /// QR symbol generation failed
    #[error("QR code error: {0}")]
    QrCode(String),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Display driver reported a failure
    #[error("Display error: {0}")]
    Display(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, TintaError>;
