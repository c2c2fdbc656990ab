//! # sixel_codec
//!
//! A 100% Rust codec between indexed images and DEC SIXEL graphics.
//!
//! ## Features
//!
//! - **Decoder**: streaming SIXEL state machine producing an indexed canvas
//!   plus the RGBA palette actually referenced by the stream
//! - **Encoder**: size-optimized SIXEL writer for indexed images (run merging,
//!   node ordering, repeat coalescing), delivering packets to any `io::Write`
//! - **RGBA front end**: quantizes true-color images with quantette before
//!   handing them to the indexed encoder
//!
//! ## Quick Start
//!
//! ### Encoding an indexed image
//!
//! ```rust
//! use sixel_codec::{sixel_encode_indexed_to_vec, EncodeOptions, IndexedImage};
//!
//! let palette = [255u8, 0, 0, 0, 0, 255]; // red, blue
//! let pixels = [0u8, 1, 1, 0];
//! let image = IndexedImage::new(&pixels, 2, 2, &palette)?;
//! let sixel = sixel_encode_indexed_to_vec(&image, &EncodeOptions::default())?;
//! assert!(sixel.starts_with(b"\x1bP0;0;0q"));
//! # Ok::<(), sixel_codec::SixelError>(())
//! ```
//!
//! ### Decoding SIXEL to an indexed image
//!
//! ```rust
//! use sixel_codec::sixel_decode;
//!
//! let image = sixel_decode(b"\x1bPq#1;2;100;0;0#1~~\x1b\\")?;
//! assert_eq!((image.width, image.height), (2, 6));
//! assert_eq!(image.color_count, 2);
//! assert_eq!(&image.palette[4..8], &[255, 0, 0, 255]);
//! # Ok::<(), sixel_codec::SixelError>(())
//! ```

use thiserror::Error;

mod canvas;
pub mod color;
mod control;
pub mod decoder;
pub mod encoder;
mod output;
pub mod params;
pub mod quantize;

pub use color::{default_palette, hls_to_rgb, rgb_from_percent, rgb_to_percent, Rgb};
pub use decoder::{sixel_decode, PixelAspectRatio, SixelImage};
pub use encoder::{sixel_encode_indexed, sixel_encode_indexed_to_vec, EncodeOptions, IndexedImage};
pub use quantize::sixel_encode;

/// Errors that can occur during SIXEL encoding or decoding.
///
/// Malformed SIXEL input is never reported here: the decoder normalizes it.
#[derive(Debug, Error)]
pub enum SixelError {
    /// A canvas or working buffer could not be allocated
    #[error("allocation failed for a {width}x{height} buffer")]
    AllocationFailed { width: usize, height: usize },

    /// The output sink rejected a packet
    #[error("output sink failed: {0}")]
    Sink(#[from] std::io::Error),

    /// Invalid image dimensions (width or height is zero or too large)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Buffer size doesn't match expected size for dimensions
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Palette is empty, not RGB triples, or larger than 256 entries
    #[error("invalid palette: {0}")]
    InvalidPalette(String),

    /// Color quantization failed
    #[error("quantization error: {0}")]
    Quantization(String),
}

/// Result type for SIXEL operations.
pub type Result<T> = core::result::Result<T, SixelError>;

pub(crate) const SIXEL_PALETTE_MAX: usize = 256;
pub(crate) const SIXEL_WIDTH_LIMIT: usize = 1000000;
pub(crate) const SIXEL_HEIGHT_LIMIT: usize = 1000000;
/// Pixels in a band between two Graphics Next Line commands.
pub(crate) const SIXEL_BAND_HEIGHT: usize = 6;
