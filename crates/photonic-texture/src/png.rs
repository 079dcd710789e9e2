//! Deterministic PNG writer.
//!
//! Uses fixed compression settings so the same map always encodes to the
//! same bytes, and therefore the same BLAKE3 hash.

use std::io::Write;

use png::{BitDepth, ColorType, Compression, Encoder, FilterType};
use thiserror::Error;

use crate::buffer::{ImageBuffer, PixelFormat};

/// Errors from writing a map as PNG.
#[derive(Debug, Error)]
pub enum PngError {
    #[error("PNG write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Encoding(#[from] png::EncodingError),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
}

/// Encoder settings. Every preset is fixed, so output bytes are stable.
#[derive(Debug, Clone)]
pub struct PngConfig {
    /// zlib compression level.
    pub compression: Compression,
    /// Row filter applied to every scanline.
    pub filter: FilterType,
}

impl Default for PngConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Default,
            // Adaptive filtering picks per row; a fixed filter keeps output stable
            filter: FilterType::NoFilter,
        }
    }
}

impl PngConfig {
    /// Smallest files.
    pub fn best_compression() -> Self {
        Self {
            compression: Compression::Best,
            filter: FilterType::Paeth,
        }
    }

    /// Fastest encode, largest files.
    pub fn fast() -> Self {
        Self {
            compression: Compression::Fast,
            filter: FilterType::NoFilter,
        }
    }
}

fn color_type(format: PixelFormat) -> ColorType {
    match format {
        PixelFormat::Luma8 => ColorType::Grayscale,
        PixelFormat::Rgb8 => ColorType::Rgb,
        PixelFormat::Rgba8 => ColorType::Rgba,
    }
}

/// Write an image buffer to any writer, keeping its channel layout.
pub fn write_image_to_writer<W: Write>(
    image: &ImageBuffer,
    writer: W,
    config: &PngConfig,
) -> Result<(), PngError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PngError::InvalidDimensions(format!(
            "{}x{}",
            width, height
        )));
    }

    let mut encoder = Encoder::new(writer, width, height);
    encoder.set_color(color_type(image.format()));
    encoder.set_depth(BitDepth::Eight);
    encoder.set_compression(config.compression);
    encoder.set_filter(config.filter);

    // The png crate writes no timestamps or other variable metadata
    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(image.as_bytes())?;

    Ok(())
}

/// BLAKE3 hex digest of file contents.
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
