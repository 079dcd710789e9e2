//! Decoding albedo files and encoding derived maps.
//!
//! PNG output goes through the deterministic writer in [`crate::png`]; JPEG,
//! TGA and BMP go through the `image` crate encoders.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::buffer::{ImageBuffer, PixelFormat};
use crate::error::{MapError, Result};
use crate::png::{write_image_to_writer, PngConfig};

/// Formats derived maps can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Tga,
    Bmp,
}

impl OutputFormat {
    /// Pick a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "tga" => Ok(Self::Tga),
            "bmp" => Ok(Self::Bmp),
            other => Err(MapError::UnsupportedFormat(format!(
                "unsupported image extension '{}'",
                other
            ))),
        }
    }

    /// Pick a format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            MapError::UnsupportedFormat(format!("'{}' has no extension", path.display()))
        })?;
        Self::from_extension(ext)
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Tga => ImageFormat::Tga,
            Self::Bmp => ImageFormat::Bmp,
        }
    }
}

/// Read and decode an image file.
///
/// The extension selects the decoder when it names a supported format (TGA
/// has no magic bytes); otherwise the format is guessed from the content.
/// Read failures are [`MapError::Io`]; undecodable content is
/// [`MapError::UnsupportedFormat`].
pub fn load_image(path: &Path) -> Result<ImageBuffer> {
    let bytes = std::fs::read(path).map_err(|e| MapError::io(path, e))?;
    let decoded = match OutputFormat::from_path(path) {
        Ok(format) => decode_image_as(&bytes, format),
        Err(_) => decode_image(&bytes),
    };
    decoded.map_err(|err| match err {
        MapError::UnsupportedFormat(msg) => {
            MapError::UnsupportedFormat(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Decode an in-memory PNG, JPEG or BMP file, guessing the format.
pub fn decode_image(bytes: &[u8]) -> Result<ImageBuffer> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| MapError::UnsupportedFormat(e.to_string()))?;
    from_dynamic(img)
}

/// Decode an in-memory file of a known format.
pub fn decode_image_as(bytes: &[u8], format: OutputFormat) -> Result<ImageBuffer> {
    let img = image::load_from_memory_with_format(bytes, format.image_format())
        .map_err(|e| MapError::UnsupportedFormat(e.to_string()))?;
    from_dynamic(img)
}

fn from_dynamic(img: DynamicImage) -> Result<ImageBuffer> {
    let (width, height) = (img.width(), img.height());
    let color = img.color();
    if color.has_alpha() {
        ImageBuffer::new(width, height, PixelFormat::Rgba8, img.into_rgba8().into_raw())
    } else if color.has_color() {
        ImageBuffer::new(width, height, PixelFormat::Rgb8, img.into_rgb8().into_raw())
    } else {
        ImageBuffer::new(width, height, PixelFormat::Luma8, img.into_luma8().into_raw())
    }
}

/// Encode an image in the given format.
pub fn encode_image(image: &ImageBuffer, format: OutputFormat, png: &PngConfig) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if format == OutputFormat::Png {
        write_image_to_writer(image, &mut bytes, png)?;
        return Ok(bytes);
    }

    let dynamic = to_dynamic(image)?;
    // JPEG has no alpha channel
    let dynamic = match (format, dynamic) {
        (OutputFormat::Jpeg, DynamicImage::ImageRgba8(rgba)) => {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).into_rgb8())
        }
        (_, other) => other,
    };
    dynamic
        .write_to(&mut Cursor::new(&mut bytes), format.image_format())
        .map_err(|e| MapError::UnsupportedFormat(e.to_string()))?;
    Ok(bytes)
}

fn to_dynamic(image: &ImageBuffer) -> Result<DynamicImage> {
    let (width, height) = image.dimensions();
    let data = image.as_bytes().to_vec();
    let invalid = || MapError::InvalidDimensions(format!("{}x{}", width, height));
    let dynamic = match image.format() {
        PixelFormat::Luma8 => {
            image::GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
        }
        PixelFormat::Rgb8 => {
            image::RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        }
        PixelFormat::Rgba8 => {
            image::RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
        }
    };
    dynamic.ok_or_else(invalid)
}
