//! Decoded 8-bit pixel buffers.
//!
//! [`ImageBuffer`] is the currency between the codec collaborator and every
//! pipeline stage. It is immutable once constructed; stages take it by
//! reference and produce new buffers or fields.

use crate::color::Color;
use crate::error::{try_filled, MapError, Result};

/// Pixel layout of an [`ImageBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Single-channel 8-bit luminance.
    Luma8,
    /// 3-channel 8-bit color.
    Rgb8,
    /// 4-channel 8-bit color with alpha.
    Rgba8,
}

impl PixelFormat {
    /// Number of bytes per pixel.
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// An immutable W x H grid of 8-bit pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Wrap raw pixel bytes.
    ///
    /// Fails with `InvalidDimensions` when either side is zero or the byte
    /// count is not `width * height * channels`.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MapError::InvalidDimensions(format!(
                "image must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.channels()))
            .ok_or_else(|| {
                MapError::InvalidDimensions(format!("{}x{} overflows", width, height))
            })?;
        if data.len() != expected {
            return Err(MapError::InvalidDimensions(format!(
                "expected {} bytes for {}x{} {:?}, got {}",
                expected,
                width,
                height,
                format,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Build a buffer by evaluating `f` for every pixel (RGBA8 output).
    pub fn from_fn_rgba(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> [u8; 4],
    ) -> Result<Self> {
        let len = (width as usize).saturating_mul(height as usize).saturating_mul(4);
        let mut data = try_filled(len, 0u8)?;
        let coords = (0..height).flat_map(|y| (0..width).map(move |x| (x, y)));
        for (texel, (x, y)) in data.chunks_exact_mut(4).zip(coords) {
            texel.copy_from_slice(&f(x, y));
        }
        Self::new(width, height, PixelFormat::Rgba8, data)
    }

    /// A buffer where every pixel has the same RGBA value.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        Self::from_fn_rgba(width, height, |_, _| rgba)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw bytes in row-major order.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at (x, y) widened to RGBA8. Luminance is replicated into RGB;
    /// missing alpha reads as opaque.
    #[inline]
    pub fn rgba8(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * self.format.channels();
        let p = &self.data[idx..idx + self.format.channels()];
        match self.format {
            PixelFormat::Luma8 => [p[0], p[0], p[0], 255],
            PixelFormat::Rgb8 => [p[0], p[1], p[2], 255],
            PixelFormat::Rgba8 => [p[0], p[1], p[2], p[3]],
        }
    }

    /// Pixel at (x, y) with clamp-to-edge addressing.
    #[inline]
    pub fn rgba8_clamped(&self, x: i64, y: i64) -> [u8; 4] {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.rgba8(cx, cy)
    }

    /// Pixel at (x, y) as a floating-point color.
    #[inline]
    pub fn color(&self, x: u32, y: u32) -> Color {
        Color::from_rgba8(self.rgba8(x, y))
    }

    /// Single-channel value at (x, y) in [0, 1].
    ///
    /// Grayscale buffers return their stored value; color buffers return
    /// Rec. 709 luminance.
    #[inline]
    pub fn value(&self, x: u32, y: u32) -> f64 {
        match self.format {
            PixelFormat::Luma8 => {
                let idx = y as usize * self.width as usize + x as usize;
                self.data[idx] as f64 / 255.0
            }
            _ => self.color(x, y).luminance(),
        }
    }
}
