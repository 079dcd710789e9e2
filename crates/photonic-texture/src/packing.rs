//! Channel packing of source maps into 4-channel textures.
//!
//! The terrain layout packs four maps into two RGBA textures:
//!
//! | Texture   | R        | G        | B        | A         |
//! |-----------|----------|----------|----------|-----------|
//! | albedo_h  | Albedo.R | Albedo.G | Albedo.B | Height    |
//! | normal_r  | Normal.X | Normal.Y | Normal.Z | Roughness |
//!
//! # Example
//!
//! ```no_run
//! use photonic_texture::buffer::ImageBuffer;
//! use photonic_texture::packing::{ChannelSource, ColorComponent, PackedChannels, pack_channels};
//! use photonic_texture::parallel::WorkerPool;
//!
//! # fn demo(albedo: &ImageBuffer, height: &ImageBuffer) -> photonic_texture::Result<()> {
//! let packed = PackedChannels {
//!     r: ChannelSource::new(albedo, ColorComponent::R),
//!     g: ChannelSource::new(albedo, ColorComponent::G),
//!     b: ChannelSource::new(albedo, ColorComponent::B),
//!     a: ChannelSource::new(height, ColorComponent::Luminance),
//! };
//! let rgba = pack_channels(&WorkerPool::new(0)?, &packed)?;
//! # Ok(())
//! # }
//! ```

use crate::buffer::{ImageBuffer, PixelFormat};
use crate::error::{try_filled, MapError, Result};
use crate::parallel::WorkerPool;

/// Color component to extract from a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorComponent {
    /// Red channel
    R,
    /// Green channel
    G,
    /// Blue channel
    B,
    /// Alpha channel
    A,
    /// Stored value for grayscale sources, Rec. 709 luminance for color
    #[default]
    Luminance,
}

/// One packed channel: a component of a source image.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSource<'a> {
    pub image: &'a ImageBuffer,
    pub component: ColorComponent,
}

impl<'a> ChannelSource<'a> {
    pub fn new(image: &'a ImageBuffer, component: ColorComponent) -> Self {
        Self { image, component }
    }
}

/// Sources for the four output channels.
#[derive(Debug, Clone, Copy)]
pub struct PackedChannels<'a> {
    pub r: ChannelSource<'a>,
    pub g: ChannelSource<'a>,
    pub b: ChannelSource<'a>,
    pub a: ChannelSource<'a>,
}

impl<'a> PackedChannels<'a> {
    fn sources(&self) -> [ChannelSource<'a>; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Extract a single 8-bit channel value at the given coordinates.
pub fn extract_channel(image: &ImageBuffer, x: u32, y: u32, component: ColorComponent) -> u8 {
    let rgba = image.rgba8(x, y);
    match component {
        ColorComponent::R => rgba[0],
        ColorComponent::G => rgba[1],
        ColorComponent::B => rgba[2],
        ColorComponent::A => rgba[3],
        ColorComponent::Luminance => match image.format() {
            PixelFormat::Luma8 => rgba[0],
            _ => (image.value(x, y).clamp(0.0, 1.0) * 255.0).round() as u8,
        },
    }
}

/// Pack four channel sources into one RGBA8 image.
///
/// Every source must have the same dimensions; otherwise fails with
/// [`MapError::DimensionMismatch`].
pub fn pack_channels(pool: &WorkerPool, packed: &PackedChannels<'_>) -> Result<ImageBuffer> {
    let sources = packed.sources();
    let (width, height) = sources[0].image.dimensions();
    for source in &sources[1..] {
        if source.image.dimensions() != (width, height) {
            let (w, h) = source.image.dimensions();
            return Err(MapError::DimensionMismatch(format!(
                "expected {}x{}, got {}x{}",
                width, height, w, h
            )));
        }
    }

    let pixels = pool.map_pixels(width, height, |x, y| {
        sources.map(|s| extract_channel(s.image, x, y, s.component))
    })?;
    let mut data = try_filled(pixels.len() * 4, 0u8)?;
    for (texel, pixel) in data.chunks_exact_mut(4).zip(&pixels) {
        texel.copy_from_slice(pixel);
    }
    ImageBuffer::new(width, height, PixelFormat::Rgba8, data)
}

/// The four maps packed for the terrain renderer.
#[derive(Debug, Clone, Copy)]
pub struct TerrainMaps<'a> {
    pub albedo: &'a ImageBuffer,
    pub height: &'a ImageBuffer,
    pub normal: &'a ImageBuffer,
    pub roughness: &'a ImageBuffer,
}

impl<'a> TerrainMaps<'a> {
    /// Fail with [`MapError::DimensionMismatch`] unless all four maps share
    /// the albedo's dimensions.
    pub fn validate(&self) -> Result<()> {
        let expected = self.albedo.dimensions();
        for (name, map) in [
            ("height", self.height),
            ("normal", self.normal),
            ("roughness", self.roughness),
        ] {
            if map.dimensions() != expected {
                return Err(MapError::DimensionMismatch(format!(
                    "{} map is {}x{} but albedo is {}x{}",
                    name,
                    map.width(),
                    map.height(),
                    expected.0,
                    expected.1
                )));
            }
        }
        Ok(())
    }

    /// Channel layout of the `albedo_h` texture.
    pub fn albedo_height(&self) -> PackedChannels<'a> {
        PackedChannels {
            r: ChannelSource::new(self.albedo, ColorComponent::R),
            g: ChannelSource::new(self.albedo, ColorComponent::G),
            b: ChannelSource::new(self.albedo, ColorComponent::B),
            a: ChannelSource::new(self.height, ColorComponent::Luminance),
        }
    }

    /// Channel layout of the `normal_r` texture.
    pub fn normal_roughness(&self) -> PackedChannels<'a> {
        PackedChannels {
            r: ChannelSource::new(self.normal, ColorComponent::R),
            g: ChannelSource::new(self.normal, ColorComponent::G),
            b: ChannelSource::new(self.normal, ColorComponent::B),
            a: ChannelSource::new(self.roughness, ColorComponent::Luminance),
        }
    }

    /// Pack into the `(albedo_h, normal_r)` pair.
    pub fn pack(&self, pool: &WorkerPool) -> Result<(ImageBuffer, ImageBuffer)> {
        self.validate()?;
        let a = pack_channels(pool, &self.albedo_height())?;
        let b = pack_channels(pool, &self.normal_roughness())?;
        Ok((a, b))
    }
}

/// Extend `image` to multiples of 4 in both dimensions by replicating edge
/// pixels. Returns RGBA8.
pub fn pad_to_blocks(image: &ImageBuffer) -> Result<ImageBuffer> {
    let (width, height) = image.dimensions();
    let padded_w = width.div_ceil(4) * 4;
    let padded_h = height.div_ceil(4) * 4;
    ImageBuffer::from_fn_rgba(padded_w, padded_h, |x, y| {
        image.rgba8_clamped(x as i64, y as i64)
    })
}
