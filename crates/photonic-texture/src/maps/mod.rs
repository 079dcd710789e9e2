//! Derived PBR map generators and the fields they produce.
//!
//! Each module generates a specific type of map from the albedo or from a
//! previously derived field.

mod height;
mod normal;
mod roughness;

pub use height::{HeightGenerator, HEIGHT_DETAIL_WEIGHTS};
pub use normal::{NormalGenerator, DEFAULT_NORMAL_STRENGTH};
pub use roughness::{RoughnessGenerator, DIFFUSE_BASELINE_ROUGHNESS};

use crate::buffer::{ImageBuffer, PixelFormat};
use crate::error::{try_filled, MapError, Result};

/// Single-channel floating-point field (height, roughness, filter
/// intermediates).
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Values in row-major order.
    pub data: Vec<f64>,
}

impl ScalarField {
    /// Create a new field filled with a value.
    pub fn new(width: u32, height: u32, fill: f64) -> Result<Self> {
        let data = try_filled(width as usize * height as usize, fill)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wrap existing values. Fails when the length does not match.
    pub fn from_vec(width: u32, height: u32, data: Vec<f64>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(MapError::InvalidDimensions(format!(
                "expected {} values for {}x{}, got {}",
                width as usize * height as usize,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Get a value at the given coordinates.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Set a value at the given coordinates.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f64) {
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = value;
    }

    /// Get a value with clamp-to-edge coordinates.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> f64 {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Convert to 8-bit bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    /// Convert to an 8-bit grayscale image buffer.
    pub fn to_image(&self) -> Result<ImageBuffer> {
        ImageBuffer::new(self.width, self.height, PixelFormat::Luma8, self.to_bytes())
    }
}

/// Field of unit tangent-space normals with z > 0.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalField {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Unit vectors (x, y, z) in row-major order.
    pub data: Vec<[f64; 3]>,
}

impl NormalField {
    /// Get a normal at the given coordinates.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f64; 3] {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encode a normal as 8-bit RGB via `(v + 1) / 2 * 255`.
    #[inline]
    pub fn encode(n: [f64; 3]) -> [u8; 3] {
        let enc = |v: f64| (((v + 1.0) * 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
        [enc(n[0]), enc(n[1]), enc(n[2])]
    }

    /// Convert to 8-bit RGB bytes.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 3);
        for &n in &self.data {
            bytes.extend_from_slice(&Self::encode(n));
        }
        bytes
    }

    /// Convert to an 8-bit RGB image buffer.
    pub fn to_image(&self) -> Result<ImageBuffer> {
        ImageBuffer::new(self.width, self.height, PixelFormat::Rgb8, self.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn scalar_field_get_set_and_clamping() {
        let mut field = ScalarField::new(2, 2, 0.0).unwrap();
        field.set(0, 0, 0.1);
        field.set(1, 0, 0.2);
        field.set(0, 1, 0.3);
        field.set(1, 1, 0.4);

        assert!(approx_eq(field.get_clamped(-1, -1), 0.1));
        assert!(approx_eq(field.get_clamped(5, 0), 0.2));
        assert!(approx_eq(field.get_clamped(0, 9), 0.3));
        assert!(approx_eq(field.get_clamped(3, 3), 0.4));
    }

    #[test]
    fn scalar_field_bytes() {
        let field = ScalarField::from_vec(4, 1, vec![0.0, 0.5, 1.0, -1.0]).unwrap();
        assert_eq!(field.to_bytes(), vec![0, 128, 255, 0]);
    }

    #[test]
    fn scalar_field_rejects_wrong_length() {
        assert!(ScalarField::from_vec(2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn flat_normal_encodes_to_128_128_255() {
        assert_eq!(NormalField::encode([0.0, 0.0, 1.0]), [128, 128, 255]);
        assert_eq!(NormalField::encode([-1.0, 1.0, 0.0]), [0, 255, 128]);
    }
}
