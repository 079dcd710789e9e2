//! Normal map generator.

use super::{NormalField, ScalarField};
use crate::error::{MapError, Result};
use crate::filter::{gaussian_blur, scharr};
use crate::parallel::WorkerPool;

/// Default bump strength (the `k` in `(-gx k, -gy k, 1)`).
pub const DEFAULT_NORMAL_STRENGTH: f64 = 8.0;

/// Integration scale of the structure tensor.
const TENSOR_SIGMA: f64 = 1.5;

/// Normal map generator.
#[derive(Debug, Clone)]
pub struct NormalGenerator {
    /// Strength multiplier for the normal map.
    pub strength: f64,
}

impl NormalGenerator {
    /// Create a new normal generator.
    pub fn new() -> Self {
        Self {
            strength: DEFAULT_NORMAL_STRENGTH,
        }
    }

    /// Set the strength.
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    /// Generate a normal field from a height field.
    ///
    /// Per-pixel Scharr gradients are replaced by a structure-tensor estimate:
    /// the tensor's principal direction and magnitude where the neighbourhood
    /// has a dominant orientation, the smoothed gradient where it does not.
    pub fn generate_from_height(
        &self,
        pool: &WorkerPool,
        height_map: &ScalarField,
    ) -> Result<NormalField> {
        let (width, height) = height_map.dimensions();
        if width == 0 || height == 0 || height_map.data.len() != width as usize * height as usize
        {
            return Err(MapError::InvalidDimensions(format!(
                "height field {}x{} with {} values",
                width,
                height,
                height_map.data.len()
            )));
        }
        let _span = tracing::debug_span!("normal", width, height).entered();

        let gradients = pool.map_pixels(width, height, |x, y| scharr(height_map, x, y))?;
        let field = |f: &dyn Fn((f64, f64)) -> f64| {
            ScalarField::from_vec(width, height, gradients.iter().map(|&g| f(g)).collect())
        };

        let gx = gaussian_blur(pool, &field(&|g| g.0)?, TENSOR_SIGMA)?;
        let gy = gaussian_blur(pool, &field(&|g| g.1)?, TENSOR_SIGMA)?;
        let jxx = gaussian_blur(pool, &field(&|g| g.0 * g.0)?, TENSOR_SIGMA)?;
        let jxy = gaussian_blur(pool, &field(&|g| g.0 * g.1)?, TENSOR_SIGMA)?;
        let jyy = gaussian_blur(pool, &field(&|g| g.1 * g.1)?, TENSOR_SIGMA)?;

        let data = pool.map_pixels(width, height, |x, y| {
            let (dx, dy) = stabilized_gradient(
                [jxx.get(x, y), jxy.get(x, y), jyy.get(x, y)],
                (gx.get(x, y), gy.get(x, y)),
            );
            self.normal_from_gradient(dx, dy)
        })?;

        Ok(NormalField {
            width,
            height,
            data,
        })
    }

    /// Tangent-space normal `(-gx k, -gy k, 1)` normalized to unit length.
    fn normal_from_gradient(&self, gx: f64, gy: f64) -> [f64; 3] {
        let nx = -gx * self.strength;
        let ny = -gy * self.strength;
        let nz = 1.0;

        let len = (nx * nx + ny * ny + nz * nz).sqrt();
        [nx / len, ny / len, nz / len]
    }
}

impl Default for NormalGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Blend the tensor's principal gradient with the smoothed gradient by
/// coherence.
///
/// `tensor` is `[Jxx, Jxy, Jyy]`.
fn stabilized_gradient(tensor: [f64; 3], smoothed: (f64, f64)) -> (f64, f64) {
    let [jxx, jxy, jyy] = tensor;
    let trace = jxx + jyy;
    if trace <= 1e-18 {
        return smoothed;
    }

    let half_diff = (jxx - jyy) * 0.5;
    let disc = (half_diff * half_diff + jxy * jxy).sqrt();
    let lambda1 = trace * 0.5 + disc;
    let coherence = ((2.0 * disc) / trace).powi(2).min(1.0);

    let (vx, vy) = if jxy.abs() > 1e-18 {
        let (vx, vy) = (lambda1 - jyy, jxy);
        let len = (vx * vx + vy * vy).sqrt();
        (vx / len, vy / len)
    } else if jxx >= jyy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    // Eigenvectors carry no sign; take it from the smoothed gradient
    let sign = if vx * smoothed.0 + vy * smoothed.1 < 0.0 {
        -1.0
    } else {
        1.0
    };
    let magnitude = lambda1.sqrt() * sign;

    (
        coherence * magnitude * vx + (1.0 - coherence) * smoothed.0,
        coherence * magnitude * vy + (1.0 - coherence) * smoothed.1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> WorkerPool {
        WorkerPool::new(2).unwrap()
    }

    fn ramp_x(width: u32, height: u32, slope: f64) -> ScalarField {
        let mut f = ScalarField::new(width, height, 0.0).unwrap();
        for y in 0..height {
            for x in 0..width {
                f.set(x, y, x as f64 * slope);
            }
        }
        f
    }

    fn pseudo_noise(x: u32, y: u32) -> f64 {
        let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)) % 1000;
        h as f64 / 1000.0 - 0.5
    }

    #[test]
    fn test_normal_flat() {
        let field = ScalarField::new(16, 16, 0.5).unwrap();
        let normals = NormalGenerator::new().generate_from_height(&pool(), &field).unwrap();
        for &n in &normals.data {
            assert_eq!(n, [0.0, 0.0, 1.0]);
            assert_eq!(NormalField::encode(n), [128, 128, 255]);
        }
    }

    #[test]
    fn test_normal_tilts_against_slope() {
        let field = ramp_x(32, 32, 0.01);
        let normals = NormalGenerator::new().generate_from_height(&pool(), &field).unwrap();
        let n = normals.get(16, 16);
        assert!(n[0] < 0.0, "height rising to the right tilts x negative");
        assert!(n[1].abs() < 1e-9);
        assert!(n[2] > 0.0);

        let expected = -0.01 * DEFAULT_NORMAL_STRENGTH;
        let len = (expected * expected + 1.0).sqrt();
        assert!((n[0] - expected / len).abs() < 1e-9);
    }

    #[test]
    fn test_normal_y_follows_image_rows() {
        let mut field = ScalarField::new(32, 32, 0.0).unwrap();
        for y in 0..32 {
            for x in 0..32 {
                field.set(x, y, y as f64 * 0.02);
            }
        }
        let normals = NormalGenerator::new().generate_from_height(&pool(), &field).unwrap();
        let n = normals.get(16, 16);
        assert!(n[1] < 0.0, "height rising downward tilts y negative");
        assert!(NormalField::encode(n)[1] < 128);
    }

    #[test]
    fn test_normals_are_unit_length_with_positive_z() {
        let mut field = ScalarField::new(24, 24, 0.0).unwrap();
        for y in 0..24 {
            for x in 0..24 {
                field.set(x, y, (pseudo_noise(x, y) + 0.5).clamp(0.0, 1.0));
            }
        }
        let normals = NormalGenerator::new()
            .with_strength(20.0)
            .generate_from_height(&pool(), &field)
            .unwrap();
        for n in normals.data {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-9);
            assert!(n[2] > 0.0);
        }
    }

    #[test]
    fn test_tensor_suppresses_noise() {
        let slope = 0.01;
        let mut field = ramp_x(48, 48, slope);
        for y in 0..48 {
            for x in 0..48 {
                let v = field.get(x, y) + pseudo_noise(x, y) * 0.004;
                field.set(x, y, v);
            }
        }

        let p = pool();
        let stabilized = NormalGenerator::new().generate_from_height(&p, &field).unwrap();

        let mut raw_error = 0.0;
        let mut tensor_error = 0.0;
        for y in 8..40 {
            for x in 8..40 {
                let (gx, gy) = scharr(&field, x, y);
                raw_error += (gx - slope).powi(2) + gy.powi(2);

                let n = stabilized.get(x, y);
                let est_gx = -n[0] / n[2] / DEFAULT_NORMAL_STRENGTH;
                let est_gy = -n[1] / n[2] / DEFAULT_NORMAL_STRENGTH;
                tensor_error += (est_gx - slope).powi(2) + est_gy.powi(2);
            }
        }
        assert!(
            tensor_error < raw_error,
            "tensor error {} should be below raw error {}",
            tensor_error,
            raw_error
        );
    }

    #[test]
    fn test_normal_deterministic_across_pools() {
        let mut field = ScalarField::new(33, 19, 0.0).unwrap();
        for y in 0..19 {
            for x in 0..33 {
                field.set(x, y, pseudo_noise(x, y) + 0.5);
            }
        }
        let generator = NormalGenerator::new();
        let a = generator
            .generate_from_height(&WorkerPool::new(1).unwrap(), &field)
            .unwrap();
        let b = generator
            .generate_from_height(&WorkerPool::new(5).unwrap(), &field)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_empty_field() {
        let field = ScalarField {
            width: 0,
            height: 4,
            data: vec![],
        };
        assert!(NormalGenerator::new()
            .generate_from_height(&pool(), &field)
            .is_err());
    }
}
