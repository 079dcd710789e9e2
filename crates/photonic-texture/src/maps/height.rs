//! Height map generator.
//!
//! Height is estimated from albedo luminance in four steps:
//!
//! 1. A self-guided filter (He et al., "Guided Image Filtering") produces an
//!    edge-preserving base layer. Unlike a bilateral filter it does not
//!    reverse gradients next to strong edges.
//! 2. A 3-level Laplacian pyramid of the luminance recovers per-scale detail.
//! 3. The base layer and the detail bands are fused, finer bands weighted
//!    lower so sensor noise is not amplified.
//! 4. Tiled CLAHE normalizes local contrast, then the result is clamped.

use tracing::debug;

use super::ScalarField;
use crate::buffer::ImageBuffer;
use crate::error::{MapError, Result};
use crate::filter::{box_mean, downsample, upsample};
use crate::parallel::WorkerPool;

/// Fusion weights of the Laplacian detail bands, finest band first.
pub const HEIGHT_DETAIL_WEIGHTS: [f64; 3] = [0.35, 0.6, 0.85];

const GUIDED_RADIUS: u32 = 8;
const GUIDED_EPSILON: f64 = 0.01;
const CLAHE_TILES: u32 = 8;
const CLAHE_CLIP_LIMIT: f64 = 2.5;
const CLAHE_BINS: usize = 256;

/// Height map generator.
#[derive(Debug, Clone)]
pub struct HeightGenerator {
    guided_radius: u32,
    guided_epsilon: f64,
    detail_weights: [f64; 3],
    clahe_tiles: u32,
    clahe_clip_limit: f64,
}

impl HeightGenerator {
    /// Create a generator with the calibrated constants.
    pub fn new() -> Self {
        Self {
            guided_radius: GUIDED_RADIUS,
            guided_epsilon: GUIDED_EPSILON,
            detail_weights: HEIGHT_DETAIL_WEIGHTS,
            clahe_tiles: CLAHE_TILES,
            clahe_clip_limit: CLAHE_CLIP_LIMIT,
        }
    }

    /// Generate a height field from an albedo image.
    ///
    /// Both dimensions must be at least 2.
    pub fn generate(&self, pool: &WorkerPool, albedo: &ImageBuffer) -> Result<ScalarField> {
        let (width, height) = albedo.dimensions();
        if width < 2 || height < 2 {
            return Err(MapError::InvalidDimensions(format!(
                "height generation needs at least 2x2 pixels, got {}x{}",
                width, height
            )));
        }
        let _span = tracing::debug_span!("height", width, height).entered();

        let luminance = luminance_field(pool, albedo)?;

        debug!(radius = self.guided_radius, "guided filter");
        let base = guided_filter(
            pool,
            &luminance,
            &luminance,
            self.guided_radius,
            self.guided_epsilon,
        )?;

        debug!(levels = self.detail_weights.len(), "laplacian pyramid");
        let bands = laplacian_bands(pool, &luminance, self.detail_weights.len())?;

        let mut fused = base;
        for (band, weight) in bands.iter().zip(self.detail_weights) {
            for (out, d) in fused.data.iter_mut().zip(&band.data) {
                *out += weight * d;
            }
        }
        for v in &mut fused.data {
            *v = v.clamp(0.0, 1.0);
        }

        debug!(tiles = self.clahe_tiles, "clahe");
        let mut equalized = clahe(pool, &fused, self.clahe_tiles, self.clahe_clip_limit)?;
        for v in &mut equalized.data {
            *v = v.clamp(0.0, 1.0);
        }
        Ok(equalized)
    }
}

impl Default for HeightGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Rec. 709 luminance of every pixel.
pub(crate) fn luminance_field(pool: &WorkerPool, image: &ImageBuffer) -> Result<ScalarField> {
    let (width, height) = image.dimensions();
    let data = pool.map_pixels(width, height, |x, y| image.value(x, y))?;
    ScalarField::from_vec(width, height, data)
}

/// Guided filter of `input` steered by `guide`.
pub(crate) fn guided_filter(
    pool: &WorkerPool,
    input: &ScalarField,
    guide: &ScalarField,
    radius: u32,
    epsilon: f64,
) -> Result<ScalarField> {
    let (width, height) = input.dimensions();
    let product = |a: &ScalarField, b: &ScalarField| -> Result<ScalarField> {
        let data = a.data.iter().zip(&b.data).map(|(x, y)| x * y).collect();
        ScalarField::from_vec(width, height, data)
    };

    let mean_guide = box_mean(pool, guide, radius)?;
    let mean_input = box_mean(pool, input, radius)?;
    let corr_guide = box_mean(pool, &product(guide, guide)?, radius)?;
    let corr_guide_input = box_mean(pool, &product(guide, input)?, radius)?;

    let mut a = ScalarField::new(width, height, 0.0)?;
    let mut b = ScalarField::new(width, height, 0.0)?;
    for i in 0..a.data.len() {
        let var_guide = corr_guide.data[i] - mean_guide.data[i] * mean_guide.data[i];
        let cov = corr_guide_input.data[i] - mean_guide.data[i] * mean_input.data[i];
        a.data[i] = cov / (var_guide + epsilon);
        b.data[i] = mean_input.data[i] - a.data[i] * mean_guide.data[i];
    }

    let mean_a = box_mean(pool, &a, radius)?;
    let mean_b = box_mean(pool, &b, radius)?;
    let data = pool.map_pixels(width, height, |x, y| {
        mean_a.get(x, y) * guide.get(x, y) + mean_b.get(x, y)
    })?;
    ScalarField::from_vec(width, height, data)
}

/// Detail bands of a Laplacian pyramid, each resampled to full resolution.
/// Index 0 is the finest band.
pub(crate) fn laplacian_bands(
    pool: &WorkerPool,
    image: &ScalarField,
    levels: usize,
) -> Result<Vec<ScalarField>> {
    let mut gaussians = vec![image.clone()];
    for level in 0..levels {
        let next = downsample(pool, &gaussians[level])?;
        gaussians.push(next);
    }

    let mut bands = Vec::with_capacity(levels);
    for level in 0..levels {
        let fine = &gaussians[level];
        let coarse = upsample(pool, &gaussians[level + 1], fine.width, fine.height)?;
        let data = fine
            .data
            .iter()
            .zip(&coarse.data)
            .map(|(f, c)| f - c)
            .collect();
        let mut band = ScalarField::from_vec(fine.width, fine.height, data)?;

        // Walk the band back up to full resolution
        for up in (0..level).rev() {
            let target = &gaussians[up];
            band = upsample(pool, &band, target.width, target.height)?;
        }
        bands.push(band);
    }
    Ok(bands)
}

/// Contrast-limited adaptive histogram equalization over a grid of tiles,
/// bilinearly blending the per-tile mappings.
pub(crate) fn clahe(
    pool: &WorkerPool,
    input: &ScalarField,
    tiles: u32,
    clip_limit: f64,
) -> Result<ScalarField> {
    let (width, height) = input.dimensions();
    let tiles_x = tiles.clamp(1, width);
    let tiles_y = tiles.clamp(1, height);

    let bin_of = |v: f64| (v.clamp(0.0, 1.0) * (CLAHE_BINS - 1) as f64).round() as usize;

    let luts = pool.map_indexed((tiles_x * tiles_y) as usize, |t| {
        let tx = t as u32 % tiles_x;
        let ty = t as u32 / tiles_x;
        let x0 = tx * width / tiles_x;
        let x1 = (tx + 1) * width / tiles_x;
        let y0 = ty * height / tiles_y;
        let y1 = (ty + 1) * height / tiles_y;

        let mut histogram = [0.0f64; CLAHE_BINS];
        for y in y0..y1 {
            for x in x0..x1 {
                histogram[bin_of(input.get(x, y))] += 1.0;
            }
        }
        let total = ((x1 - x0) * (y1 - y0)) as f64;

        let clip = clip_limit * total / CLAHE_BINS as f64;
        let mut excess = 0.0;
        for h in histogram.iter_mut() {
            if *h > clip {
                excess += *h - clip;
                *h = clip;
            }
        }
        let share = excess / CLAHE_BINS as f64;

        let mut lut = [0.0f64; CLAHE_BINS];
        let mut cdf = 0.0;
        for (bin, h) in histogram.iter().enumerate() {
            cdf += h + share;
            lut[bin] = cdf / total;
        }
        lut
    });

    let tile_w = width as f64 / tiles_x as f64;
    let tile_h = height as f64 / tiles_y as f64;
    let data = pool.map_pixels(width, height, |x, y| {
        let bin = bin_of(input.get(x, y));

        let gx = (x as f64 + 0.5) / tile_w - 0.5;
        let gy = (y as f64 + 0.5) / tile_h - 0.5;
        let (tx0, tx1, fx) = grid_cell(gx, tiles_x);
        let (ty0, ty1, fy) = grid_cell(gy, tiles_y);

        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][bin];
        let top = lut(tx0, ty0) + (lut(tx1, ty0) - lut(tx0, ty0)) * fx;
        let bottom = lut(tx0, ty1) + (lut(tx1, ty1) - lut(tx0, ty1)) * fx;
        top + (bottom - top) * fy
    })?;
    ScalarField::from_vec(width, height, data)
}

/// Neighbouring tile indices and blend factor for a position in tile space.
fn grid_cell(g: f64, tiles: u32) -> (u32, u32, f64) {
    if g <= 0.0 {
        return (0, 0, 0.0);
    }
    let last = tiles - 1;
    let t0 = (g.floor() as u32).min(last);
    let t1 = (t0 + 1).min(last);
    let f = if t0 == t1 { 0.0 } else { g - t0 as f64 };
    (t0, t1, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;

    fn pool(threads: usize) -> WorkerPool {
        WorkerPool::new(threads).unwrap()
    }

    fn noisy_albedo(width: u32, height: u32) -> ImageBuffer {
        ImageBuffer::from_fn_rgba(width, height, |x, y| {
            let v = ((x * 37 + y * 91) % 97) as u8;
            let edge = if x > width / 2 { 120 } else { 0 };
            [v + edge, v / 2 + edge, 60, 255]
        })
        .unwrap()
    }

    #[test]
    fn preserves_dimensions() {
        let albedo = noisy_albedo(37, 21);
        let field = HeightGenerator::new().generate(&pool(2), &albedo).unwrap();
        assert_eq!(field.dimensions(), (37, 21));
        assert!(field.data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn rejects_degenerate_input() {
        let one = ImageBuffer::new(1, 1, PixelFormat::Rgb8, vec![1, 2, 3]).unwrap();
        let err = HeightGenerator::new().generate(&pool(1), &one).unwrap_err();
        assert!(matches!(err, MapError::InvalidDimensions(_)));

        let thin = ImageBuffer::new(1, 5, PixelFormat::Luma8, vec![0; 5]).unwrap();
        assert!(HeightGenerator::new().generate(&pool(1), &thin).is_err());
    }

    #[test]
    fn constant_albedo_gives_uniform_height() {
        let albedo = ImageBuffer::solid(24, 16, [90, 140, 200, 255]).unwrap();
        let field = HeightGenerator::new().generate(&pool(3), &albedo).unwrap();
        let first = field.data[0];
        for v in &field.data {
            assert!((v - first).abs() < 1e-9, "{} vs {}", v, first);
        }
    }

    #[test]
    fn deterministic_across_pool_sizes() {
        let albedo = noisy_albedo(29, 33);
        let generator = HeightGenerator::new();
        let a = generator.generate(&pool(1), &albedo).unwrap();
        let b = generator.generate(&pool(6), &albedo).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn brighter_half_is_higher() {
        let albedo = ImageBuffer::from_fn_rgba(32, 32, |x, _| {
            if x < 16 {
                [40, 40, 40, 255]
            } else {
                [210, 210, 210, 255]
            }
        })
        .unwrap();
        let field = HeightGenerator::new().generate(&pool(2), &albedo).unwrap();
        assert!(field.get(28, 16) > field.get(3, 16));
    }

    #[test]
    fn guided_filter_preserves_step_edges() {
        let p = pool(2);
        let mut step = ScalarField::new(40, 8, 0.0).unwrap();
        for y in 0..8 {
            for x in 20..40 {
                step.set(x, y, 1.0);
            }
        }
        let out = guided_filter(&p, &step, &step, 4, 0.01).unwrap();
        // Far from the edge the plateaus survive almost untouched
        assert!(out.get(2, 4) < 0.05);
        assert!(out.get(37, 4) > 0.95);
    }

    #[test]
    fn laplacian_bands_are_full_resolution() {
        let p = pool(2);
        let field = ScalarField::new(19, 11, 0.4).unwrap();
        let bands = laplacian_bands(&p, &field, 3).unwrap();
        assert_eq!(bands.len(), 3);
        for band in bands {
            assert_eq!(band.dimensions(), (19, 11));
        }
    }

    #[test]
    fn clahe_output_is_monotonic_within_a_tile() {
        let p = pool(1);
        let mut ramp = ScalarField::new(16, 1, 0.0).unwrap();
        for x in 0..16 {
            ramp.set(x, 0, x as f64 / 15.0 * 0.5);
        }
        let out = clahe(&p, &ramp, 1, 2.5).unwrap();
        for x in 1..16 {
            assert!(out.get(x, 0) >= out.get(x - 1, 0));
        }
    }
}
