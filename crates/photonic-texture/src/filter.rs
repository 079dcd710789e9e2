//! Neighborhood filters on scalar fields.
//!
//! All filters use clamp-to-edge addressing and separable passes distributed
//! row-wise over the worker pool.

use crate::error::Result;
use crate::maps::ScalarField;
use crate::parallel::WorkerPool;

/// Mean over a `(2r+1) x (2r+1)` window.
pub fn box_mean(pool: &WorkerPool, input: &ScalarField, radius: u32) -> Result<ScalarField> {
    let kernel = vec![1.0 / (2 * radius + 1) as f64; (2 * radius + 1) as usize];
    convolve_separable(pool, input, &kernel)
}

/// Gaussian blur with the given sigma (kernel spans 3 sigma on each side).
pub fn gaussian_blur(pool: &WorkerPool, input: &ScalarField, sigma: f64) -> Result<ScalarField> {
    if sigma <= 0.0 {
        return Ok(input.clone());
    }
    convolve_separable(pool, input, &gaussian_kernel(sigma))
}

/// Normalized 1D Gaussian kernel.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let kernel_size = ((sigma * 3.0).ceil() as usize * 2 + 1).max(3);
    let half_kernel = kernel_size / 2;

    let mut kernel = vec![0.0; kernel_size];
    let mut sum = 0.0;
    for (i, kernel_value) in kernel.iter_mut().enumerate() {
        let x = i as f64 - half_kernel as f64;
        let value = (-x * x / (2.0 * sigma * sigma)).exp();
        *kernel_value = value;
        sum += value;
    }
    for value in &mut kernel {
        *value /= sum;
    }
    kernel
}

/// Apply a symmetric odd-length 1D kernel horizontally then vertically.
fn convolve_separable(
    pool: &WorkerPool,
    input: &ScalarField,
    kernel: &[f64],
) -> Result<ScalarField> {
    let width = input.width;
    let height = input.height;
    let half = (kernel.len() / 2) as i64;

    let horizontal = pool.map_rows(width, height, |y, row| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (i, k) in kernel.iter().enumerate() {
                sum += input.get_clamped(x as i64 + i as i64 - half, y as i64) * k;
            }
            *out = sum;
        }
    })?;
    let horizontal = ScalarField::from_vec(width, height, horizontal)?;

    let vertical = pool.map_rows(width, height, |y, row| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (i, k) in kernel.iter().enumerate() {
                sum += horizontal.get_clamped(x as i64, y as i64 + i as i64 - half) * k;
            }
            *out = sum;
        }
    })?;
    ScalarField::from_vec(width, height, vertical)
}

/// Scharr gradient at (x, y) in units of value per pixel.
///
/// ```text
/// Gx = | -3  0  3 |    Gy = | -3 -10 -3 |
///      |-10  0 10 |         |  0   0  0 |
///      | -3  0  3 |         |  3  10  3 |
/// ```
#[inline]
pub fn scharr(field: &ScalarField, x: u32, y: u32) -> (f64, f64) {
    let (x, y) = (x as i64, y as i64);
    let get = |dx: i64, dy: i64| field.get_clamped(x + dx, y + dy);

    let gx = 3.0 * (get(1, -1) - get(-1, -1))
        + 10.0 * (get(1, 0) - get(-1, 0))
        + 3.0 * (get(1, 1) - get(-1, 1));
    let gy = 3.0 * (get(-1, 1) - get(-1, -1))
        + 10.0 * (get(0, 1) - get(0, -1))
        + 3.0 * (get(1, 1) - get(1, -1));

    // 16 weight units per side, 2 pixels apart
    (gx / 32.0, gy / 32.0)
}

/// Blur then drop every other row and column.
pub fn downsample(pool: &WorkerPool, input: &ScalarField) -> Result<ScalarField> {
    let blurred = gaussian_blur(pool, input, 1.0)?;
    let width = input.width.div_ceil(2).max(1);
    let height = input.height.div_ceil(2).max(1);
    let data = pool.map_pixels(width, height, |x, y| {
        blurred.get((x * 2).min(input.width - 1), (y * 2).min(input.height - 1))
    })?;
    ScalarField::from_vec(width, height, data)
}

/// Bilinear resample of a downsampled level back to `width` x `height`.
pub fn upsample(
    pool: &WorkerPool,
    input: &ScalarField,
    width: u32,
    height: u32,
) -> Result<ScalarField> {
    let data = pool.map_pixels(width, height, |x, y| {
        // Pixel (x, y) of the fine grid sits at (x/2, y/2) on the coarse grid
        let sx = x as f64 * 0.5;
        let sy = y as f64 * 0.5;
        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f64;
        let fy = sy - y0 as f64;

        let c00 = input.get_clamped(x0, y0);
        let c10 = input.get_clamped(x0 + 1, y0);
        let c01 = input.get_clamped(x0, y0 + 1);
        let c11 = input.get_clamped(x0 + 1, y0 + 1);

        let top = c00 + (c10 - c00) * fx;
        let bottom = c01 + (c11 - c01) * fx;
        top + (bottom - top) * fy
    })?;
    ScalarField::from_vec(width, height, data)
}
