//! Per-pixel material classification.
//!
//! Six windowed features drive a fixed-threshold rule:
//!
//! | Feature              | Source                                          |
//! |----------------------|-------------------------------------------------|
//! | mean luminance       | box mean of Rec. 709 luminance                  |
//! | luminance variance   | box mean of L^2 minus squared mean              |
//! | texture density      | box mean of Scharr gradient magnitude           |
//! | saturation           | box mean of HSV saturation                      |
//! | specular response    | bright, unsaturated, brighter than surroundings |
//! | height curvature     | box mean of the absolute height Laplacian       |
//!
//! Gradient anisotropy (structure tensor coherence) separates grain from
//! irregular micro-texture. Specular response only counts as metal inside a
//! bright neighbourhood; sparks on a dark surface stay Diffuse.
//!
//! The result only biases roughness weighting, so a wrong label is an
//! accepted approximation, never an error.

use std::fmt;

use tracing::debug;

use crate::buffer::ImageBuffer;
use crate::error::{MapError, Result};
use crate::filter::{box_mean, scharr};
use crate::maps::ScalarField;
use crate::parallel::WorkerPool;

const WINDOW_RADIUS: u32 = 3;
const SURROUND_RADIUS: u32 = 6;

const VARIANCE_GAIN: f64 = 40.0;
const DENSITY_GAIN: f64 = 40.0;
const CURVATURE_GAIN: f64 = 20.0;
const SPECULAR_GAIN: f64 = 8.0;
/// Luminance margin above the surroundings that counts as fully isolated.
const ISOLATION_MARGIN: f64 = 0.1;
/// Mean luminance ramp over which specular response starts to count as metal.
const METALLIC_MEAN_RAMP: (f64, f64) = (0.15, 0.35);

const METALLIC_THRESHOLD: f64 = 0.45;
const WOOD_THRESHOLD: f64 = 0.35;
const STONE_THRESHOLD: f64 = 0.35;
/// Score every pixel has for Diffuse; the fallback class.
pub const DIFFUSE_SCORE: f64 = 0.3;

/// Material category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialClass {
    Metallic,
    #[default]
    Diffuse,
    Wood,
    Stone,
}

impl MaterialClass {
    /// All classes in score order.
    pub const ALL: [MaterialClass; 4] = [
        MaterialClass::Metallic,
        MaterialClass::Diffuse,
        MaterialClass::Wood,
        MaterialClass::Stone,
    ];

    #[inline]
    fn index(self) -> usize {
        match self {
            MaterialClass::Metallic => 0,
            MaterialClass::Diffuse => 1,
            MaterialClass::Wood => 2,
            MaterialClass::Stone => 3,
        }
    }
}

impl fmt::Display for MaterialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaterialClass::Metallic => "metallic",
            MaterialClass::Diffuse => "diffuse",
            MaterialClass::Wood => "wood",
            MaterialClass::Stone => "stone",
        };
        f.write_str(name)
    }
}

/// Label and confidence for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Classification {
    pub label: MaterialClass,
    /// Margin between the two highest gated scores, in [0, 1].
    pub confidence: f64,
    /// Raw scores indexed like [`MaterialClass::ALL`].
    pub scores: [f64; 4],
}

impl Classification {
    /// Confidence that this pixel is `material`: the label's confidence when
    /// the label matches, zero otherwise.
    #[inline]
    pub fn confidence_for(&self, material: MaterialClass) -> f64 {
        if self.label == material {
            self.confidence
        } else {
            0.0
        }
    }

    /// Raw score for a class.
    #[inline]
    pub fn score(&self, material: MaterialClass) -> f64 {
        self.scores[material.index()]
    }
}

/// Classification of every pixel of an albedo image.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationField {
    pub width: u32,
    pub height: u32,
    pub data: Vec<Classification>,
}

impl ClassificationField {
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Classification {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel count per class, indexed like [`MaterialClass::ALL`].
    pub fn histogram(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for c in &self.data {
            counts[c.label.index()] += 1;
        }
        counts
    }
}

/// Material classifier.
#[derive(Debug, Clone, Default)]
pub struct MaterialClassifier;

impl MaterialClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify every pixel of `albedo`, using `height` for curvature.
    pub fn classify(
        &self,
        pool: &WorkerPool,
        albedo: &ImageBuffer,
        height: &ScalarField,
    ) -> Result<ClassificationField> {
        let (width, h) = albedo.dimensions();
        if height.dimensions() != (width, h) {
            return Err(MapError::InvalidDimensions(format!(
                "height field {}x{} does not match albedo {}x{}",
                height.width, height.height, width, h
            )));
        }
        let _span = tracing::debug_span!("classify", width, height = h).entered();

        let features = Features::compute(pool, albedo, height)?;
        let data = pool.map_pixels(width, h, |x, y| {
            let i = y as usize * width as usize + x as usize;
            decide(features.scores_at(i))
        })?;

        let field = ClassificationField {
            width,
            height: h,
            data,
        };
        let [metallic, diffuse, wood, stone] = field.histogram();
        debug!(metallic, diffuse, wood, stone, "material histogram");
        Ok(field)
    }
}

/// Windowed per-pixel features.
struct Features {
    mean: ScalarField,
    variance: ScalarField,
    density: ScalarField,
    saturation: ScalarField,
    specular: ScalarField,
    curvature: ScalarField,
    coherence: ScalarField,
}

impl Features {
    fn compute(pool: &WorkerPool, albedo: &ImageBuffer, height: &ScalarField) -> Result<Self> {
        let (width, h) = albedo.dimensions();
        let field = |data: Vec<f64>| ScalarField::from_vec(width, h, data);

        let luminance = field(pool.map_pixels(width, h, |x, y| albedo.value(x, y))?)?;
        let saturation_px = field(pool.map_pixels(width, h, |x, y| {
            albedo.color(x, y).saturation()
        })?)?;

        let mean = box_mean(pool, &luminance, WINDOW_RADIUS)?;
        let squares = field(luminance.data.iter().map(|v| v * v).collect())?;
        let mean_sq = box_mean(pool, &squares, WINDOW_RADIUS)?;
        let variance = field(
            mean.data
                .iter()
                .zip(&mean_sq.data)
                .map(|(m, sq)| (sq - m * m).max(0.0))
                .collect(),
        )?;

        let gradients = pool.map_pixels(width, h, |x, y| scharr(&luminance, x, y))?;
        let windowed = |values: Vec<f64>| -> Result<ScalarField> {
            box_mean(pool, &field(values)?, WINDOW_RADIUS)
        };
        let density = windowed(gradients.iter().map(|(gx, gy)| gx.hypot(*gy)).collect())?;
        let jxx = windowed(gradients.iter().map(|g| g.0 * g.0).collect())?;
        let jxy = windowed(gradients.iter().map(|g| g.0 * g.1).collect())?;
        let jyy = windowed(gradients.iter().map(|g| g.1 * g.1).collect())?;
        let coherence = field(
            (0..jxx.data.len())
                .map(|i| coherence(jxx.data[i], jxy.data[i], jyy.data[i]))
                .collect(),
        )?;

        let saturation = box_mean(pool, &saturation_px, WINDOW_RADIUS)?;

        let surround = box_mean(pool, &luminance, SURROUND_RADIUS)?;
        let highlight = field(
            (0..luminance.data.len())
                .map(|i| {
                    let l = luminance.data[i];
                    let isolation = ((l - surround.data[i]) / ISOLATION_MARGIN).clamp(0.0, 1.0);
                    smoothstep(0.6, 0.9, l) * (1.0 - saturation_px.data[i]) * isolation
                })
                .collect(),
        )?;
        let specular = box_mean(pool, &highlight, WINDOW_RADIUS)?;

        let laplacian = field(pool.map_pixels(width, h, |x, y| {
            let (x, y) = (x as i64, y as i64);
            let c = height.get_clamped(x, y);
            (height.get_clamped(x - 1, y)
                + height.get_clamped(x + 1, y)
                + height.get_clamped(x, y - 1)
                + height.get_clamped(x, y + 1)
                - 4.0 * c)
                .abs()
        })?)?;
        let curvature = box_mean(pool, &laplacian, WINDOW_RADIUS)?;

        Ok(Self {
            mean,
            variance,
            density,
            saturation,
            specular,
            curvature,
            coherence,
        })
    }

    /// Raw class scores at flat index `i`, ordered like [`MaterialClass::ALL`].
    fn scores_at(&self, i: usize) -> [f64; 4] {
        let variance = (self.variance.data[i] * VARIANCE_GAIN).clamp(0.0, 1.0);
        let density = (self.density.data[i] * DENSITY_GAIN).clamp(0.0, 1.0);
        let curvature = (self.curvature.data[i] * CURVATURE_GAIN).clamp(0.0, 1.0);
        let specular = (self.specular.data[i] * SPECULAR_GAIN).clamp(0.0, 1.0);
        let saturation = self.saturation.data[i].clamp(0.0, 1.0);
        let coherence = self.coherence.data[i];
        let (dark, bright) = METALLIC_MEAN_RAMP;
        let brightness = smoothstep(dark, bright, self.mean.data[i]);

        let micro_texture = (0.6 * density + 0.4 * curvature).clamp(0.0, 1.0);

        let metallic = specular.sqrt() * (1.0 - saturation) * brightness;
        let wood = variance * coherence;
        let stone = (1.0 - variance) * micro_texture * (1.0 - coherence);
        [metallic, DIFFUSE_SCORE, wood, stone]
    }
}

/// Gate scores by their thresholds and pick the winner.
fn decide(scores: [f64; 4]) -> Classification {
    let thresholds = [METALLIC_THRESHOLD, 0.0, WOOD_THRESHOLD, STONE_THRESHOLD];
    let mut gated = scores;
    for (score, threshold) in gated.iter_mut().zip(thresholds) {
        if *score < threshold {
            *score = 0.0;
        }
    }

    // Diffuse wins ties
    let best = gated
        .iter()
        .enumerate()
        .fold(1, |best, (i, &score)| if score > gated[best] { i } else { best });
    let runner_up = gated
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != best)
        .map(|(_, &score)| score)
        .fold(0.0, f64::max);

    Classification {
        label: MaterialClass::ALL[best],
        confidence: (gated[best] - runner_up).clamp(0.0, 1.0),
        scores,
    }
}

/// Squared normalized eigenvalue gap of a 2x2 structure tensor.
fn coherence(jxx: f64, jxy: f64, jyy: f64) -> f64 {
    let trace = jxx + jyy;
    if trace <= 1e-18 {
        return 0.0;
    }
    let half_diff = (jxx - jyy) * 0.5;
    let disc = (half_diff * half_diff + jxy * jxy).sqrt();
    ((2.0 * disc) / trace).powi(2).min(1.0)
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> WorkerPool {
        WorkerPool::new(2).unwrap()
    }

    fn pseudo_noise(x: u32, y: u32) -> f64 {
        let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)) % 1000;
        h as f64 / 1000.0 - 0.5
    }

    fn flat_height(width: u32, height: u32) -> ScalarField {
        ScalarField::new(width, height, 0.5).unwrap()
    }

    #[test]
    fn constant_albedo_is_diffuse() {
        let albedo = ImageBuffer::solid(16, 16, [200, 80, 40, 255]).unwrap();
        let field = MaterialClassifier::new()
            .classify(&pool(), &albedo, &flat_height(16, 16))
            .unwrap();
        for c in &field.data {
            assert_eq!(c.label, MaterialClass::Diffuse);
            assert!((c.confidence - DIFFUSE_SCORE).abs() < 1e-12);
        }
        assert_eq!(field.histogram(), [0, 256, 0, 0]);
    }

    #[test]
    fn isolated_highlights_are_metallic() {
        let albedo = ImageBuffer::from_fn_rgba(30, 30, |x, y| {
            if x % 3 == 0 && y % 3 == 0 {
                [255, 255, 255, 255]
            } else {
                [89, 89, 89, 255]
            }
        })
        .unwrap();
        let field = MaterialClassifier::new()
            .classify(&pool(), &albedo, &flat_height(30, 30))
            .unwrap();
        let c = field.get(15, 15);
        assert_eq!(c.label, MaterialClass::Metallic);
        assert!(c.confidence > 0.0);
    }

    #[test]
    fn high_contrast_grain_is_wood() {
        let albedo = ImageBuffer::from_fn_rgba(32, 32, |x, _| {
            if (x / 3) % 2 == 0 {
                [90, 60, 30, 255]
            } else {
                [200, 150, 90, 255]
            }
        })
        .unwrap();
        let field = MaterialClassifier::new()
            .classify(&pool(), &albedo, &flat_height(32, 32))
            .unwrap();
        assert_eq!(field.get(16, 16).label, MaterialClass::Wood);
    }

    #[test]
    fn low_variance_micro_texture_is_stone() {
        let albedo = ImageBuffer::from_fn_rgba(32, 32, |x, y| {
            let v = (128.0 + pseudo_noise(x, y) * 15.0) as u8;
            [v, v, v - 4, 255]
        })
        .unwrap();
        let mut height = ScalarField::new(32, 32, 0.0).unwrap();
        for y in 0..32 {
            for x in 0..32 {
                height.set(x, y, 0.5 + pseudo_noise(y, x) * 0.2);
            }
        }
        let field = MaterialClassifier::new()
            .classify(&pool(), &albedo, &height)
            .unwrap();
        assert_eq!(field.get(16, 16).label, MaterialClass::Stone);
    }

    #[test]
    fn rejects_mismatched_height() {
        let albedo = ImageBuffer::solid(8, 8, [1, 2, 3, 255]).unwrap();
        let err = MaterialClassifier::new()
            .classify(&pool(), &albedo, &flat_height(8, 4))
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidDimensions(_)));
    }

    #[test]
    fn decide_uses_margin_between_top_two() {
        let c = decide([0.9, DIFFUSE_SCORE, 0.5, 0.1]);
        assert_eq!(c.label, MaterialClass::Metallic);
        assert!((c.confidence - 0.4).abs() < 1e-12);
        assert_eq!(c.confidence_for(MaterialClass::Metallic), c.confidence);
        assert_eq!(c.confidence_for(MaterialClass::Wood), 0.0);
    }

    #[test]
    fn decide_gates_scores_below_threshold() {
        let c = decide([0.44, DIFFUSE_SCORE, 0.0, 0.0]);
        assert_eq!(c.label, MaterialClass::Diffuse);
        assert!((c.confidence - DIFFUSE_SCORE).abs() < 1e-12);
        assert_eq!(c.score(MaterialClass::Metallic), 0.44);
    }

    /// Single-pixel features with a saturated specular response and no texture.
    fn specular_features(mean: f64) -> Features {
        let px = |v: f64| ScalarField::new(1, 1, v).unwrap();
        Features {
            mean: px(mean),
            variance: px(0.0),
            density: px(0.0),
            saturation: px(0.0),
            specular: px(1.0),
            curvature: px(0.0),
            coherence: px(0.0),
        }
    }

    #[test]
    fn specular_response_needs_a_bright_neighbourhood() {
        let bright = decide(specular_features(0.5).scores_at(0));
        assert_eq!(bright.label, MaterialClass::Metallic);
        assert!((bright.score(MaterialClass::Metallic) - 1.0).abs() < 1e-12);

        let dim = specular_features(0.25).scores_at(0)[0];
        assert!(dim > 0.0 && dim < 1.0, "partial ramp, got {}", dim);

        let dark = decide(specular_features(0.05).scores_at(0));
        assert_eq!(dark.label, MaterialClass::Diffuse);
        assert_eq!(dark.score(MaterialClass::Metallic), 0.0);
    }

    #[test]
    fn coherence_of_oriented_and_isotropic_tensors() {
        assert!((coherence(1.0, 0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!(coherence(1.0, 0.0, 1.0).abs() < 1e-12);
        assert_eq!(coherence(0.0, 0.0, 0.0), 0.0);
    }
}
