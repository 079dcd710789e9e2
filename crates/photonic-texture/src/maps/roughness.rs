//! Roughness map generator.

use super::ScalarField;
use crate::buffer::ImageBuffer;
use crate::classify::{ClassificationField, MaterialClass};
use crate::error::{MapError, Result};
use crate::filter::{box_mean, gaussian_blur};
use crate::maps::height::luminance_field;
use crate::parallel::WorkerPool;

const VARIANCE_WEIGHT: f64 = 0.4;
const DETAIL_WEIGHT: f64 = 0.3;
const METALLIC_WEIGHT: f64 = 0.3;

const VARIANCE_RADIUS: u32 = 3;
const VARIANCE_GAIN: f64 = 10.0;
const DETAIL_SIGMAS: (f64, f64) = (1.0, 3.0);
const DETAIL_GAIN: f64 = 8.0;
/// How much full classifier confidence boosts its associated term.
const AFFINITY_BOOST: f64 = 0.5;

/// Lowest roughness the generator emits; keeps surfaces off the mirror limit.
const ROUGHNESS_FLOOR: f64 = 0.2;
const SMOOTHING_SIGMA: f64 = 1.0;

/// Roughness of a featureless Diffuse surface (constant albedo).
pub const DIFFUSE_BASELINE_ROUGHNESS: f64 =
    ROUGHNESS_FLOOR + (1.0 - ROUGHNESS_FLOOR) * METALLIC_WEIGHT;

/// Roughness map generator.
///
/// Combines three terms, each modulated by the classifier:
///
/// - local luminance variance, boosted by Wood confidence
/// - band-pass (difference of Gaussians) detail, boosted by Stone confidence
/// - a saturation-derived metallic term that drops toward zero for
///   unsaturated pixels as Metallic confidence rises
#[derive(Debug, Clone, Default)]
pub struct RoughnessGenerator;

impl RoughnessGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a roughness field in [0, 1].
    pub fn generate(
        &self,
        pool: &WorkerPool,
        albedo: &ImageBuffer,
        classification: &ClassificationField,
    ) -> Result<ScalarField> {
        let (width, height) = albedo.dimensions();
        if classification.dimensions() != (width, height) {
            return Err(MapError::InvalidDimensions(format!(
                "classification {}x{} does not match albedo {}x{}",
                classification.width, classification.height, width, height
            )));
        }
        let _span = tracing::debug_span!("roughness", width, height).entered();

        let luminance = luminance_field(pool, albedo)?;

        let mean = box_mean(pool, &luminance, VARIANCE_RADIUS)?;
        let deviation = ScalarField::from_vec(
            width,
            height,
            luminance
                .data
                .iter()
                .zip(&mean.data)
                .map(|(l, m)| (l - m) * (l - m))
                .collect(),
        )?;
        let variance = box_mean(pool, &deviation, VARIANCE_RADIUS)?;

        let fine = gaussian_blur(pool, &luminance, DETAIL_SIGMAS.0)?;
        let coarse = gaussian_blur(pool, &luminance, DETAIL_SIGMAS.1)?;

        let raw = pool.map_pixels(width, height, |x, y| {
            let class = classification.get(x, y);
            let wood = class.confidence_for(MaterialClass::Wood);
            let stone = class.confidence_for(MaterialClass::Stone);
            let metallic = class.confidence_for(MaterialClass::Metallic);

            let variance_term = (variance.get(x, y) * VARIANCE_GAIN
                * (1.0 + AFFINITY_BOOST * wood))
                .clamp(0.0, 1.0);
            let detail_term = ((fine.get(x, y) - coarse.get(x, y)).abs()
                * DETAIL_GAIN
                * (1.0 + AFFINITY_BOOST * stone))
                .clamp(0.0, 1.0);
            let saturation = albedo.color(x, y).saturation();
            let metallic_term = 1.0 - metallic * (1.0 - saturation);

            let r = VARIANCE_WEIGHT * variance_term
                + DETAIL_WEIGHT * detail_term
                + METALLIC_WEIGHT * metallic_term;
            ROUGHNESS_FLOOR + (1.0 - ROUGHNESS_FLOOR) * r
        })?;

        let mut smoothed =
            gaussian_blur(pool, &ScalarField::from_vec(width, height, raw)?, SMOOTHING_SIGMA)?;
        for v in &mut smoothed.data {
            *v = v.clamp(0.0, 1.0);
        }
        Ok(smoothed)
    }
}
