//! In-memory pipeline: derived maps and packed textures from decoded buffers.

use std::time::Instant;

use tracing::debug;

use crate::bc3::CompressedTexture;
use crate::buffer::ImageBuffer;
use crate::classify::{ClassificationField, MaterialClassifier};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::maps::{HeightGenerator, NormalField, NormalGenerator, RoughnessGenerator, ScalarField};
use crate::packing::TerrainMaps;
use crate::parallel::WorkerPool;

/// Height, normal and roughness derived from one albedo.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMaps {
    pub height: ScalarField,
    pub normal: NormalField,
    pub roughness: ScalarField,
}

impl DerivedMaps {
    /// 8-bit images in `(height, normal, roughness)` order.
    pub fn to_images(&self) -> Result<(ImageBuffer, ImageBuffer, ImageBuffer)> {
        Ok((
            self.height.to_image()?,
            self.normal.to_image()?,
            self.roughness.to_image()?,
        ))
    }
}

/// Runs the generators on a shared worker pool.
#[derive(Debug)]
pub struct MapGenerator {
    pool: WorkerPool,
    config: PipelineConfig,
}

impl MapGenerator {
    /// Build the worker pool described by `config`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let pool = WorkerPool::new(config.threads)?;
        debug!(threads = pool.threads(), "worker pool ready");
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn generate_height(&self, albedo: &ImageBuffer) -> Result<ScalarField> {
        timed("height", || HeightGenerator::new().generate(&self.pool, albedo))
    }

    pub fn generate_normal(&self, height: &ScalarField) -> Result<NormalField> {
        timed("normal", || {
            NormalGenerator::new()
                .with_strength(self.config.normal_strength)
                .generate_from_height(&self.pool, height)
        })
    }

    pub fn classify(
        &self,
        albedo: &ImageBuffer,
        height: &ScalarField,
    ) -> Result<ClassificationField> {
        timed("classify", || {
            MaterialClassifier::new().classify(&self.pool, albedo, height)
        })
    }

    pub fn generate_roughness(
        &self,
        albedo: &ImageBuffer,
        classification: &ClassificationField,
    ) -> Result<ScalarField> {
        timed("roughness", || {
            RoughnessGenerator::new().generate(&self.pool, albedo, classification)
        })
    }

    /// Run height, normal, classification and roughness in order.
    ///
    /// The classification is dropped once roughness is computed.
    pub fn generate_all(&self, albedo: &ImageBuffer) -> Result<DerivedMaps> {
        let height = self.generate_height(albedo)?;
        let normal = self.generate_normal(&height)?;
        let roughness = {
            let classification = self.classify(albedo, &height)?;
            self.generate_roughness(albedo, &classification)?
        };
        Ok(DerivedMaps {
            height,
            normal,
            roughness,
        })
    }

    /// Pack four maps into `(albedo_h, normal_r)` and compress both.
    ///
    /// Fails with `DimensionMismatch` before any work if the maps differ in
    /// size.
    pub fn pack_and_compress(
        &self,
        maps: &TerrainMaps<'_>,
    ) -> Result<(CompressedTexture, CompressedTexture)> {
        maps.validate()?;
        let (albedo_h, normal_r) = timed("pack", || maps.pack(&self.pool))?;
        let albedo_h = timed("compress albedo_h", || {
            CompressedTexture::compress(&self.pool, &albedo_h)
        })?;
        let normal_r = timed("compress normal_r", || {
            CompressedTexture::compress(&self.pool, &normal_r)
        })?;
        Ok((albedo_h, normal_r))
    }

    /// Derive height, normal and roughness from `albedo`, then pack and
    /// compress them with it.
    pub fn pack_generated(
        &self,
        albedo: &ImageBuffer,
    ) -> Result<(CompressedTexture, CompressedTexture)> {
        let derived = self.generate_all(albedo)?;
        let (height, normal, roughness) = derived.to_images()?;
        self.pack_and_compress(&TerrainMaps {
            albedo,
            height: &height,
            normal: &normal,
            roughness: &roughness,
        })
    }
}

fn timed<T>(stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let out = f()?;
    debug!(stage, elapsed_ms = start.elapsed().as_secs_f64() * 1000.0, "stage complete");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapError;

    fn generator(threads: usize) -> MapGenerator {
        MapGenerator::new(PipelineConfig::default().with_threads(threads)).unwrap()
    }

    fn textured(width: u32, height: u32) -> ImageBuffer {
        ImageBuffer::from_fn_rgba(width, height, |x, y| {
            let v = ((x * 37 + y * 91) % 97) as u8;
            [60 + v, 50 + v / 2, 40 + (x % 7) as u8 * 10, 255]
        })
        .unwrap()
    }

    #[test]
    fn generate_all_preserves_dimensions() {
        let maps = generator(2).generate_all(&textured(23, 17)).unwrap();
        assert_eq!(maps.height.dimensions(), (23, 17));
        assert_eq!(maps.normal.dimensions(), (23, 17));
        assert_eq!(maps.roughness.dimensions(), (23, 17));
    }

    #[test]
    fn pack_generated_covers_padded_blocks() {
        let (a, b) = generator(2).pack_generated(&textured(10, 6)).unwrap();
        assert_eq!(a.block_dimensions(), (3, 2));
        assert_eq!(b.blocks.len(), 6);
    }

    #[test]
    fn pack_rejects_mismatched_sizes() {
        let g = generator(1);
        let albedo = textured(8, 8);
        let small = textured(4, 8);
        let err = g
            .pack_and_compress(&TerrainMaps {
                albedo: &albedo,
                height: &small,
                normal: &albedo,
                roughness: &albedo,
            })
            .unwrap_err();
        assert!(matches!(err, MapError::DimensionMismatch(_)));
    }

    #[test]
    fn strength_comes_from_config() {
        let config = PipelineConfig {
            normal_strength: 0.0,
            ..PipelineConfig::default()
        };
        let g = MapGenerator::new(config).unwrap();
        let height = g.generate_height(&textured(16, 16)).unwrap();
        let normal = g.generate_normal(&height).unwrap();
        assert!(normal.data.iter().all(|n| n[2] == 1.0));
    }
}
