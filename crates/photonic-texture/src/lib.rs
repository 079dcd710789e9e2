//! Photonic Texture
//!
//! Derives a PBR texture set (height, normal and roughness) from a single
//! albedo image, and packs four maps into two BC3-compressed DDS textures
//! for a terrain renderer.
//!
//! # Pipeline
//!
//! ```text
//! albedo -> height -> normal
//! albedo (+ height) -> material classification -> roughness
//! (albedo, height, normal, roughness) -> albedo_h.dds + normal_r.dds
//! ```
//!
//! - **Height**: self-guided filter, 3-level Laplacian detail fusion and
//!   tiled CLAHE on Rec. 709 luminance
//! - **Normal**: Scharr gradients stabilized by a local structure tensor
//! - **Classification**: per-pixel Metallic / Diffuse / Wood / Stone labels
//! - **Roughness**: variance, band-pass detail and metallic terms weighted by
//!   the classification
//! - **Packing**: `(R, G, B, Height)` and `(Nx, Ny, Nz, Roughness)` compressed
//!   to BC3 blocks in a DXT5 DDS container
//!
//! # Example
//!
//! ```no_run
//! use photonic_texture::{generate_maps, PipelineConfig};
//! use std::path::Path;
//!
//! let result = generate_maps(Path::new("rock.png"), None, &PipelineConfig::default());
//! assert!(result.success);
//! println!("{:?}", result.normal_path);
//! ```
//!
//! # Determinism
//!
//! Every stage splits its output into disjoint rows, tiles or blocks computed
//! from read-only inputs, so outputs are bit-identical for any worker count.
//! PNG outputs use fixed encoder settings and every written file is reported
//! with its BLAKE3 hash.

pub mod bc3;
pub mod buffer;
pub mod classify;
pub mod codec;
pub mod color;
pub mod config;
pub mod dds;
pub mod error;
pub mod filter;
pub mod generate;
pub mod generator;
pub mod maps;
pub mod packing;
pub mod parallel;
pub mod png;

// Re-export main types for convenience
pub use bc3::{Bc3Block, CompressedTexture, BLOCK_ERROR_THRESHOLD};
pub use buffer::{ImageBuffer, PixelFormat};
pub use classify::{Classification, ClassificationField, MaterialClass, MaterialClassifier};
pub use color::Color;
pub use config::{PipelineConfig, PngPreset};
pub use dds::{decode_dds, encode_dds, DdsHeader};
pub use error::{MapError, Result};
pub use generate::{
    generate_maps, pack_terrain_3d, pack_terrain_3d_auto, ErrorReport, GenerateMapsResult,
    PackInputs, PackResult, WrittenFile,
};
pub use generator::{DerivedMaps, MapGenerator};
pub use maps::{
    HeightGenerator, NormalField, NormalGenerator, RoughnessGenerator, ScalarField,
    DEFAULT_NORMAL_STRENGTH, DIFFUSE_BASELINE_ROUGHNESS,
};
pub use packing::TerrainMaps;
pub use parallel::WorkerPool;
pub use png::{PngConfig, PngError};
