//! File-level entry operations.
//!
//! These decode inputs, run the pipeline and persist outputs. Failures are
//! reported inside the returned result rather than as `Err`, so callers can
//! render them directly.
//!
//! Outputs are encoded in memory and staged in temporary files before any
//! target is touched. A failed call leaves existing outputs in place.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::{NamedTempFile, TempPath};
use tracing::{info, warn};

use crate::codec::{encode_image, load_image, OutputFormat};
use crate::config::PipelineConfig;
use crate::dds::encode_dds;
use crate::error::{MapError, Result};
use crate::generator::MapGenerator;
use crate::packing::TerrainMaps;
use crate::png::content_hash;

/// Failure description carried by entry results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Error kind name, e.g. `DimensionMismatch`.
    pub kind: String,
    /// Stable error code, e.g. `PHOTONIC_003`.
    pub code: String,
    pub message: String,
}

impl From<&MapError> for ErrorReport {
    fn from(err: &MapError) -> Self {
        Self {
            kind: err.kind().to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// A file written by an entry operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// BLAKE3 hash of the file contents.
    pub hash: String,
    pub size: usize,
}

/// Result of [`generate_maps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateMapsResult {
    pub success: bool,
    pub height_path: Option<PathBuf>,
    pub normal_path: Option<PathBuf>,
    pub roughness_path: Option<PathBuf>,
    /// Written files in height, normal, roughness order.
    pub files: Vec<WrittenFile>,
    pub error: Option<ErrorReport>,
}

impl GenerateMapsResult {
    fn failure(err: &MapError) -> Self {
        Self {
            success: false,
            height_path: None,
            normal_path: None,
            roughness_path: None,
            files: Vec::new(),
            error: Some(err.into()),
        }
    }
}

/// Result of [`pack_terrain_3d`] and [`pack_terrain_3d_auto`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackResult {
    pub success: bool,
    pub albedo_h_path: Option<PathBuf>,
    pub normal_r_path: Option<PathBuf>,
    /// Written files in albedo_h, normal_r order.
    pub files: Vec<WrittenFile>,
    pub error: Option<ErrorReport>,
}

impl PackResult {
    fn failure(err: &MapError) -> Self {
        Self {
            success: false,
            albedo_h_path: None,
            normal_r_path: None,
            files: Vec::new(),
            error: Some(err.into()),
        }
    }

    fn written(files: Vec<WrittenFile>) -> Self {
        Self {
            success: true,
            albedo_h_path: files.first().map(|f| f.path.clone()),
            normal_r_path: files.get(1).map(|f| f.path.clone()),
            files,
            error: None,
        }
    }
}

/// Manual-mode inputs of [`pack_terrain_3d`].
#[derive(Debug, Clone, Copy)]
pub struct PackInputs<'a> {
    pub albedo: &'a Path,
    pub height: &'a Path,
    pub normal: &'a Path,
    pub roughness: &'a Path,
}

/// Derive height, normal and roughness maps from an albedo file.
///
/// Writes `<stem>_height.<ext>`, `<stem>_normal.<ext>` and
/// `<stem>_roughness.<ext>` into `output_dir`, or beside the albedo when
/// `None`. The extension and format follow the albedo file.
pub fn generate_maps(
    albedo_path: &Path,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
) -> GenerateMapsResult {
    match try_generate_maps(albedo_path, output_dir, config) {
        Ok(files) => GenerateMapsResult {
            success: true,
            height_path: files.first().map(|f| f.path.clone()),
            normal_path: files.get(1).map(|f| f.path.clone()),
            roughness_path: files.get(2).map(|f| f.path.clone()),
            files,
            error: None,
        },
        Err(err) => {
            warn!(error = %err, code = err.code(), "map generation failed");
            GenerateMapsResult::failure(&err)
        }
    }
}

fn try_generate_maps(
    albedo_path: &Path,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Vec<WrittenFile>> {
    let format = OutputFormat::from_path(albedo_path)?;
    let ext = extension(albedo_path);
    let (dir, stem) = output_location(albedo_path, output_dir)?;

    let albedo = load_image(albedo_path)?;
    let generator = MapGenerator::new(config.clone())?;
    let (height, normal, roughness) = generator.generate_all(&albedo)?.to_images()?;

    let png = config.png.to_png_config();
    let outputs = vec![
        (
            dir.join(format!("{}_height.{}", stem, ext)),
            encode_image(&height, format, &png)?,
        ),
        (
            dir.join(format!("{}_normal.{}", stem, ext)),
            encode_image(&normal, format, &png)?,
        ),
        (
            dir.join(format!("{}_roughness.{}", stem, ext)),
            encode_image(&roughness, format, &png)?,
        ),
    ];
    persist_all(&dir, outputs)
}

/// Pack four map files into `<stem>_albedo_h.dds` and `<stem>_normal_r.dds`.
///
/// The stem comes from the albedo file. All four maps must share the same
/// dimensions; otherwise nothing is written.
pub fn pack_terrain_3d(
    inputs: PackInputs<'_>,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
) -> PackResult {
    match try_pack_terrain_3d(inputs, output_dir, config) {
        Ok(files) => PackResult::written(files),
        Err(err) => {
            warn!(error = %err, code = err.code(), "terrain packing failed");
            PackResult::failure(&err)
        }
    }
}

fn try_pack_terrain_3d(
    inputs: PackInputs<'_>,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Vec<WrittenFile>> {
    let (dir, stem) = output_location(inputs.albedo, output_dir)?;
    let albedo = load_image(inputs.albedo)?;
    let height = load_image(inputs.height)?;
    let normal = load_image(inputs.normal)?;
    let roughness = load_image(inputs.roughness)?;

    let generator = MapGenerator::new(config.clone())?;
    let (albedo_h, normal_r) = generator.pack_and_compress(&TerrainMaps {
        albedo: &albedo,
        height: &height,
        normal: &normal,
        roughness: &roughness,
    })?;
    persist_all(&dir, dds_outputs(&dir, &stem, &albedo_h, &normal_r))
}

/// Like [`pack_terrain_3d`], deriving height, normal and roughness from the
/// albedo instead of reading them.
pub fn pack_terrain_3d_auto(
    albedo_path: &Path,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
) -> PackResult {
    let run = || -> Result<Vec<WrittenFile>> {
        let (dir, stem) = output_location(albedo_path, output_dir)?;
        let albedo = load_image(albedo_path)?;
        let generator = MapGenerator::new(config.clone())?;
        let (albedo_h, normal_r) = generator.pack_generated(&albedo)?;
        persist_all(&dir, dds_outputs(&dir, &stem, &albedo_h, &normal_r))
    };
    match run() {
        Ok(files) => PackResult::written(files),
        Err(err) => {
            warn!(error = %err, code = err.code(), "terrain packing failed");
            PackResult::failure(&err)
        }
    }
}

fn dds_outputs(
    dir: &Path,
    stem: &str,
    albedo_h: &crate::bc3::CompressedTexture,
    normal_r: &crate::bc3::CompressedTexture,
) -> Vec<(PathBuf, Vec<u8>)> {
    vec![
        (dir.join(format!("{}_albedo_h.dds", stem)), encode_dds(albedo_h)),
        (dir.join(format!("{}_normal_r.dds", stem)), encode_dds(normal_r)),
    ]
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Output directory and file stem for outputs derived from `source`.
fn output_location(source: &Path, output_dir: Option<&Path>) -> Result<(PathBuf, String)> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            MapError::UnsupportedFormat(format!("'{}' has no file name", source.display()))
        })?
        .to_string();
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    Ok((dir, stem))
}

/// Write every output or none of them.
///
/// Each output is first written in full to a temporary file beside its
/// target. Targets are only replaced once every output is staged; an
/// existing target is moved aside first and restored if a later rename
/// fails, so a failed call leaves the directory as it found it.
fn persist_all(dir: &Path, outputs: Vec<(PathBuf, Vec<u8>)>) -> Result<Vec<WrittenFile>> {
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir).map_err(|e| MapError::io(dir, e))?;
    }

    let mut staged = Vec::with_capacity(outputs.len());
    for (path, data) in outputs {
        let temp = stage(&path, &data)?;
        staged.push((path, temp, data));
    }

    let mut committed: Vec<Committed> = Vec::with_capacity(staged.len());
    let mut written = Vec::with_capacity(staged.len());
    for (path, temp, data) in staged {
        match commit(&path, temp) {
            Ok(backup) => {
                info!(path = %path.display(), bytes = data.len(), "wrote output");
                written.push(WrittenFile {
                    hash: content_hash(&data),
                    size: data.len(),
                    path: path.clone(),
                });
                committed.push(Committed { path, backup });
            }
            Err(err) => {
                for done in committed.into_iter().rev() {
                    done.roll_back();
                }
                return Err(err);
            }
        }
    }
    Ok(written)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `data` to a temporary file in the target's directory.
fn stage(path: &Path, data: &[u8]) -> Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix(".photonic-")
        .tempfile_in(parent_dir(path))
        .map_err(|e| MapError::io(path, e))?;
    temp.write_all(data)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| MapError::io(path, e))?;
    Ok(temp)
}

/// Move a staged file onto `path`, returning the moved-aside previous file.
fn commit(path: &Path, temp: NamedTempFile) -> Result<Option<TempPath>> {
    let backup = if path.is_file() {
        let backup = tempfile::Builder::new()
            .prefix(".photonic-prev-")
            .tempfile_in(parent_dir(path))
            .map_err(|e| MapError::io(path, e))?
            .into_temp_path();
        std::fs::rename(path, &backup).map_err(|e| MapError::io(path, e))?;
        Some(backup)
    } else {
        None
    };

    match temp.persist(path) {
        Ok(_) => Ok(backup),
        Err(err) => {
            if let Some(backup) = &backup {
                restore(path, backup);
            }
            Err(MapError::io(path, err.error))
        }
    }
}

/// A replaced target and the file it replaced, if any.
struct Committed {
    path: PathBuf,
    backup: Option<TempPath>,
}

impl Committed {
    fn roll_back(self) {
        match &self.backup {
            Some(backup) => restore(&self.path, backup),
            None => match std::fs::remove_file(&self.path) {
                Ok(()) => warn!(path = %self.path.display(), "removed partial output"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "rollback failed"),
            },
        }
    }
}

fn restore(path: &Path, backup: &TempPath) {
    match std::fs::rename(backup, path) {
        Ok(()) => warn!(path = %path.display(), "restored previous output"),
        Err(e) => warn!(path = %path.display(), error = %e, "rollback failed"),
    }
}
