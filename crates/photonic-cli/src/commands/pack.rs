//! Pack command implementation
//!
//! Packs albedo, height, normal and roughness maps into the two BC3/DDS
//! terrain textures. With only an albedo, the other three maps are derived.

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use photonic_texture::{pack_terrain_3d, pack_terrain_3d_auto, PackInputs, PipelineConfig};

use super::{print_failure, print_files, print_json};

/// Maps supplied alongside the albedo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMaps {
    pub height: Option<PathBuf>,
    pub normal: Option<PathBuf>,
    pub roughness: Option<PathBuf>,
}

/// Run the pack command
///
/// # Returns
/// Exit code: 0 on success, 1 on error
pub fn run(
    albedo: &Path,
    maps: &SourceMaps,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
    json_output: bool,
) -> Result<ExitCode> {
    let result = match (&maps.height, &maps.normal, &maps.roughness) {
        (Some(height), Some(normal), Some(roughness)) => {
            if !json_output {
                println!("{} {}", "Packing maps for:".cyan().bold(), albedo.display());
            }
            pack_terrain_3d(
                PackInputs {
                    albedo,
                    height,
                    normal,
                    roughness,
                },
                output_dir,
                config,
            )
        }
        (None, None, None) => {
            if !json_output {
                println!(
                    "{} {} {}",
                    "Packing maps for:".cyan().bold(),
                    albedo.display(),
                    "(derived height, normal, roughness)".dimmed()
                );
            }
            pack_terrain_3d_auto(albedo, output_dir, config)
        }
        _ => anyhow::bail!("--height, --normal and --roughness must be given together"),
    };

    if json_output {
        print_json(&result)?;
    } else if result.success {
        println!("{} terrain textures written", "OK".green().bold());
        print_files(&result.files);
    } else if let Some(report) = &result.error {
        print_failure(report);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_maps_are_rejected() {
        let maps = SourceMaps {
            height: Some(PathBuf::from("h.png")),
            ..SourceMaps::default()
        };
        let err = run(
            Path::new("albedo.png"),
            &maps,
            None,
            &PipelineConfig::default(),
            true,
        )
        .unwrap_err();
        assert!(err.to_string().contains("given together"));
    }
}
