//! Generate command implementation
//!
//! Derives height, normal and roughness maps from an albedo file.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use photonic_texture::{generate_maps, PipelineConfig};

use super::{print_failure, print_files, print_json};

/// Run the generate command
///
/// # Arguments
/// * `albedo` - Path to the albedo image
/// * `output_dir` - Output directory (default: beside the albedo)
/// * `config` - Pipeline configuration
/// * `json_output` - Whether to output machine-readable JSON
///
/// # Returns
/// Exit code: 0 on success, 1 on error
pub fn run(
    albedo: &Path,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
    json_output: bool,
) -> Result<ExitCode> {
    if !json_output {
        println!("{} {}", "Generating maps from:".cyan().bold(), albedo.display());
    }

    let result = generate_maps(albedo, output_dir, config);

    if json_output {
        print_json(&result)?;
    } else if result.success {
        println!("{} {} maps written", "OK".green().bold(), result.files.len());
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
