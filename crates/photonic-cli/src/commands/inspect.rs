//! Inspect command implementation
//!
//! Summarizes a DXT5 DDS file written by `pack`.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use photonic_texture::{decode_dds, DdsHeader};

use super::print_json;

/// Summary of a DDS file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdsSummary {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub mip_map_count: u32,
    pub linear_size: u32,
    pub blocks_x: u32,
    pub blocks_y: u32,
    pub file_size: usize,
    /// BLAKE3 hash of the whole file.
    pub hash: String,
}

/// Read and validate a DDS file.
pub fn summarize(path: &Path) -> Result<DdsSummary> {
    let data =
        fs::read(path).with_context(|| format!("Failed to read DDS file: {}", path.display()))?;
    let header = DdsHeader::parse(&data)?;
    let texture = decode_dds(&data)?;
    let (blocks_x, blocks_y) = texture.block_dimensions();

    Ok(DdsSummary {
        width: header.width,
        height: header.height,
        format: String::from_utf8_lossy(&header.fourcc).into_owned(),
        mip_map_count: header.mip_map_count,
        linear_size: header.linear_size,
        blocks_x,
        blocks_y,
        file_size: data.len(),
        hash: blake3::hash(&data).to_hex().to_string(),
    })
}

/// Run the inspect command
///
/// # Returns
/// Exit code: 0 on success, 1 on error
pub fn run(path: &Path, json_output: bool) -> Result<ExitCode> {
    let summary = summarize(path)?;

    if json_output {
        print_json(&summary)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {}", "DDS:".cyan().bold(), path.display());
    println!("  {} {}x{}", "Size:".dimmed(), summary.width, summary.height);
    println!("  {} {}", "Format:".dimmed(), summary.format);
    println!("  {} {}", "Mip levels:".dimmed(), summary.mip_map_count);
    println!(
        "  {} {}x{} ({} bytes)",
        "Blocks:".dimmed(),
        summary.blocks_x,
        summary.blocks_y,
        summary.linear_size
    );
    println!("  {} {}", "BLAKE3:".dimmed(), summary.hash);
    Ok(ExitCode::SUCCESS)
}
