//! Photonic CLI - PBR map derivation and terrain texture packing
//!
//! This binary derives height, normal and roughness maps from albedo
//! textures, packs terrain maps into BC3-compressed DDS files and inspects
//! the results.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use photonic_cli::commands;
use photonic_cli::commands::pack::SourceMaps;

/// Photonic - PBR maps from a single albedo
#[derive(Parser)]
#[command(name = "photonic")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output machine-readable JSON (no colored output)
    #[arg(long, global = true)]
    json: bool,

    /// Worker threads (0 = available parallelism); overrides the config file
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Path to a pipeline config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive height, normal and roughness maps from an albedo image
    Generate {
        /// Path to the albedo image (png, jpg, tga, bmp)
        albedo: PathBuf,

        /// Output directory (default: beside the albedo)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Pack terrain maps into <stem>_albedo_h.dds and <stem>_normal_r.dds
    Pack {
        /// Path to the albedo image
        albedo: PathBuf,

        /// Height map (derived from the albedo when omitted)
        #[arg(long, requires_all = ["normal", "roughness"])]
        height: Option<PathBuf>,

        /// Normal map (derived from the albedo when omitted)
        #[arg(long, requires_all = ["height", "roughness"])]
        normal: Option<PathBuf>,

        /// Roughness map (derived from the albedo when omitted)
        #[arg(long, requires_all = ["height", "normal"])]
        roughness: Option<PathBuf>,

        /// Output directory (default: beside the albedo)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the header summary of a DDS file written by `pack`
    Inspect {
        /// Path to the DDS file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    photonic_cli::init_logging(cli.verbose);

    let result = run(cli);

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Generate { albedo, output_dir } => {
            let config = photonic_cli::load_config(cli.config.as_deref(), cli.threads)?;
            tracing::debug!(?config, "loaded configuration");
            commands::generate::run(&albedo, output_dir.as_deref(), &config, cli.json)
        }
        Commands::Pack {
            albedo,
            height,
            normal,
            roughness,
            output_dir,
        } => {
            let config = photonic_cli::load_config(cli.config.as_deref(), cli.threads)?;
            tracing::debug!(?config, "loaded configuration");
            let maps = SourceMaps {
                height,
                normal,
                roughness,
            };
            commands::pack::run(&albedo, &maps, output_dir.as_deref(), &config, cli.json)
        }
        Commands::Inspect { file } => commands::inspect::run(&file, cli.json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from(["photonic", "generate", "rock.png"]).unwrap();
        assert!(!cli.json);
        assert!(cli.threads.is_none());
        match cli.command {
            Commands::Generate { albedo, output_dir } => {
                assert_eq!(albedo, PathBuf::from("rock.png"));
                assert!(output_dir.is_none());
            }
            _ => panic!("expected generate command"),
        }
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "photonic",
            "generate",
            "rock.tga",
            "--output-dir",
            "out",
            "--json",
            "--threads",
            "4",
            "--config",
            "photonic.json",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.threads, Some(4));
        assert_eq!(cli.config.as_deref(), Some(Path::new("photonic.json")));
        match cli.command {
            Commands::Generate { output_dir, .. } => {
                assert_eq!(output_dir, Some(PathBuf::from("out")));
            }
            _ => panic!("expected generate command"),
        }
    }

    #[test]
    fn test_cli_requires_albedo() {
        assert!(Cli::try_parse_from(["photonic", "generate"]).is_err());
        assert!(Cli::try_parse_from(["photonic", "pack"]).is_err());
    }

    #[test]
    fn test_cli_parses_pack_auto() {
        let cli = Cli::try_parse_from(["photonic", "pack", "grass.png"]).unwrap();
        match cli.command {
            Commands::Pack {
                albedo,
                height,
                normal,
                roughness,
                output_dir,
            } => {
                assert_eq!(albedo, PathBuf::from("grass.png"));
                assert!(height.is_none());
                assert!(normal.is_none());
                assert!(roughness.is_none());
                assert!(output_dir.is_none());
            }
            _ => panic!("expected pack command"),
        }
    }

    #[test]
    fn test_cli_parses_pack_manual() {
        let cli = Cli::try_parse_from([
            "photonic",
            "pack",
            "grass.png",
            "--height",
            "grass_height.png",
            "--normal",
            "grass_normal.png",
            "--roughness",
            "grass_roughness.png",
            "-o",
            "packed",
        ])
        .unwrap();
        match cli.command {
            Commands::Pack {
                height,
                normal,
                roughness,
                output_dir,
                ..
            } => {
                assert_eq!(height, Some(PathBuf::from("grass_height.png")));
                assert_eq!(normal, Some(PathBuf::from("grass_normal.png")));
                assert_eq!(roughness, Some(PathBuf::from("grass_roughness.png")));
                assert_eq!(output_dir, Some(PathBuf::from("packed")));
            }
            _ => panic!("expected pack command"),
        }
    }

    #[test]
    fn test_cli_pack_maps_must_come_together() {
        let err = Cli::try_parse_from(["photonic", "pack", "grass.png", "--height", "h.png"])
            .err()
            .unwrap();
        assert!(err.to_string().contains("--normal"));
    }

    #[test]
    fn test_cli_parses_inspect() {
        let cli = Cli::try_parse_from(["photonic", "inspect", "grass_albedo_h.dds", "--verbose"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Inspect { file } => {
                assert_eq!(file, PathBuf::from("grass_albedo_h.dds"));
            }
            _ => panic!("expected inspect command"),
        }
    }
}
