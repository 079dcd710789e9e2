//! Photonic CLI library.
//!
//! Command implementations and shared setup for the `photonic` binary:
//! configuration loading and log initialization.

pub mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use photonic_texture::PipelineConfig;
use tracing_subscriber::EnvFilter;

/// Load the pipeline configuration.
///
/// Reads `config_path` as JSON when given (missing fields take their
/// defaults), then applies the `--threads` override.
pub fn load_config(config_path: Option<&Path>, threads: Option<usize>) -> Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file: {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(threads) = threads {
        config.threads = threads;
    }
    Ok(config)
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` with `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Ignore a second install (tests may run several commands per process)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_threads_flag_overrides_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("photonic.json");
        std::fs::write(&path, r#"{ "threads": 2, "png": "fast" }"#).unwrap();

        let config = load_config(Some(&path), Some(6)).unwrap();
        assert_eq!(config.threads, 6);
        assert_eq!(config.png, photonic_texture::PngPreset::Fast);
    }

    #[test]
    fn test_invalid_config_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ threads: ").unwrap();

        let err = load_config(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
