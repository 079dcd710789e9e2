//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::maps::DEFAULT_NORMAL_STRENGTH;
use crate::png::PngConfig;

/// PNG compression preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PngPreset {
    #[default]
    Default,
    Fast,
    Best,
}

impl PngPreset {
    pub fn to_png_config(self) -> PngConfig {
        match self {
            PngPreset::Default => PngConfig::default(),
            PngPreset::Fast => PngConfig::fast(),
            PngPreset::Best => PngConfig::best_compression(),
        }
    }
}

/// Settings for a [`crate::MapGenerator`].
///
/// Algorithm weights and thresholds are fixed; only execution and output
/// settings are configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads; 0 uses the available parallelism.
    pub threads: usize,
    /// Bump strength of the normal map.
    pub normal_strength: f64,
    /// Compression preset for PNG outputs.
    pub png: PngPreset,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            normal_strength: DEFAULT_NORMAL_STRENGTH,
            png: PngPreset::Default,
        }
    }
}

impl PipelineConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{ "threads": 4 }"#).unwrap();
        assert_eq!(
            config,
            PipelineConfig {
                threads: 4,
                ..PipelineConfig::default()
            }
        );
    }

    #[test]
    fn preset_names() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "png": "best", "normal_strength": 2.5 }"#).unwrap();
        assert_eq!(config.png, PngPreset::Best);
        assert_eq!(config.normal_strength, 2.5);
        assert_eq!(
            serde_json::to_value(PngPreset::Fast).unwrap(),
            serde_json::json!("fast")
        );
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{ "png": "ultra" }"#).is_err());
    }
}
