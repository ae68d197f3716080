//! Configuration types for the band harmonization pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Locations of inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the raw `<species>.*.json.gz` files
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Directory receiving the harmonized band files
    #[serde(default = "default_harmonized_dir")]
    pub harmonized_dir: PathBuf,

    /// Band configuration list (JSON)
    #[serde(default = "default_band_config")]
    pub band_config: PathBuf,

    /// Directory receiving overview plots
    #[serde(default = "default_plot_dir")]
    pub plot_dir: PathBuf,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/HitranXsecJson")
}

fn default_harmonized_dir() -> PathBuf {
    PathBuf::from("data/harmonized_data")
}

fn default_band_config() -> PathBuf {
    PathBuf::from("band_config_list.json")
}

fn default_plot_dir() -> PathBuf {
    PathBuf::from("plots/xsec_rawdata")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            harmonized_dir: default_harmonized_dir(),
            band_config: default_band_config(),
            plot_dir: default_plot_dir(),
        }
    }
}

/// Configuration for the harmonization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizeConfig {
    /// Harmonize species concurrently on the rayon pool
    #[serde(default)]
    pub parallel: bool,

    /// Write a CSV quality report next to the harmonized files
    #[serde(default = "default_write_report")]
    pub write_report: bool,

    /// Also write uncompressed JSON copies of the band files
    #[serde(default)]
    pub write_plain_json: bool,
}

fn default_write_report() -> bool {
    true
}

impl Default for HarmonizeConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            write_report: default_write_report(),
            write_plain_json: false,
        }
    }
}

/// Configuration for overview plots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Image width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Lower edge of the cross-section axis and band rectangles [cm²]
    #[serde(default = "default_y_min")]
    pub y_min: f64,

    /// Upper edge of the cross-section axis and band rectangles [cm²]
    #[serde(default = "default_y_max")]
    pub y_max: f64,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_y_min() -> f64 {
    1e-24
}

fn default_y_max() -> f64 {
    1e-15
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            y_min: default_y_min(),
            y_max: default_y_max(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub harmonize: HarmonizeConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.paths.band_config, PathBuf::from("band_config_list.json"));
        assert!(!config.harmonize.parallel);
        assert!(config.harmonize.write_report);
        assert_eq!(config.plot.y_min, 1e-24);
        assert_eq!(config.plot.y_max, 1e-15);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "paths:\n  raw_dir: /data/raw\nharmonize:\n  parallel: true\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.paths.raw_dir, PathBuf::from("/data/raw"));
        assert_eq!(config.paths.harmonized_dir, PathBuf::from("data/harmonized_data"));
        assert!(config.harmonize.parallel);
        assert!(config.harmonize.write_report);
        assert_eq!(config.plot.width, 1920);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");

        let mut config = PipelineConfig::default();
        config.harmonize.write_plain_json = true;
        config.plot.height = 600;
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert!(loaded.harmonize.write_plain_json);
        assert_eq!(loaded.plot.height, 600);
    }
}
