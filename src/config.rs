//! Analysis configuration loaded from JSON with sensible defaults.
//!
//! ```json
//! {
//!   "subsample": { "n": 250, "seed": 42 },
//!   "reduction": "max",
//!   "mask_threshold": 0.5,
//!   "max_plotted": 500
//! }
//! ```
//!
//! Every field is optional; missing fields take their default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::set::Reduction;

/// File the viewer looks for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rusty-hsi.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Seeded random subsampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubsampleConfig {
    /// Rows to draw (with replacement).
    pub n: usize,
    pub seed: u64,
}

impl Default for SubsampleConfig {
    fn default() -> Self {
        Self { n: 250, seed: 42 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub subsample: SubsampleConfig,
    /// How descriptor scores within a set are combined.
    pub reduction: Reduction,
    /// Mask pixels strictly above this normalized intensity are in-region.
    pub mask_threshold: f32,
    /// Upper bound on the number of lines drawn in the spectral plot.
    pub max_plotted: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            subsample: SubsampleConfig::default(),
            reduction: Reduction::Max,
            mask_threshold: 0.5,
            max_plotted: 500,
        }
    }
}

impl AnalysisConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("Using config {}", path.display());
            Self::load_from_file(path)
        } else {
            log::debug!("No config at {}; using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.mask_threshold) {
            return Err(ConfigError::Invalid(format!(
                "mask_threshold must be within [0, 1], got {}",
                self.mask_threshold
            )));
        }
        if self.reduction == Reduction::TopKMean(0) {
            return Err(ConfigError::Invalid("top_k_mean needs k >= 1".into()));
        }
        if self.max_plotted == 0 {
            return Err(ConfigError::Invalid("max_plotted must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.subsample, SubsampleConfig { n: 250, seed: 42 });
        assert_eq!(config.reduction, Reduction::Max);
    }

    #[test]
    fn test_partial_override() {
        let config = AnalysisConfig::from_json_str(
            r#"{ "subsample": { "seed": 7 }, "reduction": { "top_k_mean": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.subsample.n, 250);
        assert_eq!(config.subsample.seed, 7);
        assert_eq!(config.reduction, Reduction::TopKMean(3));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{ "mask_threshold": 1.5 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{ "reduction": { "top_k_mean": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{ "seed": 1 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_or_default() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(
            AnalysisConfig::load_or_default(&missing).unwrap(),
            AnalysisConfig::default()
        );

        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{ "reduction": "mean", "max_plotted": 10 }"#).unwrap();
        let config = AnalysisConfig::load_or_default(&path).unwrap();
        assert_eq!(config.reduction, Reduction::Mean);
        assert_eq!(config.max_plotted, 10);
    }
}
