use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::columns::{default_feature_specs, FeatureSpec};
use crate::prepare::Scaling;

pub const DEFAULT_DATA_SOURCE: &str = "http://mlr.cs.umass.edu/ml/machine-learning-databases/adult/adult.data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid config at {path}: {source}")]
    ParseToml { path: PathBuf, source: toml::de::Error },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Run settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// http(s) URL or local path of the census CSV.
    pub data_source: String,
    pub learning_rate: f64,
    pub steps: usize,
    pub periods: usize,
    /// Set to zero to disable clipping.
    pub gradient_clip_norm: f64,
    pub training_size: usize,
    pub validation_size: usize,
    /// Shuffle seed; a fresh random seed is drawn when absent.
    pub seed: Option<u64>,
    pub scaling: Scaling,
    /// Open the chart viewer after training.
    pub interactive: bool,
    pub report_path: Option<PathBuf>,
    pub features: Vec<FeatureSpec>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            data_source: DEFAULT_DATA_SOURCE.to_string(),
            learning_rate: 0.5,
            steps: 100,
            periods: 10,
            gradient_clip_norm: 5.0,
            training_size: 12281,
            validation_size: 4000,
            seed: None,
            scaling: Scaling::default(),
            interactive: true,
            report_path: None,
            features: default_feature_specs(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RunConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| Err(ConfigError::Invalid { field, reason: reason.to_string() });
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate", "must be a positive number");
        }
        if self.periods == 0 {
            return invalid("periods", "must be at least 1");
        }
        if self.steps < self.periods {
            return invalid("steps", "must be at least the number of periods");
        }
        if !self.gradient_clip_norm.is_finite() || self.gradient_clip_norm < 0.0 {
            return invalid("gradient_clip_norm", "must be a finite, non-negative number");
        }
        if self.training_size == 0 || self.validation_size == 0 {
            return invalid("training_size", "both partitions need at least one row");
        }
        if self.features.is_empty() {
            return invalid("features", "at least one feature column is required");
        }
        Ok(())
    }

    pub fn clip_norm(&self) -> Option<f64> {
        (self.gradient_clip_norm > 0.0).then_some(self.gradient_clip_norm)
    }
}
