//! Configuration management
//!
//! Settings are read from an optional TOML file and layered with
//! `FORECAST__SECTION__KEY` environment overrides.

use crate::error::{ForecastError, Result};
use crate::learner::{AttentionParams, BoostingParams, ForestParams, RecurrentParams};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub production: ProductionConfig,
    #[serde(default)]
    pub learners: LearnersConfig,
}

/// Input files and exported tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Feature table with a date column, features and `target_return_<h>d` columns
    #[serde(default = "default_features_path")]
    pub features_path: String,
    /// Raw observations used to build sequence windows
    #[serde(default = "default_observations_path")]
    pub observations_path: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    /// Prefix of target columns; the horizon and a `d` suffix follow it
    #[serde(default = "default_target_prefix")]
    pub target_prefix: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    #[serde(default = "default_predictions_path")]
    pub predictions_path: String,
}

fn default_features_path() -> String {
    "features.csv".to_string()
}

fn default_observations_path() -> String {
    "observations.csv".to_string()
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_target_prefix() -> String {
    "target_return_".to_string()
}

fn default_metrics_path() -> String {
    "ab_test_report.csv".to_string()
}

fn default_predictions_path() -> String {
    "prediction_results.csv".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            features_path: default_features_path(),
            observations_path: default_observations_path(),
            date_column: default_date_column(),
            target_prefix: default_target_prefix(),
            metrics_path: default_metrics_path(),
            predictions_path: default_predictions_path(),
        }
    }
}

impl DataConfig {
    /// Expand `~` and environment variables in a configured path
    pub fn resolve(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::full(path).map(|p| p.into_owned()).unwrap_or_else(|_| path.to_string()))
    }
}

/// Blending and shared learner-input settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Trailing samples used to score learners for dynamic weights
    pub trailing_window: usize,
    /// Regularizer added to each MAE before inversion
    pub epsilon: f64,
    /// Expected length of every sequence window
    pub sequence_length: usize,
    /// Size of the worker pool; all cores when unset
    pub worker_threads: Option<usize>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            trailing_window: 7,
            epsilon: 1e-6,
            sequence_length: 60,
            worker_threads: None,
        }
    }
}

/// Walk-forward validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub horizons: Vec<u32>,
    pub n_splits: usize,
    /// Share of each fold's training range held back for early stopping
    pub validation_fraction: f64,
    pub parallel_folds: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 7, 30],
            n_splits: 5,
            validation_fraction: 0.1,
            parallel_folds: true,
        }
    }
}

/// Final production model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    /// Tail share of the history used as the validation split
    pub holdout_fraction: f64,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.1,
        }
    }
}

/// Per-variant learner hyperparameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnersConfig {
    pub boosting: BoostingParams,
    pub forest: ForestParams,
    pub recurrent: RecurrentParams,
    pub attention: AttentionParams,
}

impl Config {
    /// Load configuration from a file, then apply environment overrides
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with(path, Self::environment())
    }

    /// `FORECAST__<SECTION>__<KEY>` overrides
    ///
    /// Numbers and booleans are parsed; `FORECAST__VALIDATION__HORIZONS=1,7`
    /// is read as a list.
    pub(crate) fn environment() -> config::Environment {
        config::Environment::with_prefix("FORECAST")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("validation.horizons")
    }

    pub(crate) fn load_with(path: &str, environment: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(environment)
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.validation.horizons.is_empty() {
            return Err(ForecastError::config("at least one horizon is required"));
        }
        if self.validation.horizons.contains(&0) {
            return Err(ForecastError::config("horizons must be positive"));
        }
        if self.validation.n_splits == 0 {
            return Err(ForecastError::config("n_splits must be at least 1"));
        }
        if self.ensemble.trailing_window == 0 {
            return Err(ForecastError::config("trailing_window must be at least 1"));
        }
        if self.ensemble.sequence_length == 0 {
            return Err(ForecastError::config("sequence_length must be at least 1"));
        }
        if !(self.ensemble.epsilon > 0.0) {
            return Err(ForecastError::config("epsilon must be positive"));
        }
        if !(0.0 < self.validation.validation_fraction && self.validation.validation_fraction < 1.0) {
            return Err(ForecastError::config("validation_fraction must lie in (0, 1)"));
        }
        if !(0.0 < self.production.holdout_fraction && self.production.holdout_fraction < 1.0) {
            return Err(ForecastError::config("holdout_fraction must lie in (0, 1)"));
        }
        if self.ensemble.worker_threads == Some(0) {
            return Err(ForecastError::config("worker_threads must be at least 1"));
        }
        Ok(())
    }
}
