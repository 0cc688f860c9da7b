//! Error types for the forecasting core

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors raised by the ensemble and validation core
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Invalid static configuration (dimensions, window sizes, horizons, fold count)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or misaligned input data
    #[error("Data error: {0}")]
    Data(String),

    /// Too few rows to build even one split
    #[error("Insufficient data: need at least {required} rows, got {actual}")]
    InsufficientRows { required: usize, actual: usize },

    /// Numerical failure while training a learner
    #[error("Model fit failed for {learner}: {reason}")]
    ModelFit { learner: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl ForecastError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn model_fit(learner: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelFit {
            learner: learner.into(),
            reason: reason.into(),
        }
    }

    /// Whether a fold can record this error and move on.
    ///
    /// Data and fit failures stay local to the fold; anything else
    /// (configuration, structural shortage of rows, IO) aborts the horizon.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Data(_) | Self::ModelFit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ForecastError::data("nan in targets").is_recoverable());
        assert!(ForecastError::model_fit("gru", "loss is NaN").is_recoverable());
        assert!(!ForecastError::config("window too large").is_recoverable());
        assert!(!ForecastError::InsufficientRows { required: 6, actual: 3 }.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = ForecastError::model_fit("random_forest", "diverged");
        assert_eq!(err.to_string(), "Model fit failed for random_forest: diverged");

        let err = ForecastError::InsufficientRows { required: 10, actual: 4 };
        assert_eq!(err.to_string(), "Insufficient data: need at least 10 rows, got 4");
    }
}
