//! Forecast pipeline
//!
//! Runs walk-forward validation, then trains one production ensemble per
//! horizon on the full history and collects its prediction series. All
//! parallel work runs inside a rayon pool sized by `worker_threads`.

use crate::config::Config;
use crate::ensemble::{DynamicWeightEstimator, Ensemble, EnsembleWeights, TrainingCoordinator, TrainingSummary};
use crate::error::{ForecastError, Result};
use crate::export::{HorizonColumns, PredictionTable};
use crate::types::Dataset;
use crate::validation::{ValidationReport, WalkForwardValidator};

/// Production ensemble output for one horizon
#[derive(Debug, Clone)]
pub struct ProductionForecast {
    pub horizon: u32,
    pub weights: EnsembleWeights,
    pub training: TrainingSummary,
    /// One prediction per dataset row
    pub predictions: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: ValidationReport,
    pub predictions: PredictionTable,
}

pub struct ForecastPipeline {
    config: Config,
}

impl ForecastPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn validate(&self, data: &Dataset) -> Result<ValidationReport> {
        let validator = WalkForwardValidator::new(&self.config);
        self.install(|| validator.validate(data))
    }

    /// Train the production ensemble for `horizon`
    ///
    /// The history splits at `1 - holdout_fraction`; learners fit on the
    /// head with early stopping on the tail, weights come from the trailing
    /// rows of the head, and every row of the history is predicted.
    pub fn train_production(&self, data: &Dataset, horizon: u32) -> Result<ProductionForecast> {
        self.install(|| self.production_ensemble(data, horizon))
    }

    /// Validation followed by production training for every horizon
    pub fn run(&self, data: &Dataset) -> Result<PipelineOutput> {
        self.install(|| {
            let report = WalkForwardValidator::new(&self.config).validate(data)?;

            let mut predictions = PredictionTable::new(data.dates().to_vec());
            for &horizon in &self.config.validation.horizons {
                let forecast = self.production_ensemble(data, horizon)?;
                let actual = data.target(horizon)?.values.clone();
                predictions.push(HorizonColumns::new(horizon, actual, forecast.predictions))?;
            }
            Ok(PipelineOutput { report, predictions })
        })
    }

    fn production_ensemble(&self, data: &Dataset, horizon: u32) -> Result<ProductionForecast> {
        data.check_sequence_length(self.config.ensemble.sequence_length)?;
        let history = data.split(horizon, 0..data.n_rows())?;
        let (train, holdout) = history.split_tail(self.config.production.holdout_fraction)?;
        tracing::info!(
            "Training production ensemble for {}d on {} rows, {} held out",
            horizon,
            train.len(),
            holdout.len()
        );

        let mut ensemble = Ensemble::new(&self.config.learners);
        let coordinator = TrainingCoordinator::new(self.config.ensemble.sequence_length);
        let training = ensemble.train(&coordinator, &train, &holdout)?;

        let estimator =
            DynamicWeightEstimator::new(self.config.ensemble.trailing_window, self.config.ensemble.epsilon);
        let weights = estimator.estimate(&ensemble, &train)?;
        tracing::info!("Production weights for {}d: {:?}", horizon, weights.as_slice());

        let predictions = ensemble.predict(&history, Some(&weights))?;
        Ok(ProductionForecast {
            horizon,
            weights,
            training,
            predictions,
        })
    }

    fn install<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> Result<T> + Send,
    {
        match self.config.ensemble.worker_threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ForecastError::config(format!("worker pool: {}", e)))?;
                pool.install(f)
            }
            None => f(),
        }
    }
}
