//! Walk-forward validation
//!
//! For every horizon and expanding fold:
//! - train a fresh ensemble on the fold's training range, holding out its
//!   tail for early stopping
//! - weight the learners on the trailing rows of that range
//! - predict the test range and score it
//!
//! Data and fit failures are recorded against the fold and validation moves
//! on; configuration problems and impossible splits abort the horizon.

pub mod folds;
pub mod metrics;

#[cfg(test)]
mod tests;

pub use folds::{expanding_folds, Fold};
pub use metrics::{score, FoldStatus, HorizonSummary, MetricStat, MetricsRecord, ScoreSet, ValidationStage};

use crate::config::{Config, EnsembleConfig, LearnersConfig, ValidationConfig};
use crate::ensemble::{DynamicWeightEstimator, Ensemble, TrainingCoordinator};
use crate::error::{ForecastError, Result};
use crate::types::Dataset;
use rayon::prelude::*;
use serde::Serialize;

/// Every fold record plus the per-horizon summaries
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub records: Vec<MetricsRecord>,
    pub summaries: Vec<HorizonSummary>,
}

impl ValidationReport {
    pub fn failed(&self) -> impl Iterator<Item = &MetricsRecord> {
        self.records.iter().filter(|r| !r.is_completed())
    }
}

#[derive(Debug, Clone)]
pub struct WalkForwardValidator {
    validation: ValidationConfig,
    ensemble: EnsembleConfig,
    learners: LearnersConfig,
}

impl WalkForwardValidator {
    pub fn new(config: &Config) -> Self {
        Self {
            validation: config.validation.clone(),
            ensemble: config.ensemble.clone(),
            learners: config.learners.clone(),
        }
    }

    /// Validate every configured horizon, in order
    pub fn validate(&self, data: &Dataset) -> Result<ValidationReport> {
        tracing::info!(
            "Walk-forward validation: {} rows, horizons {:?}, {} splits [{}]",
            data.n_rows(),
            self.validation.horizons,
            self.validation.n_splits,
            ValidationStage::Init
        );
        data.check_sequence_length(self.ensemble.sequence_length)?;

        // Structural errors surface before any fold trains
        let plans = self
            .validation
            .horizons
            .iter()
            .map(|&horizon| self.checked_plan(data, horizon).map(|folds| (horizon, folds)))
            .collect::<Result<Vec<_>>>()?;

        let mut records = Vec::new();
        for (horizon, folds) in &plans {
            records.extend(self.run_horizon(data, *horizon, folds)?);
        }

        tracing::debug!("Validation stage: {}", ValidationStage::Aggregate);
        let summaries: Vec<HorizonSummary> = self
            .validation
            .horizons
            .iter()
            .map(|&h| HorizonSummary::from_records(h, &records))
            .collect();
        for s in &summaries {
            tracing::info!(
                "Horizon {}d: {} completed, {} failed, mean accuracy {}",
                s.horizon,
                s.completed,
                s.failed,
                s.accuracy
                    .map(|a| format!("{:.4}", a.mean))
                    .unwrap_or_else(|| "n/a".to_string())
            );
        }

        tracing::debug!("Validation stage: {}", ValidationStage::Report);
        Ok(ValidationReport { records, summaries })
    }

    /// All folds for one horizon, in fold order
    pub fn validate_horizon(&self, data: &Dataset, horizon: u32) -> Result<Vec<MetricsRecord>> {
        let folds = self.checked_plan(data, horizon)?;
        self.run_horizon(data, horizon, &folds)
    }

    fn checked_plan(&self, data: &Dataset, horizon: u32) -> Result<Vec<Fold>> {
        self.plan(data, horizon)
            .inspect_err(|e| tracing::warn!("Horizon {}d {}: {}", horizon, ValidationStage::Aborted, e))
    }

    fn run_horizon(&self, data: &Dataset, horizon: u32, folds: &[Fold]) -> Result<Vec<MetricsRecord>> {
        let run = |fold: &Fold| self.record_fold(data, horizon, fold);
        let records: Vec<Result<MetricsRecord>> = if self.validation.parallel_folds {
            folds.par_iter().map(run).collect()
        } else {
            folds.iter().map(run).collect()
        };
        records
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| tracing::warn!("Horizon {}d {}: {}", horizon, ValidationStage::Aborted, e))
    }

    /// Structural checks that hold for every fold of the horizon
    fn plan(&self, data: &Dataset, horizon: u32) -> Result<Vec<Fold>> {
        data.target(horizon)?;
        let folds = expanding_folds(data.n_rows(), self.validation.n_splits)?;

        let window = self.ensemble.trailing_window;
        let smallest = folds.first().map(|f| f.train.len()).unwrap_or(0);
        if window > smallest {
            return Err(ForecastError::config(format!(
                "trailing window of {} exceeds the smallest training window of {} rows",
                window, smallest
            )));
        }
        Ok(folds)
    }

    fn record_fold(&self, data: &Dataset, horizon: u32, fold: &Fold) -> Result<MetricsRecord> {
        let status = match self.run_fold(data, horizon, fold) {
            Ok(scores) => {
                tracing::info!(
                    "Horizon {}d fold {}: rmse {:.6}, mae {:.6}, accuracy {:.4}",
                    horizon,
                    fold.id,
                    scores.rmse,
                    scores.mae,
                    scores.accuracy
                );
                FoldStatus::Completed(scores)
            }
            Err((stage, e)) if e.is_recoverable() => {
                tracing::warn!(
                    "Horizon {}d {} at {}: {}",
                    horizon,
                    ValidationStage::Failed { fold: fold.id },
                    stage,
                    e
                );
                FoldStatus::Failed {
                    stage,
                    reason: e.to_string(),
                }
            }
            Err((_, e)) => return Err(e),
        };

        Ok(MetricsRecord {
            horizon,
            fold: fold.id,
            train_rows: fold.train.len(),
            test_rows: fold.test.len(),
            status,
        })
    }

    fn run_fold(
        &self,
        data: &Dataset,
        horizon: u32,
        fold: &Fold,
    ) -> std::result::Result<ScoreSet, (ValidationStage, ForecastError)> {
        let at = |stage: ValidationStage| move |e: ForecastError| (stage, e);

        let train = data.split(horizon, fold.train.clone()).map_err(at(ValidationStage::Train))?;
        let (fit, holdout) = train
            .split_tail(self.validation.validation_fraction)
            .map_err(at(ValidationStage::Train))?;

        let mut ensemble = Ensemble::new(&self.learners);
        let coordinator = TrainingCoordinator::new(self.ensemble.sequence_length);
        ensemble
            .train(&coordinator, &fit, &holdout)
            .map_err(at(ValidationStage::Train))?;

        let estimator = DynamicWeightEstimator::new(self.ensemble.trailing_window, self.ensemble.epsilon);
        let weights = estimator
            .estimate(&ensemble, &train)
            .map_err(at(ValidationStage::WeightUpdate))?;

        let test = data.split(horizon, fold.test.clone()).map_err(at(ValidationStage::Predict))?;
        let predictions = ensemble
            .predict(&test, Some(&weights))
            .map_err(at(ValidationStage::Predict))?;

        score(&predictions, test.targets).map_err(at(ValidationStage::Score))
    }
}
