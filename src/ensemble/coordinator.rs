//! Training coordinator
//!
//! Fits every base learner on the same split as independent rayon tasks,
//! joins them, then scores each on the validation split.

use crate::error::{ForecastError, Result};
use crate::learner::{BaseLearner, LearnerKind};
use crate::types::DataSplit;
use rayon::prelude::*;
use serde::Serialize;

/// Per-learner outcome of one training cycle
#[derive(Debug, Clone, Serialize)]
pub struct LearnerDiagnostics {
    pub kind: LearnerKind,
    /// Rounds kept, trees grown, or epochs run
    pub iterations: usize,
    pub train_loss: f64,
    pub validation_mse: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingSummary {
    pub learners: Vec<LearnerDiagnostics>,
}

impl TrainingSummary {
    pub fn validation_losses(&self) -> Vec<f64> {
        self.learners.iter().map(|d| d.validation_mse).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingCoordinator {
    sequence_length: usize,
}

impl TrainingCoordinator {
    pub fn new(sequence_length: usize) -> Self {
        Self { sequence_length }
    }

    /// Fit all `learners` on `train` and report validation MSE per learner
    ///
    /// The first learner error is returned after every task has joined.
    pub fn train(
        &self,
        learners: &mut [BaseLearner],
        train: &DataSplit<'_>,
        validation: &DataSplit<'_>,
    ) -> Result<TrainingSummary> {
        if validation.is_empty() {
            return Err(ForecastError::data("validation split is empty"));
        }
        for window in [train.sequences.shape()[1], validation.sequences.shape()[1]] {
            if window != self.sequence_length {
                return Err(ForecastError::config(format!(
                    "sequence window length {} differs from configured {}",
                    window, self.sequence_length
                )));
            }
        }

        let outcomes: Vec<Result<LearnerDiagnostics>> = learners
            .par_iter_mut()
            .map(|learner| {
                let report = learner.fit(train, Some(validation))?;
                let preds = learner.predict(validation)?;
                let validation_mse = mean_squared_error(&preds, validation.targets);
                Ok(LearnerDiagnostics {
                    kind: learner.kind(),
                    iterations: report.iterations,
                    train_loss: report.train_loss,
                    validation_mse,
                })
            })
            .collect();

        let learners = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        for d in &learners {
            tracing::info!(
                "{} trained: {} iterations, train loss {:.6}, validation mse {:.6}",
                d.kind,
                d.iterations,
                d.train_loss,
                d.validation_mse
            );
        }
        Ok(TrainingSummary { learners })
    }
}

pub(crate) fn mean_squared_error(preds: &[f64], actual: &[f64]) -> f64 {
    if preds.is_empty() {
        return 0.0;
    }
    preds
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum::<f64>()
        / preds.len() as f64
}
