//! Dynamic weight estimation
//!
//! Each learner is scored on the trailing `window` rows of the training
//! split. Pairs of (prediction, actual) go through a fixed-capacity ring
//! buffer per learner; the weight is the inverse of that buffer's MAE plus
//! `epsilon`, normalized across learners.

use super::Ensemble;
use crate::error::{ForecastError, Result};
use crate::types::DataSplit;
use serde::Serialize;
use std::collections::VecDeque;

/// Tolerance used when checking that weights sum to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Normalized blend weights, one per learner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleWeights {
    values: Vec<f64>,
}

impl EnsembleWeights {
    /// Normalize raw non-negative scores into weights
    pub fn from_scores(scores: Vec<f64>) -> Result<Self> {
        if scores.is_empty() {
            return Err(ForecastError::config("cannot build weights for zero learners"));
        }
        if scores.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ForecastError::config(format!("weight scores must be finite and non-negative: {:?}", scores)));
        }
        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            return Err(ForecastError::config("weight scores sum to zero"));
        }
        Ok(Self {
            values: scores.into_iter().map(|s| s / total).collect(),
        })
    }

    /// Equal weights over `n` learners
    pub fn uniform(n: usize) -> Result<Self> {
        Self::from_scores(vec![1.0; n])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fixed-capacity buffer of the most recent (prediction, actual) pairs
#[derive(Debug, Clone)]
pub struct TrailingErrorWindow {
    capacity: usize,
    pairs: VecDeque<(f64, f64)>,
}

impl TrailingErrorWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pairs: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a pair, evicting the oldest once full
    pub fn push(&mut self, prediction: f64, actual: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.pairs.len() == self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back((prediction, actual));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pairs.len() == self.capacity
    }

    pub fn mean_absolute_error(&self) -> Option<f64> {
        if self.pairs.is_empty() {
            return None;
        }
        Some(self.pairs.iter().map(|(p, a)| (p - a).abs()).sum::<f64>() / self.pairs.len() as f64)
    }
}

/// Inverse-error weights: `1 / (mae + epsilon)`, normalized
pub fn weights_from_errors(maes: &[f64], epsilon: f64) -> Result<EnsembleWeights> {
    let scores = maes
        .iter()
        .map(|mae| {
            if !mae.is_finite() || *mae < 0.0 {
                Err(ForecastError::data(format!("invalid trailing error {}", mae)))
            } else {
                Ok(1.0 / (mae + epsilon))
            }
        })
        .collect::<Result<Vec<_>>>()?;
    EnsembleWeights::from_scores(scores)
}

/// Computes [`EnsembleWeights`] from recent training-split accuracy
#[derive(Debug, Clone, Copy)]
pub struct DynamicWeightEstimator {
    window: usize,
    epsilon: f64,
}

impl DynamicWeightEstimator {
    pub fn new(window: usize, epsilon: f64) -> Self {
        Self { window, epsilon }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Score every learner on the trailing rows of `training`
    ///
    /// Fails with a configuration error when the window is zero or longer
    /// than the training split; it never shrinks to fit.
    pub fn estimate(&self, ensemble: &Ensemble, training: &DataSplit<'_>) -> Result<EnsembleWeights> {
        if self.window < 1 {
            return Err(ForecastError::config("trailing window must be at least 1"));
        }
        if self.window > training.len() {
            return Err(ForecastError::config(format!(
                "trailing window of {} exceeds training split of {} rows",
                self.window,
                training.len()
            )));
        }

        let recent = training.tail(self.window);
        let predictions = ensemble.prediction_matrix(&recent)?;

        let mut windows: Vec<TrailingErrorWindow> =
            (0..ensemble.len()).map(|_| TrailingErrorWindow::new(self.window)).collect();
        for (row, &actual) in recent.targets.iter().enumerate() {
            for (learner, window) in windows.iter_mut().enumerate() {
                window.push(predictions[[row, learner]], actual);
            }
        }

        let maes: Vec<f64> = windows
            .iter()
            .map(|w| w.mean_absolute_error().unwrap_or(f64::NAN))
            .collect();
        let weights = weights_from_errors(&maes, self.epsilon)?;

        for ((kind, mae), weight) in ensemble.kinds().iter().zip(&maes).zip(weights.as_slice()) {
            tracing::debug!("{} trailing mae {:.6} -> weight {:.4}", kind, mae, weight);
        }
        Ok(weights)
    }
}
