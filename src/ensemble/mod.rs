//! Stacking ensemble
//!
//! Combines the four base learners into one estimate:
//! - [`TrainingCoordinator`] fits every learner on a split in parallel
//! - [`DynamicWeightEstimator`] derives inverse-error weights from the
//!   trailing rows of the training split
//! - [`Blender`] forms the weighted (or equal-weight fallback) combination

pub mod blender;
pub mod coordinator;
pub mod weights;


pub use blender::{BlendMode, Blender};
pub use coordinator::{LearnerDiagnostics, TrainingCoordinator, TrainingSummary};
pub use weights::{
    weights_from_errors, DynamicWeightEstimator, EnsembleWeights, TrailingErrorWindow, WEIGHT_SUM_TOLERANCE,
};

use crate::config::LearnersConfig;
use crate::error::Result;
use crate::learner::{BaseLearner, LearnerKind};
use crate::types::DataSplit;
use ndarray::Array2;

/// One fresh set of base learners, owned by a single fold or production run
#[derive(Debug, Clone)]
pub struct Ensemble {
    learners: Vec<BaseLearner>,
}

impl Ensemble {
    pub fn new(config: &LearnersConfig) -> Self {
        Self {
            learners: BaseLearner::standard_set(config),
        }
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }

    pub fn kinds(&self) -> Vec<LearnerKind> {
        self.learners.iter().map(|l| l.kind()).collect()
    }

    pub fn train(
        &mut self,
        coordinator: &TrainingCoordinator,
        train: &DataSplit<'_>,
        validation: &DataSplit<'_>,
    ) -> Result<TrainingSummary> {
        coordinator.train(&mut self.learners, train, validation)
    }

    /// Predictions shaped `[n_samples, n_learners]`, columns in learner order
    pub fn prediction_matrix(&self, inputs: &DataSplit<'_>) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((inputs.len(), self.learners.len()));
        for (j, learner) in self.learners.iter().enumerate() {
            let preds = learner.predict(inputs)?;
            if preds.len() != inputs.len() {
                return Err(crate::error::ForecastError::data(format!(
                    "{} returned {} predictions for {} rows",
                    learner.kind(),
                    preds.len(),
                    inputs.len()
                )));
            }
            crate::learner::check_finite(learner.kind().name(), preds.iter())?;
            for (i, p) in preds.into_iter().enumerate() {
                matrix[[i, j]] = p;
            }
        }
        Ok(matrix)
    }

    pub fn predict(&self, inputs: &DataSplit<'_>, weights: Option<&EnsembleWeights>) -> Result<Vec<f64>> {
        let matrix = self.prediction_matrix(inputs)?;
        Blender::blend(matrix.view(), weights)
    }
}
