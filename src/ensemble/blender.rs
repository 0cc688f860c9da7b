//! Blending of per-learner predictions

use super::weights::EnsembleWeights;
use crate::error::{ForecastError, Result};
use ndarray::ArrayView2;

/// How a blend was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Weighted,
    /// No weights were supplied; plain arithmetic mean across learners
    EqualFallback,
}

/// Combines an `[n_samples, n_learners]` prediction matrix into one column
pub struct Blender;

impl Blender {
    pub fn mode(weights: Option<&EnsembleWeights>) -> BlendMode {
        match weights {
            Some(_) => BlendMode::Weighted,
            None => BlendMode::EqualFallback,
        }
    }

    pub fn blend(predictions: ArrayView2<'_, f64>, weights: Option<&EnsembleWeights>) -> Result<Vec<f64>> {
        let n_learners = predictions.ncols();
        if n_learners == 0 {
            return Err(ForecastError::config("cannot blend zero learners"));
        }

        match weights {
            Some(weights) => {
                if weights.len() != n_learners {
                    return Err(ForecastError::config(format!(
                        "{} weights for {} learners",
                        weights.len(),
                        n_learners
                    )));
                }
                let w = ndarray::ArrayView1::from(weights.as_slice());
                Ok(predictions.dot(&w).to_vec())
            }
            None => Ok(predictions
                .rows()
                .into_iter()
                .map(|row| row.sum() / n_learners as f64)
                .collect()),
        }
    }
}
