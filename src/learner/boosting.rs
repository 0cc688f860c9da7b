//! Gradient boosted regression trees with early stopping
//!
//! Squared-error boosting: each round fits a tree to the current residuals
//! and adds it with shrinkage. When an evaluation split is supplied, training
//! halts once `early_stopping_rounds` rounds pass without improving the
//! evaluation MSE, and the model keeps only the best-scoring prefix of trees.

use super::tree::{RegressionTree, TreeParams};
use super::{check_finite, FitReport};
use crate::error::{ForecastError, Result};
use ndarray::ArrayView2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Rounds without evaluation improvement before stopping
    pub early_stopping_rounds: usize,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 500,
            learning_rate: 0.03,
            max_depth: 6,
            min_samples_leaf: 1,
            early_stopping_rounds: 50,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

/// Gradient boosted tree learner over tabular rows
#[derive(Debug, Clone)]
pub struct GradientBoostedTree {
    params: BoostingParams,
    fitted: Option<Fitted>,
}

impl GradientBoostedTree {
    pub fn new(params: BoostingParams) -> Self {
        Self { params, fitted: None }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    /// Number of trees kept after early stopping
    pub fn n_trees(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.trees.len())
    }

    pub fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: &[f64],
        eval: Option<(ArrayView2<'_, f64>, &[f64])>,
    ) -> Result<FitReport> {
        const NAME: &str = "gradient_boosted_tree";

        let n = x.nrows();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: 2,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: None,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let rows: Vec<usize> = (0..n).collect();

        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut train_pred = vec![base_score; n];
        let mut eval_pred = eval.map(|(ex, _)| vec![base_score; ex.nrows()]);
        let mut residuals = vec![0.0; n];
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        // Training MSE after each round
        let mut round_losses = Vec::with_capacity(self.params.n_estimators);

        let mut best_loss = f64::INFINITY;
        let mut best_rounds = 0;
        let mut stale = 0;

        for round in 0..self.params.n_estimators {
            for i in 0..n {
                residuals[i] = y[i] - train_pred[i];
            }
            let tree = RegressionTree::fit(x, &residuals, &rows, &tree_params, &mut rng);
            for (i, pred) in train_pred.iter_mut().enumerate() {
                *pred += self.params.learning_rate * tree.predict_row(x.row(i));
            }

            let train_loss = mse(&train_pred, y);
            if !train_loss.is_finite() {
                return Err(ForecastError::model_fit(
                    NAME,
                    format!("training loss is {} at round {}", train_loss, round),
                ));
            }
            trees.push(tree);
            round_losses.push(train_loss);

            if let (Some((ex, ey)), Some(preds)) = (eval, eval_pred.as_mut()) {
                let tree = &trees[trees.len() - 1];
                for (i, pred) in preds.iter_mut().enumerate() {
                    *pred += self.params.learning_rate * tree.predict_row(ex.row(i));
                }
                let eval_loss = mse(preds, ey);
                if eval_loss < best_loss {
                    best_loss = eval_loss;
                    best_rounds = round + 1;
                    stale = 0;
                } else {
                    stale += 1;
                    if stale >= self.params.early_stopping_rounds {
                        tracing::debug!(
                            "{} stopped early at round {} (best {} rounds, eval mse {:.6})",
                            NAME,
                            round + 1,
                            best_rounds,
                            best_loss
                        );
                        break;
                    }
                }
            }
        }

        if eval.is_some() {
            trees.truncate(best_rounds.max(1));
        }

        let train_loss = match trees.len().checked_sub(1) {
            Some(last) => round_losses[last],
            None => mse(&train_pred, y),
        };
        let report = FitReport {
            iterations: trees.len(),
            train_loss,
        };
        self.fitted = Some(Fitted {
            base_score,
            trees,
            n_features: x.ncols(),
        });
        Ok(report)
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::config("gradient_boosted_tree used before fit"))?;
        if x.ncols() != fitted.n_features {
            return Err(ForecastError::config(format!(
                "gradient_boosted_tree fitted on {} features, got {}",
                fitted.n_features,
                x.ncols()
            )));
        }
        check_finite("gradient_boosted_tree inputs", x.iter())?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                fitted.base_score
                    + self.params.learning_rate
                        * fitted.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }
}

fn mse(pred: &[f64], actual: &[f64]) -> f64 {
    pred.iter().zip(actual).map(|(p, a)| (p - a).powi(2)).sum::<f64>() / pred.len().max(1) as f64
}
