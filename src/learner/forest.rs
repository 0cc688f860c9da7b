//! Bagged random forest regressor
//!
//! Trees are grown in parallel; tree `i` draws its bootstrap sample and
//! feature subsets from its own ChaCha stream seeded with `seed + i`, so the
//! fitted forest does not depend on thread scheduling.

use super::check_finite;
use super::tree::{RegressionTree, TreeParams};
use super::FitReport;
use crate::error::{ForecastError, Result};
use ndarray::ArrayView2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: Option<usize>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: None,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) -> Result<FitReport> {
        let n = x.nrows();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: self.params.max_features,
        };
        let params = &self.params;

        let trees: Vec<RegressionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let rows: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, &rows, &tree_params, &mut rng)
            })
            .collect();

        self.trees = trees;
        self.n_features = Some(x.ncols());

        let preds = self.predict(x)?;
        let train_loss = preds.iter().zip(y).map(|(p, a)| (p - a).powi(2)).sum::<f64>() / n as f64;
        if !train_loss.is_finite() {
            return Err(ForecastError::model_fit("random_forest", "non-finite training loss"));
        }

        Ok(FitReport {
            iterations: self.trees.len(),
            train_loss,
        })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let n_features = self
            .n_features
            .ok_or_else(|| ForecastError::config("random_forest used before fit"))?;
        if x.ncols() != n_features {
            return Err(ForecastError::config(format!(
                "random_forest fitted on {} features, got {}",
                n_features,
                x.ncols()
            )));
        }
        check_finite("random_forest inputs", x.iter())?;

        let n_trees = self.trees.len().max(1) as f64;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn data() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| ((i * (j + 3)) % 17) as f64 / 17.0);
        let y = (0..60).map(|i| x[[i, 0]] * 2.0 - x[[i, 2]]).collect();
        (x, y)
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = data();
        let params = ForestParams {
            n_trees: 25,
            ..Default::default()
        };

        let mut a = RandomForest::new(params.clone());
        let mut b = RandomForest::new(params);
        a.fit(x.view(), &y).unwrap();
        b.fit(x.view(), &y).unwrap();

        assert_eq!(a.predict(x.view()).unwrap(), b.predict(x.view()).unwrap());
    }

    #[test]
    fn test_forest_seed_changes_fit() {
        let (x, y) = data();
        let mut a = RandomForest::new(ForestParams {
            n_trees: 10,
            seed: 1,
            ..Default::default()
        });
        let mut b = RandomForest::new(ForestParams {
            n_trees: 10,
            seed: 2,
            ..Default::default()
        });
        a.fit(x.view(), &y).unwrap();
        b.fit(x.view(), &y).unwrap();

        assert_ne!(a.predict(x.view()).unwrap(), b.predict(x.view()).unwrap());
    }

    #[test]
    fn test_forest_fixed_size() {
        let (x, y) = data();
        let mut forest = RandomForest::new(ForestParams {
            n_trees: 12,
            ..Default::default()
        });
        let report = forest.fit(x.view(), &y).unwrap();

        assert_eq!(report.iterations, 12);
        assert_eq!(forest.n_trees(), 12);
    }
}
