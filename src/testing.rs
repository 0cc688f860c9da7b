//! Deterministic fixtures shared by unit tests

use crate::config::{Config, LearnersConfig};
use crate::learner::{AttentionParams, BoostingParams, ForestParams, RecurrentParams};
use crate::types::{Dataset, FeatureMatrix, SequenceTensor, TargetVector};
use chrono::{Duration, NaiveDate};
use ndarray::{Array2, Array3};

pub fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date");
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}

/// Smooth oscillating series with both signs, so directional scores are meaningful
pub fn target_value(row: usize, horizon: u32) -> f64 {
    let t = row as f64 + horizon as f64;
    0.5 * (t * 0.11).sin() + 0.2 * (t * 0.037).cos() - 0.05
}

pub fn dataset(n_rows: usize, n_features: usize, seq_len: usize, horizons: &[u32]) -> Dataset {
    let targets = horizons
        .iter()
        .map(|&h| TargetVector::new(h, (0..n_rows).map(|i| target_value(i, h)).collect()))
        .collect();
    dataset_with_targets(n_rows, n_features, seq_len, targets)
}

pub fn dataset_with_targets(n_rows: usize, n_features: usize, seq_len: usize, targets: Vec<TargetVector>) -> Dataset {
    let n_obs = 2;
    let features = Array2::from_shape_fn((n_rows, n_features), |(i, j)| {
        let lead = target_value(i, 1);
        if j == 0 {
            lead
        } else {
            ((i * (j + 2)) as f64 * 0.07).sin()
        }
    });
    let names = (0..n_features).map(|j| format!("f{}", j)).collect();
    let sequences = Array3::from_shape_fn((n_rows, seq_len, n_obs), |(i, t, k)| {
        let step = (i + t) as f64;
        (step * 0.11).sin() + k as f64 * 0.1
    });

    Dataset::new(
        FeatureMatrix::new(dates(n_rows), names, features).expect("valid features"),
        SequenceTensor::new(sequences),
        targets,
    )
    .expect("aligned dataset")
}

/// Small learners so ensemble tests stay fast
pub fn fast_learners() -> LearnersConfig {
    LearnersConfig {
        boosting: BoostingParams {
            n_estimators: 30,
            learning_rate: 0.1,
            max_depth: 3,
            early_stopping_rounds: 5,
            ..Default::default()
        },
        forest: ForestParams {
            n_trees: 8,
            max_depth: 4,
            ..Default::default()
        },
        recurrent: RecurrentParams {
            hidden_size: 6,
            num_layers: 1,
            epochs: 10,
            learning_rate: 0.01,
            seed: 3,
        },
        attention: AttentionParams {
            d_model: 4,
            n_heads: 2,
            num_layers: 1,
            epochs: 10,
            learning_rate: 0.01,
            seed: 4,
        },
    }
}

pub fn config(horizons: &[u32], n_splits: usize, seq_len: usize) -> Config {
    let mut config = Config::default();
    config.validation.horizons = horizons.to_vec();
    config.validation.n_splits = n_splits;
    config.ensemble.sequence_length = seq_len;
    config.learners = fast_learners();
    config
}
