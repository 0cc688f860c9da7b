//! Base learners
//!
//! Four model families behind one fit/predict contract:
//! - Gradient boosted trees with early stopping (tabular rows)
//! - Random forest with seeded bootstrap (tabular rows)
//! - GRU recurrent regressor (sequence windows, candle)
//! - Self-attention regressor (sequence windows, candle)
//!
//! [`BaseLearner`] is a tagged variant rather than a trait object: the
//! ensemble always holds exactly these four, and each picks its own input
//! (tabular or sequence) out of a [`DataSplit`].

pub mod attention;
pub mod boosting;
pub mod forest;
mod network;
pub mod recurrent;
pub mod tree;

#[cfg(test)]
mod tests;

pub use attention::{AttentionParams, AttentionSequenceModel};
pub use boosting::{BoostingParams, GradientBoostedTree};
pub use forest::{ForestParams, RandomForest};
pub use recurrent::{RecurrentParams, RecurrentSequenceModel};

use crate::config::LearnersConfig;
use crate::error::{ForecastError, Result};
use crate::types::DataSplit;
use serde::Serialize;
use std::fmt;

/// Learner family tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LearnerKind {
    Tree,
    Forest,
    Recurrent,
    Attention,
}

impl LearnerKind {
    pub const ALL: [LearnerKind; 4] = [
        LearnerKind::Tree,
        LearnerKind::Forest,
        LearnerKind::Recurrent,
        LearnerKind::Attention,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LearnerKind::Tree => "gradient_boosted_tree",
            LearnerKind::Forest => "random_forest",
            LearnerKind::Recurrent => "recurrent_sequence",
            LearnerKind::Attention => "attention_sequence",
        }
    }

    /// Whether the learner reads sequence windows instead of tabular rows
    pub fn is_sequence(&self) -> bool {
        matches!(self, LearnerKind::Recurrent | LearnerKind::Attention)
    }
}

impl fmt::Display for LearnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one `fit` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    /// Boosting rounds kept, trees grown, or epochs run
    pub iterations: usize,
    pub train_loss: f64,
}

/// One base learner of the ensemble
#[derive(Debug, Clone)]
pub enum BaseLearner {
    Tree(GradientBoostedTree),
    Forest(RandomForest),
    Recurrent(RecurrentSequenceModel),
    Attention(AttentionSequenceModel),
}

impl BaseLearner {
    /// Fresh, unfitted learner of the given family
    pub fn new(kind: LearnerKind, config: &LearnersConfig) -> Self {
        match kind {
            LearnerKind::Tree => BaseLearner::Tree(GradientBoostedTree::new(config.boosting.clone())),
            LearnerKind::Forest => BaseLearner::Forest(RandomForest::new(config.forest.clone())),
            LearnerKind::Recurrent => {
                BaseLearner::Recurrent(RecurrentSequenceModel::new(config.recurrent.clone()))
            }
            LearnerKind::Attention => {
                BaseLearner::Attention(AttentionSequenceModel::new(config.attention.clone()))
            }
        }
    }

    /// One fresh learner per family, in [`LearnerKind::ALL`] order
    pub fn standard_set(config: &LearnersConfig) -> Vec<BaseLearner> {
        LearnerKind::ALL
            .iter()
            .map(|&kind| BaseLearner::new(kind, config))
            .collect()
    }

    pub fn kind(&self) -> LearnerKind {
        match self {
            BaseLearner::Tree(_) => LearnerKind::Tree,
            BaseLearner::Forest(_) => LearnerKind::Forest,
            BaseLearner::Recurrent(_) => LearnerKind::Recurrent,
            BaseLearner::Attention(_) => LearnerKind::Attention,
        }
    }

    /// Fit on `train`; the boosted trees use `validation` for early stopping
    pub fn fit(&mut self, train: &DataSplit<'_>, validation: Option<&DataSplit<'_>>) -> Result<FitReport> {
        let kind = self.kind();
        check_fit_inputs(kind, train)?;

        match self {
            BaseLearner::Tree(model) => {
                let eval = match validation {
                    Some(v) if !v.is_empty() => {
                        check_fit_inputs(kind, v)?;
                        Some((v.features, v.targets))
                    }
                    _ => None,
                };
                model.fit(train.features, train.targets, eval)
            }
            BaseLearner::Forest(model) => model.fit(train.features, train.targets),
            BaseLearner::Recurrent(model) => model.fit(train.sequences, train.targets),
            BaseLearner::Attention(model) => model.fit(train.sequences, train.targets),
        }
    }

    pub fn predict(&self, inputs: &DataSplit<'_>) -> Result<Vec<f64>> {
        match self {
            BaseLearner::Tree(model) => model.predict(inputs.features),
            BaseLearner::Forest(model) => model.predict(inputs.features),
            BaseLearner::Recurrent(model) => model.predict(inputs.sequences),
            BaseLearner::Attention(model) => model.predict(inputs.sequences),
        }
    }
}

fn check_fit_inputs(kind: LearnerKind, split: &DataSplit<'_>) -> Result<()> {
    let rows = if kind.is_sequence() {
        split.sequences.len_of(ndarray::Axis(0))
    } else {
        split.features.nrows()
    };
    if rows != split.targets.len() {
        return Err(ForecastError::data(format!(
            "{} got {} input rows for {} targets",
            kind,
            rows,
            split.targets.len()
        )));
    }
    if rows == 0 {
        return Err(ForecastError::data(format!("{} cannot fit on an empty split", kind)));
    }

    check_finite(&format!("{} targets", kind), split.targets.iter())?;
    if kind.is_sequence() {
        check_finite(&format!("{} inputs", kind), split.sequences.iter())
    } else {
        check_finite(&format!("{} inputs", kind), split.features.iter())
    }
}

/// DataError on the first NaN or infinite value
pub(crate) fn check_finite<'a>(what: &str, values: impl IntoIterator<Item = &'a f64>) -> Result<()> {
    match values.into_iter().position(|v| !v.is_finite()) {
        Some(pos) => Err(ForecastError::data(format!("{} contain a missing value at position {}", what, pos))),
        None => Ok(()),
    }
}
