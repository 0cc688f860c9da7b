//! Fold scoring and per-horizon aggregation

use crate::error::{ForecastError, Result};
use serde::Serialize;
use std::fmt;

/// Error scores for one block of predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSet {
    pub rmse: f64,
    pub mae: f64,
    /// Share of rows where prediction and outcome fall on the same side of zero
    pub accuracy: f64,
}

pub fn score(predictions: &[f64], actual: &[f64]) -> Result<ScoreSet> {
    if predictions.len() != actual.len() {
        return Err(ForecastError::data(format!(
            "{} predictions for {} outcomes",
            predictions.len(),
            actual.len()
        )));
    }
    if predictions.is_empty() {
        return Err(ForecastError::data("cannot score an empty test window"));
    }
    crate::learner::check_finite("test outcomes", actual.iter())?;
    crate::learner::check_finite("blended predictions", predictions.iter())?;

    let n = predictions.len() as f64;
    let mut squared = 0.0;
    let mut absolute = 0.0;
    let mut hits = 0usize;
    for (p, a) in predictions.iter().zip(actual) {
        let err = p - a;
        squared += err * err;
        absolute += err.abs();
        if (*p > 0.0) == (*a > 0.0) {
            hits += 1;
        }
    }

    Ok(ScoreSet {
        rmse: (squared / n).sqrt(),
        mae: absolute / n,
        accuracy: hits as f64 / n,
    })
}

/// Where a validation run is, or where a fold stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationStage {
    Init,
    Train,
    WeightUpdate,
    Predict,
    Score,
    Aggregate,
    Report,
    Failed { fold: usize },
    Aborted,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Init => write!(f, "init"),
            ValidationStage::Train => write!(f, "train"),
            ValidationStage::WeightUpdate => write!(f, "weight_update"),
            ValidationStage::Predict => write!(f, "predict"),
            ValidationStage::Score => write!(f, "score"),
            ValidationStage::Aggregate => write!(f, "aggregate"),
            ValidationStage::Report => write!(f, "report"),
            ValidationStage::Failed { fold } => write!(f, "failed(fold {})", fold),
            ValidationStage::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FoldStatus {
    Completed(ScoreSet),
    Failed { stage: ValidationStage, reason: String },
}

/// Outcome of one (horizon, fold) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub horizon: u32,
    pub fold: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub status: FoldStatus,
}

impl MetricsRecord {
    pub fn scores(&self) -> Option<&ScoreSet> {
        match &self.status {
            FoldStatus::Completed(scores) => Some(scores),
            FoldStatus::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.scores().is_some()
    }
}

/// Mean and sample standard deviation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStat {
    pub mean: f64,
    /// `None` with fewer than two completed folds
    pub std: Option<f64>,
}

impl MetricStat {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.len() > 1).then(|| {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        });
        Some(Self { mean, std })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonSummary {
    pub horizon: u32,
    pub completed: usize,
    pub failed: usize,
    pub rmse: Option<MetricStat>,
    pub mae: Option<MetricStat>,
    pub accuracy: Option<MetricStat>,
}

impl HorizonSummary {
    /// Summarize one horizon; failed folds are counted but not averaged
    pub fn from_records(horizon: u32, records: &[MetricsRecord]) -> Self {
        let scores: Vec<&ScoreSet> = records
            .iter()
            .filter(|r| r.horizon == horizon)
            .filter_map(|r| r.scores())
            .collect();
        let failed = records
            .iter()
            .filter(|r| r.horizon == horizon && !r.is_completed())
            .count();
        let column = |f: fn(&ScoreSet) -> f64| -> Vec<f64> { scores.iter().map(|s| f(s)).collect() };

        Self {
            horizon,
            completed: scores.len(),
            failed,
            rmse: MetricStat::from_values(&column(|s| s.rmse)),
            mae: MetricStat::from_values(&column(|s| s.mae)),
            accuracy: MetricStat::from_values(&column(|s| s.accuracy)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_values() {
        let scores = score(&[1.0, -1.0, 0.5, 2.0], &[2.0, -1.0, -0.5, 2.0]).unwrap();

        assert!((scores.mae - 0.5).abs() < 1e-12);
        assert!((scores.rmse - (2.0f64 / 4.0).sqrt()).abs() < 1e-12);
        assert!((scores.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_counts_as_down() {
        let scores = score(&[0.0, 0.1], &[-0.2, 0.0]).unwrap();
        assert_eq!(scores.accuracy, 0.5);
    }

    #[test]
    fn test_score_rejects_mismatch() {
        assert!(matches!(score(&[1.0], &[1.0, 2.0]), Err(ForecastError::Data(_))));
        assert!(matches!(score(&[], &[]), Err(ForecastError::Data(_))));
        assert!(matches!(score(&[0.1], &[f64::NAN]), Err(ForecastError::Data(_))));
    }

    #[test]
    fn test_summary_skips_failed_folds() {
        let completed = |fold: usize, rmse: f64| MetricsRecord {
            horizon: 7,
            fold,
            train_rows: 10,
            test_rows: 5,
            status: FoldStatus::Completed(ScoreSet { rmse, mae: rmse / 2.0, accuracy: 0.5 }),
        };
        let records = vec![
            completed(0, 1.0),
            MetricsRecord {
                horizon: 7,
                fold: 1,
                train_rows: 15,
                test_rows: 5,
                status: FoldStatus::Failed {
                    stage: ValidationStage::Train,
                    reason: "diverged".to_string(),
                },
            },
            completed(2, 3.0),
        ];

        let summary = HorizonSummary::from_records(7, &records);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);

        let rmse = summary.rmse.unwrap();
        assert_eq!(rmse.mean, 2.0);
        assert!((rmse.std.unwrap() - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_has_no_std() {
        let stat = MetricStat::from_values(&[0.4]).unwrap();
        assert_eq!(stat.mean, 0.4);
        assert!(stat.std.is_none());
        assert!(MetricStat::from_values(&[]).is_none());
    }
}
