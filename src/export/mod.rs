//! Tabular export
//!
//! Writes the two tables downstream consumers read:
//! - metrics: one row per (horizon, fold), failed folds flagged
//! - predictions: one row per date with `True_<h>d`, `Pred_<h>d`, `Prob_<h>d`
//!   column triples per horizon

use crate::error::{ForecastError, Result};
use crate::validation::{FoldStatus, MetricsRecord};
use chrono::NaiveDate;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Per-row metrics line as written to CSV
#[derive(Debug, Serialize)]
struct MetricsRow {
    #[serde(rename = "Horizon")]
    horizon: u32,
    #[serde(rename = "Fold")]
    fold: usize,
    #[serde(rename = "RMSE")]
    rmse: Option<f64>,
    #[serde(rename = "MAE")]
    mae: Option<f64>,
    #[serde(rename = "Accuracy")]
    accuracy: Option<f64>,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Error")]
    error: String,
}

impl From<&MetricsRecord> for MetricsRow {
    fn from(record: &MetricsRecord) -> Self {
        let (status, error) = match &record.status {
            FoldStatus::Completed(_) => ("completed", String::new()),
            FoldStatus::Failed { stage, reason } => ("failed", format!("{}: {}", stage, reason)),
        };
        let scores = record.scores();
        Self {
            horizon: record.horizon,
            fold: record.fold,
            rmse: scores.map(|s| s.rmse),
            mae: scores.map(|s| s.mae),
            accuracy: scores.map(|s| s.accuracy),
            status,
            error,
        }
    }
}

pub fn write_metrics<W: Write>(writer: W, records: &[MetricsRecord]) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    for record in records {
        writer.serialize(MetricsRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_metrics_file<P: AsRef<Path>>(path: P, records: &[MetricsRecord]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_metrics(file, records)?;
    tracing::info!("Wrote {} metrics rows to {}", records.len(), path.as_ref().display());
    Ok(())
}

/// Prediction series of one horizon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonColumns {
    pub horizon: u32,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub probability: Vec<f64>,
}

impl HorizonColumns {
    pub fn new(horizon: u32, actual: Vec<f64>, predicted: Vec<f64>) -> Self {
        let probability = probabilities(&predicted, &actual);
        Self {
            horizon,
            actual,
            predicted,
            probability,
        }
    }
}

/// Date-indexed predictions for every horizon
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionTable {
    dates: Vec<NaiveDate>,
    columns: Vec<HorizonColumns>,
}

impl PredictionTable {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            columns: Vec::new(),
        }
    }

    pub fn push(&mut self, columns: HorizonColumns) -> Result<()> {
        let n = self.dates.len();
        if columns.actual.len() != n || columns.predicted.len() != n {
            return Err(ForecastError::data(format!(
                "horizon {} has {} outcomes and {} predictions for {} dates",
                columns.horizon,
                columns.actual.len(),
                columns.predicted.len(),
                n
            )));
        }
        self.columns.push(columns);
        Ok(())
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[HorizonColumns] {
        &self.columns
    }

    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = Writer::from_writer(writer);

        let mut header = vec!["Date".to_string()];
        for c in &self.columns {
            header.push(format!("True_{}d", c.horizon));
            header.push(format!("Pred_{}d", c.horizon));
            header.push(format!("Prob_{}d", c.horizon));
        }
        writer.write_record(&header)?;

        for (i, date) in self.dates.iter().enumerate() {
            let mut row = vec![date.format("%Y-%m-%d").to_string()];
            for c in &self.columns {
                row.push(c.actual[i].to_string());
                row.push(c.predicted[i].to_string());
                row.push(c.probability[i].to_string());
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write(file)?;
        tracing::info!(
            "Wrote {} prediction rows for {} horizons to {}",
            self.dates.len(),
            self.columns.len(),
            path.as_ref().display()
        );
        Ok(())
    }
}

/// `0.5 + 0.4 * tanh(pred / std(actual))`, with sample std
///
/// A zero or non-finite spread maps every row to 0.5.
pub fn probabilities(predicted: &[f64], actual: &[f64]) -> Vec<f64> {
    let spread = sample_std(actual);
    predicted
        .iter()
        .map(|p| match spread {
            Some(s) if s > 0.0 && s.is_finite() => 0.5 + 0.4 * (p / s).tanh(),
            _ => 0.5,
        })
        .collect()
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    Some((values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt())
}
