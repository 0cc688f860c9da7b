//! CSV data adapter
//!
//! Builds a [`Dataset`] from two flat files:
//! - a features file with a date column, feature columns and
//!   `<prefix><h>d` target columns
//! - an observations file with a date column and raw series columns
//!
//! Observations are z-scored per column over the full file. The sequence
//! window of a feature row is the `sequence_length` observations ending on
//! the same date. Rows with missing cells or too little history are dropped.

use crate::config::Config;
use crate::error::{ForecastError, Result};
use crate::types::{Dataset, FeatureMatrix, SequenceTensor, TargetVector};
use chrono::NaiveDate;
use csv::{Reader, StringRecord};
use ndarray::{Array2, Array3};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column naming and window settings for the loader
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub date_column: String,
    pub target_prefix: String,
    pub sequence_length: usize,
}

impl LoaderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            date_column: config.data.date_column.clone(),
            target_prefix: config.data.target_prefix.clone(),
            sequence_length: config.ensemble.sequence_length,
        }
    }

    /// Horizon encoded in a target column name, e.g. `target_return_7d` -> 7
    fn target_horizon(&self, column: &str) -> Option<u32> {
        column
            .strip_prefix(self.target_prefix.as_str())?
            .strip_suffix('d')?
            .parse()
            .ok()
    }
}

/// Parsed observations file
#[derive(Debug, Clone)]
struct Observations {
    dates: Vec<NaiveDate>,
    values: Array2<f64>,
}

pub struct DataLoader;

impl DataLoader {
    pub fn load(config: &Config) -> Result<Dataset> {
        let features = crate::config::DataConfig::resolve(&config.data.features_path);
        let observations = crate::config::DataConfig::resolve(&config.data.observations_path);
        Self::load_paths(features, observations, &LoaderOptions::from_config(config))
    }

    pub fn load_paths<P: AsRef<Path>>(features: P, observations: P, options: &LoaderOptions) -> Result<Dataset> {
        tracing::info!(
            "Loading features from {} and observations from {}",
            features.as_ref().display(),
            observations.as_ref().display()
        );
        let features = Reader::from_path(features.as_ref())?;
        let observations = Reader::from_path(observations.as_ref())?;
        Self::load_readers(features, observations, options)
    }

    pub fn load_readers<F: Read, O: Read>(
        mut features: Reader<F>,
        mut observations: Reader<O>,
        options: &LoaderOptions,
    ) -> Result<Dataset> {
        if options.sequence_length == 0 {
            return Err(ForecastError::config("sequence_length must be at least 1"));
        }
        let observations = read_observations(&mut observations, options)?;
        let by_date: HashMap<NaiveDate, usize> =
            observations.dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let headers = features.headers()?.clone();
        let date_idx = column_index(&headers, &options.date_column)?;
        let mut feature_cols = Vec::new();
        let mut target_cols = Vec::new();
        for (i, name) in headers.iter().enumerate() {
            if i == date_idx {
                continue;
            }
            match options.target_horizon(name) {
                Some(h) => target_cols.push((i, h)),
                None => feature_cols.push((i, name.to_string())),
            }
        }
        if target_cols.is_empty() {
            return Err(ForecastError::data(format!(
                "features file has no `{}<h>d` target columns",
                options.target_prefix
            )));
        }

        let l = options.sequence_length;
        let n_obs = observations.values.ncols();
        let mut dates = Vec::new();
        let mut rows: Vec<f64> = Vec::new();
        let mut windows: Vec<f64> = Vec::new();
        let mut targets: Vec<Vec<f64>> = vec![Vec::new(); target_cols.len()];
        let (mut incomplete, mut short_history) = (0usize, 0usize);

        for record in features.records() {
            let record = record?;
            let date = parse_date(&record, date_idx)?;

            let features_row: Option<Vec<f64>> = feature_cols.iter().map(|(i, _)| parse_cell(&record, *i)).collect();
            let target_row: Option<Vec<f64>> = target_cols.iter().map(|(i, _)| parse_cell(&record, *i)).collect();
            let (Some(features_row), Some(target_row)) = (features_row, target_row) else {
                incomplete += 1;
                continue;
            };

            let end = match by_date.get(&date) {
                Some(&end) if end + 1 >= l => end,
                _ => {
                    short_history += 1;
                    continue;
                }
            };

            dates.push(date);
            rows.extend(features_row);
            for (column, value) in targets.iter_mut().zip(target_row) {
                column.push(value);
            }
            windows.extend(observations.values.slice(ndarray::s![end + 1 - l..=end, ..]).iter().copied());
        }

        if incomplete > 0 {
            tracing::warn!("Dropped {} feature rows with missing cells", incomplete);
        }
        if short_history > 0 {
            tracing::warn!(
                "Dropped {} feature rows without {} observations of history",
                short_history,
                l
            );
        }
        if dates.is_empty() {
            return Err(ForecastError::InsufficientRows { required: 1, actual: 0 });
        }

        let n = dates.len();
        let names = feature_cols.into_iter().map(|(_, name)| name).collect();
        let values = Array2::from_shape_vec((n, rows.len() / n), rows)
            .map_err(|e| ForecastError::data(format!("feature matrix shape: {}", e)))?;
        let sequences = Array3::from_shape_vec((n, l, n_obs), windows)
            .map_err(|e| ForecastError::data(format!("sequence tensor shape: {}", e)))?;
        let targets = target_cols
            .iter()
            .zip(targets)
            .map(|((_, h), values)| TargetVector::new(*h, values));

        tracing::info!(
            "Loaded {} rows, {} features, {} observation series, horizons {:?}",
            n,
            values.ncols(),
            n_obs,
            target_cols.iter().map(|(_, h)| *h).collect::<Vec<_>>()
        );
        let dataset = Dataset::new(FeatureMatrix::new(dates, names, values)?, SequenceTensor::new(sequences), targets)?;
        dataset.validate(l)?;
        Ok(dataset)
    }
}

fn read_observations<R: Read>(reader: &mut Reader<R>, options: &LoaderOptions) -> Result<Observations> {
    let headers = reader.headers()?.clone();
    let date_idx = column_index(&headers, &options.date_column)?;
    let cols: Vec<usize> = (0..headers.len()).filter(|&i| i != date_idx).collect();
    if cols.is_empty() {
        return Err(ForecastError::data("observations file has no series columns"));
    }

    let mut dates = Vec::new();
    let mut flat = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record?;
        let date = parse_date(&record, date_idx)?;
        match cols.iter().map(|&i| parse_cell(&record, i)).collect::<Option<Vec<f64>>>() {
            Some(row) => {
                dates.push(date);
                flat.extend(row);
            }
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::warn!("Dropped {} observation rows with missing cells", dropped);
    }
    if let Some(pos) = dates.windows(2).position(|w| w[0] >= w[1]) {
        return Err(ForecastError::data(format!(
            "observation dates must be strictly increasing at {}",
            dates[pos + 1]
        )));
    }

    let mut values = Array2::from_shape_vec((dates.len(), cols.len()), flat)
        .map_err(|e| ForecastError::data(format!("observation shape: {}", e)))?;
    standardize(&mut values);
    Ok(Observations { dates, values })
}

/// Z-score each column in place; constant columns are only centred
fn standardize(values: &mut Array2<f64>) {
    let n = values.nrows();
    if n == 0 {
        return;
    }
    for mut column in values.columns_mut() {
        let mean = column.sum() / n as f64;
        let std = if n > 1 {
            (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        let scale = if std > 0.0 { std } else { 1.0 };
        column.mapv_inplace(|v| (v - mean) / scale);
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ForecastError::data(format!("missing `{}` column", name)))
}

fn parse_date(record: &StringRecord, idx: usize) -> Result<NaiveDate> {
    let raw = record.get(idx).unwrap_or("").trim();
    // tolerate timestamps such as `2024-01-02 00:00:00`
    let day = raw.split([' ', 'T']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(day, DATE_FORMAT)
        .map_err(|e| ForecastError::data(format!("invalid date `{}`: {}", raw, e)))
}

/// `None` for empty, unparsable or non-finite cells
fn parse_cell(record: &StringRecord, idx: usize) -> Option<f64> {
    record
        .get(idx)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
