//! Core data model
//!
//! The upstream feature pipeline hands over three aligned pieces:
//! - a [`FeatureMatrix`] of tabular rows indexed by date
//! - a [`SequenceTensor`] holding one observation window per row
//! - one [`TargetVector`] per forecast horizon
//!
//! [`Dataset`] checks the alignment once; everything downstream works on
//! borrowed [`DataSplit`] views over contiguous row ranges.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use std::collections::BTreeMap;
use std::ops::Range;

/// Tabular features, one row per date
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(dates: Vec<NaiveDate>, names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if dates.len() != values.nrows() {
            return Err(ForecastError::data(format!(
                "{} dates for {} feature rows",
                dates.len(),
                values.nrows()
            )));
        }
        if names.len() != values.ncols() {
            return Err(ForecastError::config(format!(
                "{} feature names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        if let Some(pos) = dates.windows(2).position(|w| w[0] >= w[1]) {
            return Err(ForecastError::data(format!(
                "dates must be strictly increasing: {} is followed by {}",
                dates[pos],
                dates[pos + 1]
            )));
        }
        Ok(Self { dates, names, values })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
}

/// Observation windows, shaped `[rows, window_len, n_observations]`
#[derive(Debug, Clone)]
pub struct SequenceTensor {
    values: Array3<f64>,
}

impl SequenceTensor {
    pub fn new(values: Array3<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> ArrayView3<'_, f64> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.values.shape()[0]
    }

    pub fn window_len(&self) -> usize {
        self.values.shape()[1]
    }

    pub fn n_observations(&self) -> usize {
        self.values.shape()[2]
    }
}

/// Realized outcome `horizon` steps ahead of each row
#[derive(Debug, Clone)]
pub struct TargetVector {
    pub horizon: u32,
    pub values: Vec<f64>,
}

impl TargetVector {
    pub fn new(horizon: u32, values: Vec<f64>) -> Self {
        Self { horizon, values }
    }
}

/// Aligned inputs for one run
#[derive(Debug, Clone)]
pub struct Dataset {
    features: FeatureMatrix,
    sequences: SequenceTensor,
    targets: BTreeMap<u32, TargetVector>,
}

impl Dataset {
    pub fn new(
        features: FeatureMatrix,
        sequences: SequenceTensor,
        targets: impl IntoIterator<Item = TargetVector>,
    ) -> Result<Self> {
        let n_rows = features.n_rows();
        if sequences.n_rows() != n_rows {
            return Err(ForecastError::data(format!(
                "sequence tensor has {} windows for {} feature rows",
                sequences.n_rows(),
                n_rows
            )));
        }

        let mut by_horizon = BTreeMap::new();
        for target in targets {
            if target.horizon == 0 {
                return Err(ForecastError::config("horizon must be positive"));
            }
            if target.values.len() != n_rows {
                return Err(ForecastError::data(format!(
                    "target for horizon {} has {} values for {} rows",
                    target.horizon,
                    target.values.len(),
                    n_rows
                )));
            }
            if by_horizon.insert(target.horizon, target).is_some() {
                return Err(ForecastError::config("duplicate target horizon"));
            }
        }

        Ok(Self {
            features,
            sequences,
            targets: by_horizon,
        })
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn sequences(&self) -> &SequenceTensor {
        &self.sequences
    }

    pub fn n_rows(&self) -> usize {
        self.features.n_rows()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.features.dates()
    }

    pub fn horizons(&self) -> impl Iterator<Item = u32> + '_ {
        self.targets.keys().copied()
    }

    pub fn target(&self, horizon: u32) -> Result<&TargetVector> {
        self.targets
            .get(&horizon)
            .ok_or_else(|| ForecastError::config(format!("no target vector for horizon {}", horizon)))
    }

    /// Fail unless every window has the expected length
    pub fn check_sequence_length(&self, expected: usize) -> Result<()> {
        let actual = self.sequences.window_len();
        if actual != expected {
            return Err(ForecastError::config(format!(
                "sequence windows have length {}, expected {}",
                actual, expected
            )));
        }
        Ok(())
    }

    /// Full consistency check against the configured window length
    ///
    /// Features and windows must be finite. Missing targets are left to the
    /// folds that use them.
    pub fn validate(&self, sequence_length: usize) -> Result<()> {
        self.check_sequence_length(sequence_length)?;
        if let Some(pos) = self.features.values.iter().position(|v| !v.is_finite()) {
            let row = pos / self.features.n_features().max(1);
            return Err(ForecastError::data(format!(
                "missing feature value on {}",
                self.features.dates[row]
            )));
        }
        if self.sequences.values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::data("sequence windows contain missing values"));
        }
        Ok(())
    }

    /// Borrow the rows in `range` with the targets of `horizon`
    pub fn split(&self, horizon: u32, range: Range<usize>) -> Result<DataSplit<'_>> {
        let target = self.target(horizon)?;
        if range.start > range.end || range.end > self.n_rows() {
            return Err(ForecastError::data(format!(
                "row range {:?} outside dataset of {} rows",
                range,
                self.n_rows()
            )));
        }
        Ok(DataSplit {
            dates: &self.features.dates[range.clone()],
            features: self.features.values.slice(s![range.clone(), ..]),
            sequences: self.sequences.values.slice(s![range.clone(), .., ..]),
            targets: &target.values[range],
        })
    }
}

/// Borrowed view of a contiguous block of rows
///
/// All four views have the same number of rows. Build one with
/// [`Dataset::split`] or the checked [`DataSplit::from_views`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct DataSplit<'a> {
    pub dates: &'a [NaiveDate],
    pub features: ArrayView2<'a, f64>,
    pub sequences: ArrayView3<'a, f64>,
    pub targets: &'a [f64],
}

impl<'a> DataSplit<'a> {
    /// Assemble a split from raw views, rejecting any row count mismatch
    pub fn from_views(
        dates: &'a [NaiveDate],
        features: ArrayView2<'a, f64>,
        sequences: ArrayView3<'a, f64>,
        targets: &'a [f64],
    ) -> Result<Self> {
        let rows = features.nrows();
        let windows = sequences.len_of(Axis(0));
        if dates.len() != rows || windows != rows || targets.len() != rows {
            return Err(ForecastError::data(format!(
                "split has {} dates, {} feature rows, {} windows and {} targets",
                dates.len(),
                rows,
                windows,
                targets.len()
            )));
        }
        Ok(Self {
            dates,
            features,
            sequences,
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows `range` of this split, relative to its first row
    pub fn rows(&self, range: Range<usize>) -> DataSplit<'a> {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        DataSplit {
            dates: &self.dates[start..end],
            features: self.features.slice_move(s![start..end, ..]),
            sequences: self.sequences.slice_move(s![start..end, .., ..]),
            targets: &self.targets[start..end],
        }
    }

    /// The `n` most recent rows
    pub fn tail(&self, n: usize) -> DataSplit<'a> {
        let len = self.len();
        self.rows(len.saturating_sub(n)..len)
    }

    /// Split off the trailing `fraction` of rows, keeping at least one row on each side
    pub fn split_tail(&self, fraction: f64) -> Result<(DataSplit<'a>, DataSplit<'a>)> {
        let len = self.len();
        if len < 2 {
            return Err(ForecastError::data(format!(
                "cannot carve a validation split out of {} rows",
                len
            )));
        }
        let held = ((len as f64 * fraction).round() as usize).clamp(1, len - 1);
        let cut = len - held;
        Ok((self.rows(0..cut), self.rows(cut..len)))
    }
}
