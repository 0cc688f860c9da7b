//! Expanding-window fold layout

use crate::error::{ForecastError, Result};
use serde::Serialize;
use std::ops::Range;

/// One chronological train/test split over row indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub id: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// `k` expanding folds over `n` rows
///
/// Each test block holds `n / (k + 1)` rows; the blocks tile the tail of
/// the series and every fold trains on all rows before its block. Leftover
/// rows from the integer division land in the first training window.
pub fn expanding_folds(n: usize, k: usize) -> Result<Vec<Fold>> {
    if k == 0 {
        return Err(ForecastError::config("number of splits must be at least 1"));
    }
    let test_size = n / (k + 1);
    if test_size == 0 {
        return Err(ForecastError::InsufficientRows {
            required: k + 1,
            actual: n,
        });
    }

    Ok((0..k)
        .map(|id| {
            let start = n - (k - id) * test_size;
            Fold {
                id,
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_folds_over_five_hundred_rows() {
        let folds = expanding_folds(500, 5).unwrap();

        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0].train, 0..85);
        assert_eq!(folds[0].test, 85..168);
        assert_eq!(folds[4].test, 417..500);
        for pair in folds.windows(2) {
            assert!(pair[0].train.len() < pair[1].train.len());
            assert_eq!(pair[0].test.end, pair[1].test.start);
        }
    }

    #[test]
    fn test_train_precedes_test() {
        for (n, k) in [(12, 3), (100, 5), (61, 4)] {
            for fold in expanding_folds(n, k).unwrap() {
                assert_eq!(fold.train.start, 0);
                assert_eq!(fold.train.end, fold.test.start);
                assert!(fold.test.end <= n);
            }
        }
    }

    #[test]
    fn test_zero_splits_rejected() {
        assert!(matches!(expanding_folds(100, 0), Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn test_too_few_rows() {
        let err = expanding_folds(4, 5).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientRows { required: 6, actual: 4 }));
    }
}
