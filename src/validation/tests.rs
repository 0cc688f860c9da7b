//! Tests for walk-forward validation

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::testing;
    use crate::types::TargetVector;

    #[test]
    fn test_one_record_per_horizon_and_fold() {
        let data = testing::dataset(120, 4, 8, &[1, 7]);
        let config = testing::config(&[1, 7], 3, 8);

        let report = WalkForwardValidator::new(&config).validate(&data).unwrap();

        assert_eq!(report.records.len(), 2 * 3);
        assert_eq!(report.summaries.len(), 2);
        assert!(report.records.iter().all(|r| r.is_completed()));
        assert_eq!(report.summaries[0].completed, 3);
        assert!(report.summaries[1].rmse.unwrap().std.is_some());
    }

    #[test]
    fn test_records_in_fold_order_with_expanding_training() {
        let data = testing::dataset(500, 20, 60, &[1]);
        let config = testing::config(&[1], 5, 60);

        let records = WalkForwardValidator::new(&config)
            .validate_horizon(&data, 1)
            .unwrap();

        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.fold, i);
            assert_eq!(record.test_rows, 83);
            assert!(record.is_completed(), "fold {} failed: {:?}", i, record.status);
        }
        for pair in records.windows(2) {
            assert!(pair[0].train_rows < pair[1].train_rows);
            // each test window starts where the next fold's training ends
            assert_eq!(pair[0].train_rows + pair[0].test_rows, pair[1].train_rows);
        }
        assert_eq!(records[4].train_rows + records[4].test_rows, 500);
    }

    #[test]
    fn test_failed_folds_are_recorded() {
        // row 70 sits in fold 1's test window and fold 2's training window
        let mut values: Vec<f64> = (0..120).map(|i| testing::target_value(i, 1)).collect();
        values[70] = f64::NAN;
        let data = testing::dataset_with_targets(120, 3, 8, vec![TargetVector::new(1, values)]);
        let mut config = testing::config(&[1], 3, 8);
        config.validation.parallel_folds = false;

        let report = WalkForwardValidator::new(&config).validate(&data).unwrap();

        assert_eq!(report.records.len(), 3);
        assert!(report.records[0].is_completed());
        assert!(matches!(
            report.records[1].status,
            FoldStatus::Failed { stage: ValidationStage::Score, .. }
        ));
        assert!(matches!(
            report.records[2].status,
            FoldStatus::Failed { stage: ValidationStage::Train, .. }
        ));
        assert_eq!(report.failed().count(), 2);
        assert_eq!(report.summaries[0].completed, 1);
        assert_eq!(report.summaries[0].failed, 2);
    }

    #[test]
    fn test_window_larger_than_first_training_range_aborts() {
        let data = testing::dataset(40, 3, 8, &[1]);
        let mut config = testing::config(&[1], 3, 8);
        config.ensemble.trailing_window = 12;

        let err = WalkForwardValidator::new(&config).validate(&data).unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));
    }

    #[test]
    fn test_too_few_rows_aborts() {
        let data = testing::dataset(3, 2, 4, &[1]);
        let config = testing::config(&[1], 5, 4);

        let err = WalkForwardValidator::new(&config).validate(&data).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientRows { .. }));
    }

    #[test]
    fn test_missing_horizon_is_configuration_error() {
        let data = testing::dataset(60, 3, 8, &[1]);
        let config = testing::config(&[30], 3, 8);

        let err = WalkForwardValidator::new(&config).validate(&data).unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));
    }

    #[test]
    fn test_missing_later_horizon_fails_before_training() {
        let data = testing::dataset(60, 3, 8, &[1]);
        let mut config = testing::config(&[1, 30], 3, 8);
        // Any fold that reaches training aborts with an attention error
        config.learners.attention.d_model = 5;

        let err = WalkForwardValidator::new(&config).validate(&data).unwrap_err();

        assert!(matches!(err, ForecastError::Configuration(_)), "{}", err);
        assert!(err.to_string().contains("horizon 30"), "{}", err);
    }

    #[test]
    fn test_sequence_length_mismatch_aborts() {
        let data = testing::dataset(60, 3, 8, &[1]);
        let config = testing::config(&[1], 3, 10);

        assert!(matches!(
            WalkForwardValidator::new(&config).validate(&data),
            Err(ForecastError::Configuration(_))
        ));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let data = testing::dataset(90, 3, 8, &[1]);
        let config = testing::config(&[1], 3, 8);
        let validator = WalkForwardValidator::new(&config);

        let first = validator.validate(&data).unwrap();
        let second = validator.validate(&data).unwrap();
        assert_eq!(first.records, second.records);
    }
}
