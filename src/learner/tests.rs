//! Tests for the base learner contract

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::testing;
    use crate::types::DataSplit;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_standard_set_order() {
        let learners = BaseLearner::standard_set(&testing::fast_learners());
        let kinds: Vec<LearnerKind> = learners.iter().map(|l| l.kind()).collect();
        assert_eq!(kinds, LearnerKind::ALL.to_vec());
    }

    #[test]
    fn test_every_variant_fits_and_predicts() {
        let data = testing::dataset(60, 4, 8, &[1]);
        let train = data.split(1, 0..50).unwrap();
        let valid = data.split(1, 50..60).unwrap();

        for mut learner in BaseLearner::standard_set(&testing::fast_learners()) {
            let report = learner.fit(&train, Some(&valid)).unwrap();
            assert!(report.iterations > 0, "{} ran no iterations", learner.kind());

            let preds = learner.predict(&valid).unwrap();
            assert_eq!(preds.len(), 10);
            assert!(preds.iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn test_length_mismatch_is_data_error() {
        let dates = testing::dates(5);
        let x = Array2::<f64>::zeros((5, 3));
        let seq = Array3::<f64>::zeros((5, 4, 2));
        let y = vec![0.0; 4];
        let err = DataSplit::from_views(&dates, x.view(), seq.view(), &y).unwrap_err();
        assert!(matches!(err, ForecastError::Data(_)));

        let data = testing::dataset(20, 3, 4, &[1]);
        let empty = data.split(1, 5..5).unwrap();
        for mut learner in BaseLearner::standard_set(&testing::fast_learners()) {
            let err = learner.fit(&empty, None).unwrap_err();
            assert!(matches!(err, ForecastError::Data(_)), "{}: {}", learner.kind(), err);
        }
    }

    #[test]
    fn test_missing_target_is_data_error() {
        let dates = testing::dates(6);
        let x = Array2::from_shape_fn((6, 2), |(i, j)| (i + j) as f64);
        let seq = Array3::from_shape_fn((6, 3, 1), |(i, t, _)| (i + t) as f64);
        let y = vec![0.1, 0.2, f64::NAN, 0.4, 0.5, 0.6];
        let split = DataSplit::from_views(&dates, x.view(), seq.view(), &y).unwrap();

        let mut learner = BaseLearner::new(LearnerKind::Forest, &testing::fast_learners());
        assert!(matches!(learner.fit(&split, None), Err(ForecastError::Data(_))));
    }

    #[test]
    fn test_predict_width_mismatch_is_configuration_error() {
        let data = testing::dataset(40, 3, 5, &[1]);
        let train = data.split(1, 0..40).unwrap();
        let mut learner = BaseLearner::new(LearnerKind::Tree, &testing::fast_learners());
        learner.fit(&train, None).unwrap();

        let dates = testing::dates(2);
        let wide = Array2::<f64>::zeros((2, 5));
        let seq = Array3::<f64>::zeros((2, 5, 2));
        let y = vec![0.0; 2];
        let split = DataSplit::from_views(&dates, wide.view(), seq.view(), &y).unwrap();

        assert!(matches!(learner.predict(&split), Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(LearnerKind::Tree.to_string(), "gradient_boosted_tree");
        assert!(LearnerKind::Attention.is_sequence());
        assert!(!LearnerKind::Forest.is_sequence());
    }
}
