//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;

    #[test]
    fn test_ensemble_config_default() {
        let config = EnsembleConfig::default();
        assert_eq!(config.trailing_window, 7);
        assert_eq!(config.epsilon, 1e-6);
        assert_eq!(config.sequence_length, 60);
        assert!(config.worker_threads.is_none());
    }

    #[test]
    fn test_validation_config_defaults() {
        let config: ValidationConfig = toml::from_str("").unwrap();
        assert_eq!(config.horizons, vec![1, 7, 30]);
        assert_eq!(config.n_splits, 5);
        assert_eq!(config.validation_fraction, 0.1);
        assert!(config.parallel_folds);
    }

    #[test]
    fn test_data_config_defaults() {
        let config: DataConfig = toml::from_str("").unwrap();
        assert_eq!(config.date_column, "Date");
        assert_eq!(config.target_prefix, "target_return_");
        assert_eq!(config.metrics_path, "ab_test_report.csv");
        assert_eq!(config.predictions_path, "prediction_results.csv");
    }

    #[test]
    fn test_learner_defaults() {
        let config: LearnersConfig = toml::from_str("").unwrap();
        assert_eq!(config.boosting.n_estimators, 500);
        assert_eq!(config.boosting.learning_rate, 0.03);
        assert_eq!(config.boosting.early_stopping_rounds, 50);
        assert_eq!(config.forest.n_trees, 200);
        assert_eq!(config.forest.max_depth, 10);
        assert_eq!(config.recurrent.hidden_size, 64);
        assert_eq!(config.attention.n_heads, 4);
        assert_eq!(config.attention.epochs, 30);
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str(
            r#"
            [ensemble]
            trailing_window = 10

            [validation]
            horizons = [1, 7]

            [learners.forest]
            n_trees = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.ensemble.trailing_window, 10);
        assert_eq!(config.ensemble.sequence_length, 60);
        assert_eq!(config.validation.horizons, vec![1, 7]);
        assert_eq!(config.learners.forest.n_trees, 50);
        assert_eq!(config.learners.forest.max_depth, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.validation.horizons = vec![1, 0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.validation.n_splits = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.production.holdout_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ensemble.worker_threads = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.validation.n_splits, 5);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.toml");
        std::fs::write(&path, "[validation]\nn_splits = 3\n").unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.validation.n_splits, 3);
    }

    #[test]
    fn test_environment_overrides_lists_and_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let vars: std::collections::HashMap<String, String> = [
            ("FORECAST__VALIDATION__HORIZONS", "1,7"),
            ("FORECAST__VALIDATION__N_SPLITS", "3"),
            ("FORECAST__ENSEMBLE__EPSILON", "0.001"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = Config::load_with(path.to_str().unwrap(), Config::environment().source(Some(vars))).unwrap();

        assert_eq!(config.validation.horizons, vec![1, 7]);
        assert_eq!(config.validation.n_splits, 3);
        assert_eq!(config.ensemble.epsilon, 0.001);
        assert_eq!(config.data.date_column, DataConfig::default().date_column);
    }

    #[test]
    fn test_resolve_expands_variables() {
        std::env::set_var("STACKING_TEST_DIR", "/tmp/forecast");
        let path = DataConfig::resolve("$STACKING_TEST_DIR/out.csv");
        assert_eq!(path, std::path::PathBuf::from("/tmp/forecast/out.csv"));
    }
}
