use std::fmt;

use tracing::{debug, info};

use common::{Error, Result};
use features::FeatureTable;

use crate::classifier::{Classifier, Sample};
use crate::config::{ModelConfig, ModelKind};
use crate::forest::{ForestConfig, RandomForest};
use crate::logistic::LogisticRegression;
use crate::metrics::Metrics;
use crate::scaler::StandardScaler;
use crate::split::train_test_split;

/// Trains one classifier per instrument and evaluates it on a held-out split.
pub struct Trainer {
    config: ModelConfig,
    model: Box<dyn Classifier>,
    scaler: Option<StandardScaler>,
}

impl Trainer {
    /// Trainer with the classifier named by `config.kind`.
    pub fn new(config: ModelConfig) -> Self {
        let model: Box<dyn Classifier> = match config.kind {
            ModelKind::RandomForest => Box::new(RandomForest::new(config.forest)),
            ModelKind::LogisticRegression => Box::new(LogisticRegression::new(config.logistic)),
        };
        Self::with_classifier(config, model)
    }

    pub fn with_classifier(config: ModelConfig, model: Box<dyn Classifier>) -> Self {
        Self {
            config,
            model,
            scaler: None,
        }
    }

    /// Replace the classifier with a forest using `forest` hyperparameters.
    pub fn use_forest(&mut self, forest: ForestConfig) {
        self.config.forest = forest;
        self.model = Box::new(RandomForest::new(forest));
        self.scaler = None;
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some() && self.model.is_fitted()
    }

    /// Fit on `table` (complete rows only) with aligned `labels`, returning
    /// metrics on the held-out partition.
    pub fn train(&mut self, table: &FeatureTable, labels: &[u8]) -> Result<Metrics> {
        let instrument = table.instrument.as_str();
        let x = table.matrix();

        if x.len() != table.len() {
            return Err(Error::training(
                instrument,
                format!("{} rows have undefined features", table.len() - x.len()),
            ));
        }
        if x.len() != labels.len() {
            return Err(Error::training(
                instrument,
                format!("{} rows but {} labels", x.len(), labels.len()),
            ));
        }
        if x.len() < self.config.min_rows {
            return Err(Error::training(
                instrument,
                format!("{} aligned rows, need at least {}", x.len(), self.config.min_rows),
            ));
        }

        let (train_idx, test_idx) = train_test_split(x.len(), self.config.test_fraction, self.config.split_seed);
        if train_idx.is_empty() || test_idx.is_empty() {
            return Err(Error::training(
                instrument,
                format!(
                    "degenerate split: {} train rows, {} test rows",
                    train_idx.len(),
                    test_idx.len()
                ),
            ));
        }

        let pick = |idx: &[usize]| -> (Vec<Sample>, Vec<u8>) {
            (idx.iter().map(|&i| x[i]).collect(), idx.iter().map(|&i| labels[i]).collect())
        };
        let (x_train, y_train) = pick(&train_idx);
        let (x_test, y_test) = pick(&test_idx);

        let scaler = StandardScaler::fit(&x_train);
        self.model
            .fit(&scaler.transform(&x_train), &y_train)
            .map_err(|e| Error::training(instrument, e.to_string()))?;

        let predicted = self.model.predict(&scaler.transform(&x_test));
        self.scaler = Some(scaler);

        let metrics = Metrics::evaluate(&y_test, &predicted, y_train.len());
        info!(
            instrument = %instrument,
            model = self.model.name(),
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            train_rows = metrics.train_rows,
            test_rows = metrics.test_rows,
            "Model trained"
        );
        Ok(metrics)
    }

    /// Predict direction for every complete row of `table`.
    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<u8>> {
        let scaler = match (&self.scaler, self.model.is_fitted()) {
            (Some(scaler), true) => scaler,
            _ => return Err(Error::training(&table.instrument, "no fitted model")),
        };

        let x = table.matrix();
        let predicted = self.model.predict(&scaler.transform(&x));
        debug!(
            instrument = %table.instrument,
            rows = predicted.len(),
            "Predicted directions"
        );
        Ok(predicted)
    }
}

impl fmt::Debug for Trainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("model", &self.model.name())
            .field("fitted", &self.is_fitted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use common::{Bar, BarSeries};
    use features::{build_labels, derive, FeatureConfig};

    fn series(n: usize) -> BarSeries {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.3).sin() * 4.0 + (i as f64 * 0.07).cos();
                Bar::new(t0 + Duration::hours(i as i64), c, c + 0.8, c - 0.6, c, 100.0)
            })
            .collect();
        BarSeries::merge("EURUSD", [bars])
    }

    fn small_forest() -> ModelConfig {
        ModelConfig {
            forest: ForestConfig {
                n_estimators: 10,
                ..ForestConfig::default()
            },
            ..ModelConfig::default()
        }
    }

    #[test]
    fn ten_row_series_is_a_training_error() {
        let table = derive(&series(10), &FeatureConfig::default());
        let (aligned, labels) = build_labels(&table);
        assert!(aligned.is_empty());

        let err = Trainer::new(ModelConfig::default()).train(&aligned, &labels).unwrap_err();
        assert!(matches!(err, Error::Training { ref instrument, .. } if instrument == "EURUSD"));
    }

    #[test]
    fn trains_and_reports_split_sizes() {
        let table = derive(&series(300), &FeatureConfig::default());
        let (aligned, labels) = build_labels(&table);
        // 300 - 49 complete, minus the last unlabeled row
        assert_eq!(aligned.len(), 250);

        let mut trainer = Trainer::new(small_forest());
        let metrics = trainer.train(&aligned, &labels).unwrap();
        assert_eq!(metrics.test_rows, 50);
        assert_eq!(metrics.train_rows, 200);
        assert!((0.0..=1.0).contains(&metrics.accuracy));
        assert!(trainer.is_fitted());

        let predicted = trainer.predict(&table).unwrap();
        assert_eq!(predicted.len(), 251);
        assert!(predicted.iter().all(|&p| p <= 1));
    }

    #[test]
    fn training_is_deterministic() {
        let table = derive(&series(200), &FeatureConfig::default());
        let (aligned, labels) = build_labels(&table);
        let a = Trainer::new(small_forest()).train(&aligned, &labels).unwrap();
        let b = Trainer::new(small_forest()).train(&aligned, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_mismatched_labels() {
        let table = derive(&series(200), &FeatureConfig::default());
        let (aligned, labels) = build_labels(&table);
        let err = Trainer::new(small_forest()).train(&aligned, &labels[1..]).unwrap_err();
        assert!(matches!(err, Error::Training { .. }));
    }

    #[test]
    fn predict_before_train_fails() {
        let table = derive(&series(100), &FeatureConfig::default());
        let err = Trainer::new(ModelConfig::default()).predict(&table).unwrap_err();
        assert!(err.to_string().contains("no fitted model"));
    }

    #[test]
    fn logistic_kind_trains() {
        let table = derive(&series(200), &FeatureConfig::default());
        let (aligned, labels) = build_labels(&table);
        let mut trainer = Trainer::new(ModelConfig {
            kind: ModelKind::LogisticRegression,
            ..ModelConfig::default()
        });
        trainer.train(&aligned, &labels).unwrap();
        assert_eq!(trainer.classifier().name(), "logistic_regression");
    }
}
