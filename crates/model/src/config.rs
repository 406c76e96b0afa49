use serde::{Deserialize, Serialize};

use crate::forest::ForestConfig;
use crate::logistic::LogisticConfig;
use crate::search::ParamGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    LogisticRegression,
}

/// Model training settings, the `[model]` table of the pipeline file.
///
/// ```toml
/// [model]
/// kind = "random_forest"
/// test_fraction = 0.2
/// split_seed = 42
/// min_rows = 50
/// grid_search = false
/// cv_folds = 5
///
/// [model.forest]
/// n_estimators = 100
/// max_depth = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub test_fraction: f64,
    pub split_seed: u64,
    /// Fewer aligned rows than this is a training error.
    pub min_rows: usize,
    /// Run a hyperparameter search before training a forest.
    pub grid_search: bool,
    pub cv_folds: usize,
    pub grid: ParamGrid,
    pub forest: ForestConfig,
    pub logistic: LogisticConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::RandomForest,
            test_fraction: 0.2,
            split_seed: 42,
            min_rows: 50,
            grid_search: false,
            cv_folds: 5,
            grid: ParamGrid::default(),
            forest: ForestConfig::default(),
            logistic: LogisticConfig::default(),
        }
    }
}
