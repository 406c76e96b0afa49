pub mod classifier;
pub mod config;
pub mod forest;
pub mod logistic;
pub mod metrics;
pub mod scaler;
pub mod search;
pub mod split;
pub mod trainer;

pub use classifier::{Classifier, Sample};
pub use config::{ModelConfig, ModelKind};
pub use forest::{DecisionTree, ForestConfig, RandomForest};
pub use logistic::{LogisticConfig, LogisticRegression};
pub use metrics::Metrics;
pub use scaler::StandardScaler;
pub use search::{grid_search, GridSearchResult, ParamGrid};
pub use split::train_test_split;
pub use trainer::Trainer;
