pub mod config;
pub mod engine;
pub mod indicators;
pub mod labels;

pub use config::FeatureConfig;
pub use engine::{derive, FeatureRow, FeatureTable, FEATURE_COLUMNS, FEATURE_COUNT};
pub use labels::build_labels;
