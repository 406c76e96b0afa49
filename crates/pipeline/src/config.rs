use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{Error, Result};
use features::FeatureConfig;
use market::{AssemblerConfig, StreamConfig};
use model::ModelConfig;
use settings::RecommenderConfig;

/// Top-level pipeline file (TOML). Every table is optional.
///
/// Example `config/bartune.toml`:
/// ```toml
/// instruments = ["BTCUSDT", "ETHUSDT"]
/// signal_window = 20
///
/// [assembler]
/// coarse_bars = 2190
/// fine_days = 90
/// chunk_days = 3
/// request_spacing = 100
///
/// [model]
/// grid_search = false
///
/// [recommender]
/// trend_threshold = 0.7
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub instruments: Vec<String>,
    /// Complete rows at the end of the table used for the trend signal.
    pub signal_window: usize,
    pub assembler: AssemblerConfig,
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub recommender: RecommenderConfig,
    pub stream: StreamConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instruments: vec!["BTCUSDT".to_string()],
            signal_window: 20,
            assembler: AssemblerConfig::default(),
            features: FeatureConfig::default(),
            model: ModelConfig::default(),
            recommender: RecommenderConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Pipeline config not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to read pipeline config at '{}': {e}",
                    path.display()
                )))
            }
        };

        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("'{}': {e}", path.display())))?;
        info!(
            path = %path.display(),
            instruments = config.instruments.len(),
            "Pipeline config loaded"
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate().map_err(Error::Config)?;
        if self.signal_window == 0 {
            return Err(Error::Config("signal_window must be >= 1".into()));
        }
        self.assembler.validate()?;
        if !(0.0..1.0).contains(&self.model.test_fraction) {
            return Err(Error::Config(format!(
                "model.test_fraction must be in [0, 1), got {}",
                self.model.test_fraction
            )));
        }
        Ok(())
    }
}
