use serde::{Deserialize, Serialize};

use crate::indicators::{AtrIndicator, RsiIndicator, SmaIndicator};

/// Indicator periods for the feature engine.
///
/// Example `[features]` table in the pipeline file:
/// ```toml
/// [features]
/// rsi_period = 14
/// sma_fast = 20
/// sma_slow = 50
/// atr_period = 14
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub rsi_period: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub atr_period: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            sma_fast: 20,
            sma_slow: 50,
            atr_period: 14,
        }
    }
}

impl FeatureConfig {
    /// Reject periods the indicators cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.rsi_period < 2 {
            return Err(format!("rsi_period must be >= 2, got {}", self.rsi_period));
        }
        for (name, period) in [
            ("sma_fast", self.sma_fast),
            ("sma_slow", self.sma_slow),
            ("atr_period", self.atr_period),
        ] {
            if period == 0 {
                return Err(format!("{name} must be >= 1"));
            }
        }
        Ok(())
    }

    /// Rows a contiguous series needs before every feature is defined.
    /// Price change needs two rows.
    pub fn largest_lookback(&self) -> usize {
        [
            RsiIndicator::new(self.rsi_period).warmup(),
            SmaIndicator::new(self.sma_fast).warmup(),
            SmaIndicator::new(self.sma_slow).warmup(),
            AtrIndicator::new(self.atr_period).warmup(),
            2,
        ]
        .into_iter()
        .max()
        .unwrap_or(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lookback_is_slow_sma() {
        assert_eq!(FeatureConfig::default().largest_lookback(), 50);
    }

    #[test]
    fn validate_rejects_degenerate_periods() {
        assert!(FeatureConfig::default().validate().is_ok());
        let bad = FeatureConfig {
            rsi_period: 1,
            ..FeatureConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = FeatureConfig {
            sma_slow: 0,
            ..FeatureConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn long_rsi_can_dominate() {
        let cfg = FeatureConfig {
            rsi_period: 60,
            ..FeatureConfig::default()
        };
        assert_eq!(cfg.largest_lookback(), 61);
    }
}
