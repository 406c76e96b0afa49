use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::MarketSignal;

use crate::document::{clamp_to, SettingValue, SettingsDocument};

/// Rule parameters for the recommender.
///
/// ```toml
/// [recommender]
/// trend_threshold = 0.7
/// take_profit_factor = 1.2
/// stop_loss_factor = 0.8
/// take_profit_keys = ["TakeProfit"]
/// stop_loss_keys = ["StopLoss"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Trend strength must exceed this (strictly) for the rule to fire.
    pub trend_threshold: f64,
    pub take_profit_factor: f64,
    pub stop_loss_factor: f64,
    /// Setting names treated as take-profit, matched case-insensitively.
    pub take_profit_keys: Vec<String>,
    pub stop_loss_keys: Vec<String>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            trend_threshold: 0.7,
            take_profit_factor: 1.2,
            stop_loss_factor: 0.8,
            take_profit_keys: vec!["TakeProfit".into()],
            stop_loss_keys: vec!["StopLoss".into()],
        }
    }
}

impl RecommenderConfig {
    fn factor_for(&self, name: &str) -> f64 {
        let matches = |keys: &[String]| keys.iter().any(|k| k.eq_ignore_ascii_case(name));
        if matches(&self.take_profit_keys) {
            self.take_profit_factor
        } else if matches(&self.stop_loss_keys) {
            self.stop_loss_factor
        } else {
            1.0
        }
    }
}

/// Proposed current values keyed by setting name, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    values: Vec<(String, f64)>,
}

impl Recommendation {
    /// Set `name`, replacing an earlier proposal for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, current, proposed)` for every value that differs from `doc`.
    pub fn changes(&self, doc: &SettingsDocument) -> Vec<(String, f64, f64)> {
        self.iter()
            .filter_map(|(name, proposed)| {
                let current = doc.get(name)?.current()?;
                (current != proposed).then(|| (name.to_string(), current, proposed))
            })
            .collect()
    }
}

/// Propose values for every tunable setting given the market signal.
///
/// Above the trend threshold, take-profit settings are widened and stop-loss
/// settings tightened by their factors. Every proposal is clamped into the
/// setting's `[min, max]`.
pub fn recommend(doc: &SettingsDocument, signal: &MarketSignal, config: &RecommenderConfig) -> Recommendation {
    let trend = signal.clamped_trend();
    let trending = trend > config.trend_threshold;

    let mut recommendation = Recommendation::default();
    for setting in doc.tunables() {
        let SettingValue::Constrained { current, min, max, .. } = setting.value else {
            continue;
        };
        let factor = if trending { config.factor_for(&setting.name) } else { 1.0 };
        let proposed = clamp_to(current * factor, min, max);
        debug!(
            name = %setting.name,
            section = %setting.section,
            current,
            proposed,
            "Recommended value"
        );
        recommendation.insert(setting.name.clone(), proposed);
    }

    info!(
        source = doc.source(),
        trend,
        trending,
        values = recommendation.len(),
        "Recommendation ready"
    );
    recommendation
}
