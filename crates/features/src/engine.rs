use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Bar, BarSeries};

use crate::config::FeatureConfig;
use crate::indicators::{AtrIndicator, RsiIndicator, SmaIndicator};

/// Model input columns, in the order `FeatureRow::values` returns them.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "rsi",
    "sma_fast",
    "sma_slow",
    "atr",
    "price_range",
    "price_change",
];

pub const FEATURE_COUNT: usize = 6;

/// One source bar plus its derived columns.
///
/// Indicator columns are `None` while their lookback is not yet satisfied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub bar: Bar,
    pub rsi: Option<f64>,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub atr: Option<f64>,
    pub price_range: f64,
    pub price_change: Option<f64>,
}

impl FeatureRow {
    /// Feature vector in `FEATURE_COLUMNS` order, or `None` if any is undefined.
    pub fn values(&self) -> Option<[f64; FEATURE_COUNT]> {
        Some([
            self.rsi?,
            self.sma_fast?,
            self.sma_slow?,
            self.atr?,
            self.price_range,
            self.price_change?,
        ])
    }

    pub fn is_complete(&self) -> bool {
        self.values().is_some()
    }
}

/// A Bar Series extended with indicator columns. Rows keep source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub instrument: String,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(instrument: impl Into<String>, rows: Vec<FeatureRow>) -> Self {
        Self {
            instrument: instrument.into(),
            rows,
        }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.bar.close).collect()
    }

    /// New table without rows that have any undefined feature.
    pub fn drop_incomplete(&self) -> FeatureTable {
        let rows: Vec<FeatureRow> = self.rows.iter().filter(|r| r.is_complete()).cloned().collect();
        debug!(
            instrument = %self.instrument,
            kept = rows.len(),
            dropped = self.rows.len() - rows.len(),
            "Dropped rows with undefined features"
        );
        FeatureTable::new(self.instrument.clone(), rows)
    }

    /// Feature vectors of complete rows, in row order.
    pub fn matrix(&self) -> Vec<[f64; FEATURE_COUNT]> {
        self.rows.iter().filter_map(FeatureRow::values).collect()
    }

    /// New table with the first `n` rows.
    pub fn head(&self, n: usize) -> FeatureTable {
        let n = n.min(self.rows.len());
        FeatureTable::new(self.instrument.clone(), self.rows[..n].to_vec())
    }

    /// New table with the last `n` rows.
    pub fn tail(&self, n: usize) -> FeatureTable {
        let start = self.rows.len().saturating_sub(n);
        FeatureTable::new(self.instrument.clone(), self.rows[start..].to_vec())
    }

    /// New table with the rows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> FeatureTable {
        let rows = indices.iter().map(|&i| self.rows[i].clone()).collect();
        FeatureTable::new(self.instrument.clone(), rows)
    }
}

/// Derive the fixed feature set from a bar series. Never drops rows.
pub fn derive(series: &BarSeries, config: &FeatureConfig) -> FeatureTable {
    let bars = series.bars();
    let closes = series.closes();

    let rsi = RsiIndicator::new(config.rsi_period).series(&closes);
    let sma_fast = SmaIndicator::new(config.sma_fast).series(&closes);
    let sma_slow = SmaIndicator::new(config.sma_slow).series(&closes);
    let atr = AtrIndicator::new(config.atr_period).series(bars);

    let rows = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| FeatureRow {
            bar: *bar,
            rsi: rsi[i],
            sma_fast: sma_fast[i],
            sma_slow: sma_slow[i],
            atr: atr[i],
            price_range: bar.high - bar.low,
            price_change: pct_change(&closes, i),
        })
        .collect();

    FeatureTable::new(series.instrument.clone(), rows)
}

/// close[i] / close[i-1] - 1; undefined at 0 or when the previous close is 0.
fn pct_change(closes: &[f64], i: usize) -> Option<f64> {
    let prev = *closes.get(i.checked_sub(1)?)?;
    if prev == 0.0 {
        return None;
    }
    Some(closes[i] / prev - 1.0)
}
