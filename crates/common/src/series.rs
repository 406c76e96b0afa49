use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Bar;

/// Ordered OHLCV series for one instrument.
///
/// Timestamps are strictly increasing. The only way to build a series from
/// raw fetch results is [`BarSeries::merge`], which enforces that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub instrument: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn empty(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            bars: Vec::new(),
        }
    }

    /// Merge raw batches into one series.
    ///
    /// Batches are applied in iteration order and a later bar replaces an
    /// earlier one with the same timestamp. Output is sorted ascending.
    pub fn merge<I>(instrument: impl Into<String>, batches: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoIterator<Item = Bar>,
    {
        let mut by_time: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
        for batch in batches {
            for bar in batch {
                by_time.insert(bar.timestamp, bar);
            }
        }
        Self {
            instrument: instrument.into(),
            bars: by_time.into_values().collect(),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<&Bar> {
        self.bars
            .binary_search_by(|b| b.timestamp.cmp(&timestamp))
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Keep only the most recent `n` bars.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.bars.len().saturating_sub(n);
        Self {
            instrument: self.instrument.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }
}
