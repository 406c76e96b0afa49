//! Average True Range (ATR).
//!
//! TR[t] = max(high-low, |high-prev_close|, |low-prev_close|), from t = 1.
//! The first ATR (index `period`) is the mean of TR[1..=period]; later values
//! use Wilder smoothing.

use common::Bar;

#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period }
    }

    pub fn warmup(&self) -> usize {
        self.period + 1
    }

    pub fn series(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let n = bars.len();
        let mut out = vec![None; n];
        if n < self.period + 1 {
            return out;
        }

        let tr = true_range(bars);
        let p = self.period as f64;
        let mut atr = tr[1..=self.period].iter().sum::<f64>() / p;
        out[self.period] = Some(atr);

        for i in (self.period + 1)..n {
            atr = (atr * (p - 1.0) + tr[i]) / p;
            out[i] = Some(atr);
        }
        out
    }
}

/// True range per bar; index 0 has no previous close and uses high - low.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, b)| {
            let hl = b.high - b.low;
            match i.checked_sub(1).map(|j| bars[j].close) {
                Some(pc) => hl.max((b.high - pc).abs()).max((b.low - pc).abs()),
                None => hl,
            }
        })
        .collect()
}
