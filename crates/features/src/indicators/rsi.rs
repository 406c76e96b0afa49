/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Undefined for the first `period` values; the first RSI lands at index `period`.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period }
    }

    /// Rows needed before the first defined value.
    pub fn warmup(&self) -> usize {
        self.period + 1
    }

    /// RSI aligned to `closes` (oldest first).
    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; closes.len()];
        if closes.len() < self.period + 1 {
            return out;
        }

        // First average gain/loss over the initial `period` changes
        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let initial = &changes[..self.period];

        let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / self.period as f64;
        let mut avg_loss = initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>()
            / self.period as f64;
        out[self.period] = Some(rsi_value(avg_gain, avg_loss));

        // Wilder smoothing over remaining changes; change k ends at close k+1
        for (k, &change) in changes.iter().enumerate().skip(self.period) {
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { change.abs() } else { 0.0 };
            avg_gain = (avg_gain * (self.period - 1) as f64 + gain) / self.period as f64;
            avg_loss = (avg_loss * (self.period - 1) as f64 + loss) / self.period as f64;
            out[k + 1] = Some(rsi_value(avg_gain, avg_loss));
        }
        out
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
