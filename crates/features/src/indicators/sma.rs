/// Simple moving average of close prices.
///
/// Rolling sum, O(n). Defined from index `period - 1`.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { period }
    }

    pub fn warmup(&self) -> usize {
        self.period
    }

    pub fn series(&self, values: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; values.len()];
        let mut sum = 0.0;
        for (i, &v) in values.iter().enumerate() {
            sum += v;
            if i >= self.period {
                sum -= values[i - self.period];
            }
            if i + 1 >= self.period {
                out[i] = Some(sum / self.period as f64);
            }
        }
        out
    }
}
