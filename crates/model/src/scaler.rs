use features::FEATURE_COUNT;

use crate::classifier::Sample;

/// Per-column standardization: (v - mean) / std.
///
/// Uses the population standard deviation; a constant column scales by 1.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Sample,
    scale: Sample,
}

impl StandardScaler {
    /// Fit on `x`. An empty input gives the identity transform.
    pub fn fit(x: &[Sample]) -> Self {
        let mut mean = [0.0; FEATURE_COUNT];
        let mut scale = [1.0; FEATURE_COUNT];
        if x.is_empty() {
            return Self { mean, scale };
        }

        let n = x.len() as f64;
        for c in 0..FEATURE_COUNT {
            let m = x.iter().map(|s| s[c]).sum::<f64>() / n;
            let var = x.iter().map(|s| (s[c] - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            mean[c] = m;
            scale[c] = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        }
        Self { mean, scale }
    }

    pub fn transform_one(&self, sample: &Sample) -> Sample {
        let mut out = *sample;
        for (c, v) in out.iter_mut().enumerate() {
            *v = (*v - self.mean[c]) / self.scale[c];
        }
        out
    }

    pub fn transform(&self, x: &[Sample]) -> Vec<Sample> {
        x.iter().map(|s| self.transform_one(s)).collect()
    }

    pub fn mean(&self) -> &Sample {
        &self.mean
    }

    pub fn scale(&self) -> &Sample {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_columns() {
        let x = vec![
            [1.0, 10.0, 5.0, 0.0, 0.0, 0.0],
            [3.0, 30.0, 5.0, 0.0, 0.0, 0.0],
        ];
        let scaler = StandardScaler::fit(&x);
        assert_eq!(scaler.mean()[0], 2.0);
        assert_eq!(scaler.scale()[0], 1.0);
        assert_eq!(scaler.scale()[1], 10.0);

        let t = scaler.transform(&x);
        assert_eq!(t[0][0], -1.0);
        assert_eq!(t[1][1], 1.0);
        // constant column
        assert_eq!(t[0][2], 0.0);
    }

    #[test]
    fn empty_fit_is_identity() {
        let scaler = StandardScaler::fit(&[]);
        let s = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(scaler.transform_one(&s), s);
    }
}
