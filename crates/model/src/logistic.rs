//! Logistic regression trained with batch gradient descent.

use serde::{Deserialize, Serialize};
use tracing::debug;

use common::Result;
use features::FEATURE_COUNT;

use crate::classifier::{check_fit_input, Classifier, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once the log loss improves by less than this.
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 1000,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    config: LogisticConfig,
    weights: Option<[f64; FEATURE_COUNT]>,
    bias: f64,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            weights: None,
            bias: 0.0,
        }
    }

    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let e = z.exp();
            e / (1.0 + e)
        }
    }

    fn linear(weights: &[f64; FEATURE_COUNT], bias: f64, sample: &Sample) -> f64 {
        weights.iter().zip(sample).map(|(w, v)| w * v).sum::<f64>() + bias
    }

    fn log_loss(y: &[u8], p: &[f64]) -> f64 {
        let eps = 1e-15;
        -y.iter()
            .zip(p)
            .map(|(&t, &p)| {
                let p = p.clamp(eps, 1.0 - eps);
                if t == 1 {
                    p.ln()
                } else {
                    (1.0 - p).ln()
                }
            })
            .sum::<f64>()
            / y.len() as f64
    }

    /// Probability of the up class, or `None` before fitting.
    pub fn predict_proba(&self, sample: &Sample) -> Option<f64> {
        self.weights
            .as_ref()
            .map(|w| Self::sigmoid(Self::linear(w, self.bias, sample)))
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticConfig::default())
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn fit(&mut self, x: &[Sample], y: &[u8]) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.len() as f64;

        let mut weights = [0.0; FEATURE_COUNT];
        let mut bias = 0.0;
        let mut prev_loss = f64::INFINITY;
        let mut iterations = 0;

        for _ in 0..self.config.max_iter {
            iterations += 1;
            let p: Vec<f64> = x
                .iter()
                .map(|s| Self::sigmoid(Self::linear(&weights, bias, s)))
                .collect();

            let mut dw = [0.0; FEATURE_COUNT];
            let mut db = 0.0;
            for ((sample, &t), &pi) in x.iter().zip(y).zip(&p) {
                let err = pi - f64::from(t);
                for (g, v) in dw.iter_mut().zip(sample) {
                    *g += err * v;
                }
                db += err;
            }
            for (w, g) in weights.iter_mut().zip(&dw) {
                *w -= self.config.learning_rate * g / n;
            }
            bias -= self.config.learning_rate * db / n;

            let loss = Self::log_loss(y, &p);
            if (prev_loss - loss).abs() < self.config.tolerance {
                break;
            }
            prev_loss = loss;
        }

        debug!(rows = x.len(), iterations, "Fitted logistic regression");
        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &[Sample]) -> Vec<u8> {
        x.iter()
            .map(|s| u8::from(self.predict_proba(s).unwrap_or(0.0) >= 0.5))
            .collect()
    }

    fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }
}
