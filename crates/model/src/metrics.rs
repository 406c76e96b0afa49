use serde::{Deserialize, Serialize};

/// Held-out evaluation of a trained classifier.
///
/// Precision and recall are weighted by each class's support in the truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl Metrics {
    pub fn evaluate(truth: &[u8], predicted: &[u8], train_rows: usize) -> Self {
        Self {
            accuracy: accuracy(truth, predicted),
            precision: weighted_precision(truth, predicted),
            recall: weighted_recall(truth, predicted),
            train_rows,
            test_rows: truth.len(),
        }
    }
}

/// Fraction of matching labels; 0 for empty input.
pub fn accuracy(truth: &[u8], predicted: &[u8]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class (true positives, predicted count, support).
fn class_counts(truth: &[u8], predicted: &[u8], class: u8) -> (usize, usize, usize) {
    let tp = truth
        .iter()
        .zip(predicted)
        .filter(|(&t, &p)| t == class && p == class)
        .count();
    let predicted_n = predicted.iter().filter(|&&p| p == class).count();
    let support = truth.iter().filter(|&&t| t == class).count();
    (tp, predicted_n, support)
}

fn weighted(truth: &[u8], predicted: &[u8], per_class: impl Fn(usize, usize, usize) -> f64) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    [0u8, 1u8]
        .iter()
        .map(|&c| {
            let (tp, predicted_n, support) = class_counts(truth, predicted, c);
            if support == 0 {
                return 0.0;
            }
            per_class(tp, predicted_n, support) * support as f64 / truth.len() as f64
        })
        .sum()
}

pub fn weighted_precision(truth: &[u8], predicted: &[u8]) -> f64 {
    weighted(truth, predicted, |tp, predicted_n, _| ratio(tp, predicted_n))
}

pub fn weighted_recall(truth: &[u8], predicted: &[u8]) -> f64 {
    weighted(truth, predicted, |tp, _, support| ratio(tp, support))
}
