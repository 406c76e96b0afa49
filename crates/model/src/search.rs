//! Exhaustive hyperparameter search for the random forest.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Error, Result};
use features::FeatureTable;

use crate::classifier::{Classifier, Sample};
use crate::forest::{ForestConfig, RandomForest};
use crate::metrics::accuracy;
use crate::scaler::StandardScaler;

/// Candidate values per forest hyperparameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 200],
            max_depth: vec![5, 10, 15],
            min_samples_split: vec![2, 5, 10],
        }
    }
}

impl ParamGrid {
    /// Every combination, `n_estimators` outermost.
    pub fn candidates(&self, base: ForestConfig) -> Vec<ForestConfig> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    out.push(ForestConfig {
                        n_estimators,
                        max_depth,
                        min_samples_split,
                        ..base
                    });
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchResult {
    pub best: ForestConfig,
    /// Mean cross-validated accuracy of `best`.
    pub score: f64,
    /// Every candidate with its mean score, in search order.
    pub scores: Vec<(ForestConfig, f64)>,
}

/// Contiguous k-fold boundaries; the first `n % k` folds get one extra row.
fn fold_bounds(n: usize, folds: usize) -> Vec<(usize, usize)> {
    let base = n / folds;
    let extra = n % folds;
    let mut start = 0;
    (0..folds)
        .map(|k| {
            let len = base + usize::from(k < extra);
            let bounds = (start, start + len);
            start += len;
            bounds
        })
        .collect()
}

/// Try every grid combination with `folds`-fold cross-validation and keep the
/// highest mean accuracy. The first candidate wins ties. Fields the grid does
/// not vary, such as the seed, come from `base`.
pub fn grid_search(
    table: &FeatureTable,
    labels: &[u8],
    grid: &ParamGrid,
    base: ForestConfig,
    folds: usize,
) -> Result<GridSearchResult> {
    let instrument = table.instrument.as_str();
    let x = table.matrix();

    if x.len() != labels.len() {
        return Err(Error::training(
            instrument,
            format!("{} complete rows but {} labels", x.len(), labels.len()),
        ));
    }
    if folds < 2 || x.len() < folds {
        return Err(Error::training(
            instrument,
            format!("cannot run {folds}-fold search on {} rows", x.len()),
        ));
    }

    let candidates = grid.candidates(base);
    if candidates.is_empty() {
        return Err(Error::training(instrument, "empty parameter grid"));
    }

    let bounds = fold_bounds(x.len(), folds);
    let mut scores = Vec::with_capacity(candidates.len());
    let mut best: Option<(ForestConfig, f64)> = None;

    for candidate in candidates {
        let mut total = 0.0;
        for &(lo, hi) in &bounds {
            let (x_train, y_train): (Vec<Sample>, Vec<u8>) = x[..lo]
                .iter()
                .chain(&x[hi..])
                .copied()
                .zip(labels[..lo].iter().chain(&labels[hi..]).copied())
                .unzip();

            let scaler = StandardScaler::fit(&x_train);
            let mut forest = RandomForest::new(candidate);
            forest
                .fit(&scaler.transform(&x_train), &y_train)
                .map_err(|e| Error::training(instrument, e.to_string()))?;
            let predicted = forest.predict(&scaler.transform(&x[lo..hi]));
            total += accuracy(&labels[lo..hi], &predicted);
        }

        let mean = total / folds as f64;
        debug!(
            instrument = %instrument,
            n_estimators = candidate.n_estimators,
            max_depth = candidate.max_depth,
            min_samples_split = candidate.min_samples_split,
            score = mean,
            "Evaluated grid candidate"
        );
        if best.map_or(true, |(_, s)| mean > s) {
            best = Some((candidate, mean));
        }
        scores.push((candidate, mean));
    }

    let (best, score) = best.ok_or_else(|| Error::training(instrument, "no candidate scored"))?;
    info!(
        instrument = %instrument,
        n_estimators = best.n_estimators,
        max_depth = best.max_depth,
        min_samples_split = best.min_samples_split,
        score,
        "Grid search complete"
    );
    Ok(GridSearchResult { best, score, scores })
}
