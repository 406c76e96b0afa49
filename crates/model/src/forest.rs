//! Gini decision trees and a bootstrap random forest.
//!
//! Each tree `i` draws its bootstrap sample and its per-node feature subsets
//! from `ChaCha8Rng::seed_from_u64(seed + i)`, so a fixed seed gives the same
//! forest on every run.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::Result;
use features::FEATURE_COUNT;

use crate::classifier::{check_fit_input, Classifier, Sample};

/// Forest hyperparameters.
///
/// ```toml
/// [model.forest]
/// n_estimators = 100
/// max_depth = 10
/// min_samples_split = 2
/// seed = 42
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Gini impurity of a node with `up` positives out of `n`.
fn gini(up: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = up as f64 / n as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

/// Majority class; ties go to 0.
fn majority(up: usize, n: usize) -> u8 {
    u8::from(up * 2 > n)
}

/// A single CART classification tree.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
    root: Option<Node>,
}

impl DecisionTree {
    pub fn new(max_depth: usize, min_samples_split: usize, max_features: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            max_features: max_features.clamp(1, FEATURE_COUNT),
            root: None,
        }
    }

    /// Fit on the rows of `x` listed in `indices` (may repeat for bootstrap).
    pub fn fit_indices(&mut self, x: &[Sample], y: &[u8], indices: &[usize], rng: &mut ChaCha8Rng) {
        self.root = Some(self.build(x, y, indices, 0, rng));
    }

    fn build(&self, x: &[Sample], y: &[u8], indices: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> Node {
        let n = indices.len();
        let up = indices.iter().filter(|&&i| y[i] == 1).count();

        if depth >= self.max_depth || n < self.min_samples_split || up == 0 || up == n {
            return Node::Leaf {
                class: majority(up, n),
            };
        }

        match self.best_split(x, y, indices, up, rng) {
            Some((feature, threshold, left, right)) => Node::Split {
                feature,
                threshold,
                left: Box::new(self.build(x, y, &left, depth + 1, rng)),
                right: Box::new(self.build(x, y, &right, depth + 1, rng)),
            },
            None => Node::Leaf {
                class: majority(up, n),
            },
        }
    }

    /// Best Gini split over a random subset of `max_features` columns.
    /// Thresholds are midpoints between adjacent distinct values.
    fn best_split(
        &self,
        x: &[Sample],
        y: &[u8],
        indices: &[usize],
        total_up: usize,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
        let n = indices.len();
        let parent = gini(total_up, n);

        let mut columns: Vec<usize> = (0..FEATURE_COUNT).collect();
        columns.shuffle(rng);
        columns.truncate(self.max_features);

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();

        for &f in &columns {
            order.sort_by(|&a, &b| x[a][f].total_cmp(&x[b][f]));

            let mut left_up = 0;
            for k in 1..n {
                if y[order[k - 1]] == 1 {
                    left_up += 1;
                }
                let lo = x[order[k - 1]][f];
                let hi = x[order[k]][f];
                if hi <= lo {
                    continue;
                }

                let (nl, nr) = (k, n - k);
                let weighted =
                    (nl as f64 * gini(left_up, nl) + nr as f64 * gini(total_up - left_up, nr)) / n as f64;
                let gain = parent - weighted;
                if gain > best.map_or(1e-12, |(_, _, g)| g) {
                    best = Some((f, lo + (hi - lo) / 2.0, gain));
                }
            }
        }

        let (feature, threshold, _) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[i][feature] <= threshold);
        if left.is_empty() || right.is_empty() {
            return None;
        }
        Some((feature, threshold, left, right))
    }

    pub fn predict_one(&self, sample: &Sample) -> u8 {
        let mut node = match &self.root {
            Some(root) => root,
            None => return 0,
        };
        loop {
            match node {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

/// Bagged ensemble of Gini trees with sqrt feature subsampling.
#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn max_features() -> usize {
        ((FEATURE_COUNT as f64).sqrt() as usize).max(1)
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&mut self, x: &[Sample], y: &[u8]) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.len();

        self.trees = (0..self.config.n_estimators.max(1))
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut tree = DecisionTree::new(
                    self.config.max_depth,
                    self.config.min_samples_split,
                    Self::max_features(),
                );
                tree.fit_indices(x, y, &sample, &mut rng);
                tree
            })
            .collect();

        debug!(
            trees = self.trees.len(),
            rows = n,
            max_depth = self.config.max_depth,
            "Fitted random forest"
        );
        Ok(())
    }

    /// Majority vote across trees; ties go to 0.
    fn predict(&self, x: &[Sample]) -> Vec<u8> {
        if self.trees.is_empty() {
            return vec![0; x.len()];
        }
        x.iter()
            .map(|s| {
                let up = self.trees.iter().filter(|t| t.predict_one(s) == 1).count();
                majority(up, self.trees.len())
            })
            .collect()
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Up iff column 0 > 0.5; other columns are noise-free constants.
    fn threshold_data(n: usize) -> (Vec<Sample>, Vec<u8>) {
        let x: Vec<Sample> = (0..n)
            .map(|i| {
                let v = i as f64 / n as f64;
                [v, 1.0, 2.0, 3.0, 4.0, 5.0]
            })
            .collect();
        let y = x.iter().map(|s| u8::from(s[0] > 0.5)).collect();
        (x, y)
    }

    #[test]
    fn gini_bounds() {
        assert_eq!(gini(0, 10), 0.0);
        assert_eq!(gini(10, 10), 0.0);
        assert!((gini(5, 10) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_tree_learns_threshold() {
        let (x, y) = threshold_data(100);
        let indices: Vec<usize> = (0..x.len()).collect();
        let mut tree = DecisionTree::new(5, 2, FEATURE_COUNT);
        tree.fit_indices(&x, &y, &indices, &mut ChaCha8Rng::seed_from_u64(1));

        assert_eq!(tree.predict_one(&[0.9, 1.0, 2.0, 3.0, 4.0, 5.0]), 1);
        assert_eq!(tree.predict_one(&[0.1, 1.0, 2.0, 3.0, 4.0, 5.0]), 0);
        assert!(tree.depth() >= 2);
    }

    #[test]
    fn zero_max_depth_is_a_single_leaf() {
        let (x, y) = threshold_data(40);
        let indices: Vec<usize> = (0..x.len()).collect();
        let mut tree = DecisionTree::new(0, 2, FEATURE_COUNT);
        tree.fit_indices(&x, &y, &indices, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn forest_fits_separable_data() {
        let (x, y) = threshold_data(200);
        let mut forest = RandomForest::new(ForestConfig {
            n_estimators: 25,
            ..ForestConfig::default()
        });
        forest.fit(&x, &y).unwrap();
        assert!(forest.is_fitted());
        assert_eq!(forest.trees().len(), 25);

        let pred = forest.predict(&x);
        let correct = pred.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.9);
    }

    #[test]
    fn same_seed_same_predictions() {
        let x: Vec<Sample> = (0..120)
            .map(|i| {
                let v = i as f64;
                [(v * 0.37).sin(), (v * 0.11).cos(), v % 7.0, v % 3.0, (v * 0.05).sin(), v]
            })
            .collect();
        let y: Vec<u8> = (0..120).map(|i| u8::from((i * 7) % 5 > 2)).collect();

        let config = ForestConfig {
            n_estimators: 10,
            ..ForestConfig::default()
        };
        let mut a = RandomForest::new(config);
        let mut b = RandomForest::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn unfitted_forest_predicts_zero() {
        let forest = RandomForest::default();
        assert!(!forest.is_fitted());
        assert_eq!(forest.predict(&[[0.0; FEATURE_COUNT]; 3]), vec![0, 0, 0]);
    }

    #[test]
    fn fit_rejects_mismatched_lengths() {
        let mut forest = RandomForest::default();
        assert!(forest.fit(&[[0.0; FEATURE_COUNT]; 3], &[1, 0]).is_err());
        assert!(forest.fit(&[], &[]).is_err());
    }
}
