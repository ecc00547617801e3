//! Bagged regression forest
//!
//! Each tree is grown on a bootstrap resample with its own ChaCha8 stream seeded
//! from `seed + tree_index`, so the fitted forest does not depend on how rayon
//! schedules the work.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};

/// Forest hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Split candidates per node (n_features / 3 if None)
    pub max_features: Option<usize>,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
        }
    }
}

/// Ensemble of bootstrap-trained regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Normalised impurity decrease per feature
    importances: Vec<f64>,
}

impl RandomForest {
    /// Fit on `rows` (one feature vector each) against `targets`
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], config: &ForestConfig) -> Self {
        let n_features = rows.first().map_or(0, |r| r.len());
        if rows.is_empty() {
            return Self {
                trees: Vec::new(),
                n_features,
                importances: Vec::new(),
            };
        }

        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features.unwrap_or((n_features / 3).max(1)),
        };
        let n = rows.len();

        let fitted: Vec<(RegressionTree, Vec<f64>)> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                let mut importances = vec![0.0; n_features];
                let tree = RegressionTree::fit(rows, targets, &sample, &params, &mut rng, &mut importances);
                (tree, importances)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        for (_, tree_importances) in &fitted {
            for (total, v) in importances.iter_mut().zip(tree_importances) {
                *total += v;
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for v in &mut importances {
                *v /= sum;
            }
        }

        Self {
            trees: fitted.into_iter().map(|(tree, _)| tree).collect(),
            n_features,
            importances,
        }
    }

    /// Mean of the tree predictions
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.predict_with_spread(features).0
    }

    /// Mean and population standard deviation of the tree predictions
    pub fn predict_with_spread(&self, features: &[f64]) -> (f64, f64) {
        if self.trees.is_empty() {
            return (0.0, 0.0);
        }
        let predictions: Vec<f64> = self.trees.iter().map(|t| t.predict(features)).collect();
        let n = predictions.len() as f64;
        let mean = predictions.iter().sum::<f64>() / n;
        let variance = predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }

    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.par_iter().map(|r| self.predict(r)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Every split references a feature the forest was trained with
    pub(crate) fn is_consistent(&self) -> bool {
        self.importances.len() == self.n_features
            && self
                .trees
                .iter()
                .all(|t| t.max_feature_index().map_or(true, |f| f < self.n_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly_rows() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..70)
            .map(|i| vec![(i % 7) as f64, (i / 7) as f64, ((i * 13) % 5) as f64])
            .collect();
        let targets = rows
            .iter()
            .map(|r| if r[0] >= 5.0 { 0.9 } else { 0.4 })
            .collect();
        (rows, targets)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_forest_learns_weekly_pattern() {
        let (rows, targets) = weekly_rows();
        let forest = RandomForest::fit(&rows, &targets, &small_config());

        assert_eq!(forest.n_trees(), 20);
        assert!(forest.predict(&[6.0, 3.0, 1.0]) > 0.7);
        assert!(forest.predict(&[2.0, 3.0, 1.0]) < 0.6);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (rows, targets) = weekly_rows();
        let a = RandomForest::fit(&rows, &targets, &small_config());
        let b = RandomForest::fit(&rows, &targets, &small_config());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_ignores_thread_count() {
        let (rows, targets) = weekly_rows();
        let fit_on = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| RandomForest::fit(&rows, &targets, &small_config()))
        };

        let single = fit_on(1);
        assert_eq!(single, fit_on(8));
        assert_eq!(single, RandomForest::fit(&rows, &targets, &small_config()));
    }

    #[test]
    fn test_seed_changes_forest() {
        let (rows, targets) = weekly_rows();
        let a = RandomForest::fit(&rows, &targets, &small_config());
        let b = RandomForest::fit(&rows, &targets, &ForestConfig { seed: 7, ..small_config() });
        assert_ne!(a, b);
    }

    #[test]
    fn test_importances_normalised_and_informative() {
        let (rows, targets) = weekly_rows();
        let forest = RandomForest::fit(&rows, &targets, &small_config());
        let importances = forest.feature_importances();

        let sum: f64 = importances.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[2]);
    }

    #[test]
    fn test_spread_is_zero_for_pure_signal() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let targets = vec![0.6; 30];
        let forest = RandomForest::fit(&rows, &targets, &small_config());

        let (mean, spread) = forest.predict_with_spread(&[4.0]);
        assert!((mean - 0.6).abs() < 1e-12);
        assert!(spread < 1e-12);
    }

    #[test]
    fn test_empty_training_set() {
        let forest = RandomForest::fit(&[], &[], &small_config());
        assert_eq!(forest.n_trees(), 0);
        assert_eq!(forest.predict(&[1.0]), 0.0);
    }

    #[test]
    fn test_predict_many_preserves_order() {
        let (rows, targets) = weekly_rows();
        let forest = RandomForest::fit(&rows, &targets, &small_config());
        let many = forest.predict_many(&rows);
        for (row, p) in rows.iter().zip(many) {
            assert_eq!(forest.predict(row), p);
        }
    }
}
