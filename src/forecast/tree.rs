//! CART regression tree stored as a flat node arena

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled as split candidates at each node
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree; root is node 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct Grower<'a> {
    rows: &'a [Vec<f64>],
    targets: &'a [f64],
    params: &'a TreeParams,
    rng: &'a mut ChaCha8Rng,
    importances: &'a mut [f64],
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on `sample` (row indices, repeats allowed).
    ///
    /// Impurity decrease per feature is added to `importances`.
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        sample: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> Self {
        let mut grower = Grower {
            rows,
            targets,
            params,
            rng,
            importances,
            nodes: Vec::new(),
        };
        grower.grow(sample.to_vec(), 0);
        Self { nodes: grower.nodes }
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right } => {
                    idx = if features[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Highest feature index referenced by a split, if any
    pub(crate) fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

impl Grower<'_> {
    /// Returns the index of the subtree root
    fn grow(&mut self, sample: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let (sum, sum_sq) = sums(sample.iter().map(|&i| self.targets[i]));
        let n = sample.len() as f64;
        let value = if sample.is_empty() { 0.0 } else { sum / n };
        self.nodes.push(Node::Leaf { value });

        let sse = sum_sq - sum * sum / n.max(1.0);
        if depth >= self.params.max_depth
            || sample.len() < self.params.min_samples_split
            || sse <= 1e-12
        {
            return idx;
        }

        let Some(split) = self.best_split(&sample, sse) else {
            return idx;
        };

        self.importances[split.feature] += split.gain;
        let left = self.grow(split.left, depth + 1);
        let right = self.grow(split.right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, sample: &[usize], parent_sse: f64) -> Option<SplitCandidate> {
        let n_features = self.rows.first().map_or(0, |r| r.len());
        let mut candidates: Vec<usize> = (0..n_features).collect();
        candidates.shuffle(&mut *self.rng);
        candidates.truncate(self.params.max_features.clamp(1, n_features.max(1)));

        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = sample.len();
        let (total_sum, total_sq) = sums(sample.iter().map(|&i| self.targets[i]));

        let mut best: Option<(usize, f64, f64)> = None;
        let mut ordered = sample.to_vec();

        for feature in candidates {
            ordered.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 1..n {
                let y = self.targets[ordered[pos - 1]];
                left_sum += y;
                left_sq += y * y;

                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = self.rows[ordered[pos - 1]][feature];
                let hi = self.rows[ordered[pos]][feature];
                if lo >= hi {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / pos as f64;
                let right_sse = right_sq - right_sum * right_sum / (n - pos) as f64;
                let gain = parent_sse - (left_sse + right_sse);

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (lo + hi) / 2.0, gain));
                }
            }
        }

        let (feature, threshold, gain) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .partition(|&&i| self.rows[i][feature] <= threshold);

        Some(SplitCandidate {
            feature,
            threshold,
            gain,
            left,
            right,
        })
    }
}

fn sums(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((0.0, 0.0), |(s, sq), v| (s + v, sq + v * v))
}
