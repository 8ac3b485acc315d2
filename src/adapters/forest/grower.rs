//! CART tree growth on one bootstrap sample.
//!
//! Splits minimise the sample-weighted Gini impurity of the two children.
//! Each node draws candidate features in random order and stops after
//! `max_features` non-constant ones, so a node whose first draws are all
//! constant keeps looking instead of becoming a premature leaf.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::tree::{DecisionTree, Node, SplitCondition};

/// Stopping rules for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthLimits {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: usize,
}

/// Gini impurity of a node with `pos` positives out of `n`, times `n`.
#[inline]
fn weighted_gini(n: usize, pos: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n_f = n as f64;
    let p = pos as f64 / n_f;
    n_f * (1.0 - p * p - (1.0 - p) * (1.0 - p))
}

pub(crate) struct TreeGrower<'a, R> {
    rows: &'a [R],
    labels: &'a [u8],
    n_features: usize,
    limits: GrowthLimits,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

impl<'a, R: AsRef<[f64]>> TreeGrower<'a, R> {
    pub fn new(
        rows: &'a [R],
        labels: &'a [u8],
        n_features: usize,
        limits: GrowthLimits,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            rows,
            labels,
            n_features,
            limits,
            rng,
            nodes: Vec::new(),
        }
    }

    /// Grow a tree over `samples` (row indices, repeats allowed).
    pub fn grow(mut self, samples: Vec<usize>) -> DecisionTree {
        self.grow_node(samples, 0);
        DecisionTree::new(self.nodes)
    }

    fn grow_node(&mut self, samples: Vec<usize>, depth: usize) -> u32 {
        let idx = self.nodes.len();
        let n = samples.len();
        let pos = samples.iter().filter(|&&i| self.labels[i] == 1).count();
        let probability = if n == 0 { 0.0 } else { pos as f64 / n as f64 };
        self.nodes.push(Node::leaf(probability));

        let pure = pos == 0 || pos == n;
        if pure || depth >= self.limits.max_depth || n < self.limits.min_samples_split {
            return idx as u32;
        }

        let Some(condition) = self.best_split(&samples) else {
            return idx as u32;
        };

        let feature = condition.feature_index as usize;
        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| condition.go_left(self.rows[i].as_ref()[feature]));

        let left = self.grow_node(left, depth + 1);
        let right = self.grow_node(right, depth + 1);
        self.nodes[idx] = Node::split(condition, left, right);
        idx as u32
    }

    fn best_split(&mut self, samples: &[usize]) -> Option<SplitCondition> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut self.rng);

        let total_pos = samples.iter().filter(|&&i| self.labels[i] == 1).count();
        let n = samples.len();

        let mut best: Option<(f64, SplitCondition)> = None;
        let mut informative = 0usize;
        let mut column: Vec<(f64, u8)> = Vec::with_capacity(n);

        for feature in features {
            if informative >= self.limits.max_features {
                break;
            }

            column.clear();
            column.extend(
                samples
                    .iter()
                    .map(|&i| (self.rows[i].as_ref()[feature], self.labels[i])),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            if column[0].0 == column[n - 1].0 {
                continue;
            }
            informative += 1;

            let mut left_n = 0usize;
            let mut left_pos = 0usize;
            for k in 1..n {
                left_n += 1;
                left_pos += column[k - 1].1 as usize;

                let (lo, hi) = (column[k - 1].0, column[k].0);
                if lo == hi {
                    continue;
                }

                let impurity = weighted_gini(left_n, left_pos)
                    + weighted_gini(n - left_n, total_pos - left_pos);

                if best.map_or(true, |(b, _)| impurity < b) {
                    let mid = lo + (hi - lo) / 2.0;
                    // `go_left` is strict, so the threshold must sit above `lo`.
                    let threshold = if mid > lo { mid } else { hi };
                    best = Some((impurity, SplitCondition::new(feature as u32, threshold)));
                }
            }
        }

        best.map(|(_, condition)| condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn limits(max_depth: usize) -> GrowthLimits {
        GrowthLimits {
            max_depth,
            min_samples_split: 2,
            max_features: 2,
        }
    }

    #[test]
    fn test_gini_extremes() {
        assert_eq!(weighted_gini(4, 0), 0.0);
        assert_eq!(weighted_gini(4, 4), 0.0);
        assert_eq!(weighted_gini(4, 2), 2.0);
        assert_eq!(weighted_gini(0, 0), 0.0);
    }

    #[test]
    fn test_separable_data_grows_pure_leaves() {
        let rows = vec![[0.0, 5.0], [1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let labels = vec![0, 0, 1, 1];
        let rng = ChaCha8Rng::seed_from_u64(7);

        let tree = TreeGrower::new(&rows, &labels, 2, limits(6), rng).grow(vec![0, 1, 2, 3]);

        assert!(tree.validate(2).is_ok());
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[0.5, 5.0]), 0.0);
        assert_eq!(tree.predict(&[2.5, 5.0]), 1.0);
        match &tree.nodes[0] {
            Node::Split { condition, .. } => {
                assert_eq!(condition.feature_index, 0);
                assert_eq!(condition.threshold, 1.5);
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn test_depth_limit_yields_mixed_leaf() {
        let rows = vec![[0.0], [1.0], [2.0], [3.0]];
        let labels = vec![0, 1, 0, 1];
        let rng = ChaCha8Rng::seed_from_u64(1);

        let tree = TreeGrower::new(&rows, &labels, 1, limits(0), rng).grow(vec![0, 1, 2, 3]);
        assert_eq!(tree.nodes, vec![Node::leaf(0.5)]);
    }

    #[test]
    fn test_bootstrap_repeats_weight_leaves() {
        let rows = vec![[0.0], [0.0]];
        let labels = vec![0, 1];
        let rng = ChaCha8Rng::seed_from_u64(3);

        // Constant feature: no split possible, leaf keeps sample multiplicity.
        let tree = TreeGrower::new(&rows, &labels, 1, limits(6), rng).grow(vec![0, 1, 1, 1]);
        assert_eq!(tree.nodes, vec![Node::leaf(0.75)]);
    }

    #[test]
    fn test_constant_draws_do_not_use_up_the_feature_quota() {
        // Only feature 2 separates the classes; quota of one must still find it.
        let rows = vec![[1.0, 1.0, 0.0], [1.0, 1.0, 1.0]];
        let labels = vec![0, 1];
        let one = GrowthLimits {
            max_depth: 3,
            min_samples_split: 2,
            max_features: 1,
        };

        for seed in 0..8 {
            let rng = ChaCha8Rng::seed_from_u64(seed);
            let tree = TreeGrower::new(&rows, &labels, 3, one, rng).grow(vec![0, 1]);
            assert_eq!(tree.predict(&[1.0, 1.0, 0.0]), 0.0);
            assert_eq!(tree.predict(&[1.0, 1.0, 1.0]), 1.0);
        }
    }
}
