//! CART decision tree for binary approval labels.
//!
//! Nodes live in a flat arena (`Vec<TreeNode>`) with child indices, so a
//! trained tree serializes as plain data. Splits minimize weighted Gini
//! impurity over a random subset of candidate features per node; the
//! per-feature impurity decrease is accumulated while growing and becomes
//! the tree's feature importance.

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A node in the tree arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split: `features[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    /// Terminal node with the training label counts that reached it.
    Leaf { approvals: u32, samples: u32 },
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features examined per split
    pub max_features: usize,
}

/// A trained decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
    /// Impurity decrease per feature, normalized to sum to 1 (all zero for a stump)
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` selected by `sample_indices`.
    ///
    /// `sample_indices` may contain repeats (bootstrap samples); each
    /// occurrence counts as one training sample.
    pub fn fit<R: Rng>(
        x: &[Vec<f32>],
        y: &[u8],
        sample_indices: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = TreeBuilder {
            x,
            y,
            params,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.grow(sample_indices, 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Self {
            nodes: builder.nodes,
            n_features,
            importances,
        }
    }

    /// Approve if the reached leaf holds a strict majority of approvals.
    ///
    /// `features` must hold at least [`n_features`](Self::n_features) values.
    pub fn predict(&self, features: &[f32]) -> bool {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { approvals, samples } => return approvals * 2 > *samples,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.node_depth(0)
    }

    fn node_depth(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => {
                1 + self.node_depth(*left).max(self.node_depth(*right))
            }
        }
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    /// Check feature indices are in range and children come after their
    /// parent in the arena (pre-order), so traversal always terminates.
    pub(crate) fn is_well_formed(&self) -> bool {
        let n = self.nodes.len();
        n > 0
            && self.importances.len() == self.n_features
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                TreeNode::Leaf { approvals, samples } => approvals <= samples,
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    *feature < self.n_features
                        && (i + 1..n).contains(left)
                        && (i + 1..n).contains(right)
                        && left != right
                }
            })
    }
}

/// Gini impurity of a binary node: 2p(1 - p).
fn gini(approvals: usize, samples: usize) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    let p = approvals as f64 / samples as f64;
    2.0 * p * (1.0 - p)
}

struct Split {
    feature: usize,
    threshold: f32,
    /// n * impurity of the two children
    weighted_child_impurity: f64,
}

struct TreeBuilder<'a, R> {
    x: &'a [Vec<f32>],
    y: &'a [u8],
    params: &'a TreeParams,
    rng: &'a mut R,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl<R: Rng> TreeBuilder<'_, R> {
    /// Grow the subtree for `indices` and return its node index.
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let samples = indices.len();
        let approvals = indices.iter().filter(|&&i| self.y[i] == 1).count();

        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            approvals: approvals as u32,
            samples: samples as u32,
        });

        let pure = approvals == 0 || approvals == samples;
        let too_deep = self.params.max_depth.is_some_and(|d| depth >= d);
        if pure || too_deep || samples < self.params.min_samples_split {
            return node_id;
        }

        let node_impurity = samples as f64 * gini(approvals, samples);
        let Some(split) = self.best_split(&indices, approvals) else {
            return node_id;
        };
        // Zero-gain splits are allowed
        let decrease = (node_impurity - split.weighted_child_impurity).max(0.0);

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        self.importances[split.feature] += decrease;

        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[node_id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    /// Features are examined in random order until `max_features`
    /// non-constant ones have been scored. Constant features do not count
    /// toward the limit.
    fn best_split(&mut self, indices: &[usize], approvals: usize) -> Option<Split> {
        let n_features = self.importances.len();
        if n_features == 0 {
            return None;
        }
        let max_features = self.params.max_features.clamp(1, n_features);
        let order = index::sample(&mut *self.rng, n_features, n_features);

        let samples = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<Split> = None;
        let mut scored = 0;
        let mut column: Vec<(f32, u8)> = Vec::with_capacity(samples);

        for feature in order.iter() {
            if scored >= max_features {
                break;
            }

            column.clear();
            column.extend(indices.iter().map(|&i| (self.x[i][feature], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            if column[0].0 >= column[samples - 1].0 {
                continue;
            }
            scored += 1;

            let mut left_approvals = 0;
            for pos in 0..samples - 1 {
                left_approvals += column[pos].1 as usize;
                let (value, next) = (column[pos].0, column[pos + 1].0);
                if value >= next {
                    continue;
                }

                let left_n = pos + 1;
                let right_n = samples - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let impurity = left_n as f64 * gini(left_approvals, left_n)
                    + right_n as f64 * gini(approvals - left_approvals, right_n);

                if best
                    .as_ref()
                    .map_or(true, |b| impurity < b.weighted_child_impurity)
                {
                    let mut threshold = value + (next - value) / 2.0;
                    // Midpoint can round up to `next` for adjacent floats
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        weighted_child_impurity: impurity,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn all_features(n_features: usize) -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: n_features,
        }
    }

    fn fit(x: &[Vec<f32>], y: &[u8], params: &TreeParams) -> DecisionTree {
        let mut rng = StdRng::seed_from_u64(7);
        DecisionTree::fit(x, y, (0..y.len()).collect(), params, &mut rng)
    }

    #[test]
    fn test_single_threshold() {
        // f[0] <= 0.5 → rejected, else approved
        let x = vec![vec![0.1], vec![0.3], vec![0.7], vec![0.9]];
        let y = vec![0, 0, 1, 1];
        let tree = fit(&x, &y, &all_features(1));

        assert!(!tree.predict(&[0.2]));
        assert!(tree.predict(&[0.8]));
        assert!(!tree.predict(&[0.5])); // <= threshold goes left
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        assert!(tree.is_well_formed());
    }

    #[test]
    fn test_xor_needs_two_levels() {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let y = vec![0, 1, 1, 0];
        let tree = fit(&x, &y, &all_features(2));

        for (row, &label) in x.iter().zip(&y) {
            assert_eq!(tree.predict(row), label == 1);
        }
    }

    #[test]
    fn test_pure_node_is_single_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let tree = fit(&x, &[1, 1, 1], &all_features(1));

        assert_eq!(tree.n_nodes(), 1);
        assert!(tree.predict(&[100.0]));
        assert!(tree.importances().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x: Vec<Vec<f32>> = (0..16).map(|i| vec![i as f32]).collect();
        let y: Vec<u8> = (0..16).map(|i| (i % 2) as u8).collect();
        let params = TreeParams {
            max_depth: Some(2),
            ..all_features(1)
        };
        let tree = fit(&x, &y, &params);

        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32]).collect();
        let y = vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let params = TreeParams {
            min_samples_leaf: 3,
            ..all_features(1)
        };
        let tree = fit(&x, &y, &params);

        for node in &tree.nodes {
            if let TreeNode::Leaf { samples, .. } = node {
                assert!(*samples >= 3);
            }
        }
    }

    #[test]
    fn test_importance_tracks_informative_feature() {
        // feature 1 is noise, feature 0 decides the label
        let x: Vec<Vec<f32>> = (0..40)
            .map(|i| vec![i as f32, ((i * 7) % 5) as f32])
            .collect();
        let y: Vec<u8> = (0..40).map(|i| u8::from(i >= 20)).collect();
        let tree = fit(&x, &y, &all_features(2));

        let importances = tree.importances();
        assert!(importances[0] > importances[1]);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bootstrap_duplicates_count_as_samples() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![0, 1];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, vec![1, 1, 1, 0], &all_features(1), &mut rng);

        match &tree.nodes[0] {
            TreeNode::Split { left, right, .. } => {
                assert_eq!(tree.nodes[*left], TreeNode::Leaf { approvals: 0, samples: 1 });
                assert_eq!(tree.nodes[*right], TreeNode::Leaf { approvals: 3, samples: 3 });
            }
            other => panic!("expected a split, got {other:?}"),
        }
    }

    #[test]
    fn test_backward_child_is_malformed() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![0, 0, 1, 1];
        let mut tree = fit(&x, &y, &all_features(1));
        assert!(tree.is_well_formed());

        let TreeNode::Split { left, .. } = &mut tree.nodes[0] else {
            panic!("root should split");
        };
        *left = 0;
        assert!(!tree.is_well_formed());
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(0, 10), 0.0);
        assert_eq!(gini(10, 10), 0.0);
        assert!((gini(5, 10) - 0.5).abs() < 1e-12);
        assert_eq!(gini(0, 0), 0.0);
    }
}
