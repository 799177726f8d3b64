//! Random forest classifier over encoded loan applications

use crate::error::TrainingError;
use crate::models::tree::{DecisionTree, TreeParams};
use crate::types::decision::Decision;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Seed for bootstrap sampling and feature selection
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_n_estimators() -> usize {
    100
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            seed: default_seed(),
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<(), TrainingError> {
        if self.n_estimators == 0 {
            return Err(TrainingError::InvalidParams(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(TrainingError::InvalidParams(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainingError::InvalidParams(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ensemble of bootstrap-trained decision trees with majority voting.
///
/// A forest only comes into existence through [`RandomForest::train`] (or
/// deserialization of a trained one) and has no mutating methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Train a forest on encoded features and approval labels (`1` = approved).
    ///
    /// Tree `i` draws its bootstrap sample and candidate features from a
    /// generator seeded with `params.seed + i`, so the same inputs and
    /// parameters always produce the same forest.
    pub fn train(
        features: &[Vec<f32>],
        labels: &[u8],
        params: &ForestParams,
    ) -> Result<Self, TrainingError> {
        params.validate()?;

        if features.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }
        if features.len() != labels.len() {
            return Err(TrainingError::LengthMismatch {
                rows: features.len(),
                labels: labels.len(),
            });
        }
        let n_features = features[0].len();
        if let Some((row, got)) = features
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() != n_features)
            .map(|(row, f)| (row, f.len()))
        {
            return Err(TrainingError::RaggedFeatures {
                row,
                expected: n_features,
                got,
            });
        }

        let n_samples = features.len();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: ((n_features as f64).sqrt() as usize).max(1),
        };
        let dist = Uniform::from(0..n_samples);

        let trees = (0..params.n_estimators)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> = (0..n_samples).map(|_| dist.sample(&mut rng)).collect();
                let tree = DecisionTree::fit(features, labels, bootstrap, &tree_params, &mut rng);
                debug!(
                    tree = i,
                    nodes = tree.n_nodes(),
                    depth = tree.depth(),
                    "Tree grown"
                );
                tree
            })
            .collect();

        info!(
            n_estimators = params.n_estimators,
            n_samples = n_samples,
            n_features = n_features,
            max_features = tree_params.max_features,
            "Random forest trained"
        );

        Ok(Self { trees, n_features })
    }

    /// Number of trees voting to approve.
    fn approval_votes(&self, features: &[f32]) -> usize {
        debug_assert_eq!(features.len(), self.n_features, "feature vector length");
        self.trees.iter().filter(|t| t.predict(features)).count()
    }

    /// Majority vote; a tie is a rejection.
    pub fn predict(&self, features: &[f32]) -> Decision {
        if self.approval_votes(features) * 2 > self.trees.len() {
            Decision::Approved
        } else {
            Decision::Rejected
        }
    }

    /// Fraction of trees voting to approve.
    pub fn predict_proba(&self, features: &[f32]) -> f64 {
        self.approval_votes(features) as f64 / self.trees.len() as f64
    }

    pub fn predict_batch(&self, features: &[Vec<f32>]) -> Vec<Decision> {
        features.iter().map(|f| self.predict(f)).collect()
    }

    /// Mean decrease in impurity per feature, averaged over trees and
    /// normalized to sum to 1. All zero when no tree ever split.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, value) in total.iter_mut().zip(tree.importances()) {
                *acc += value;
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter_mut().for_each(|v| *v /= sum);
        }
        total
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Structural sanity check for deserialized forests.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.trees.is_empty()
            && self
                .trees
                .iter()
                .all(|t| t.n_features() == self.n_features && t.is_well_formed())
    }
}
