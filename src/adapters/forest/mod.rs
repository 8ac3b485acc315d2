//! Random forest adapter: Implementation of RiskClassifier.
//!
//! A bagged ensemble of CART trees. Each tree is grown on a bootstrap sample
//! drawn from its own seeded ChaCha stream, and trees are fitted in parallel
//! with rayon. Per-tree seeds are drawn up front from the forest seed, so the
//! fitted forest does not depend on thread scheduling.
//!
//! The forest probability is the mean of the leaf probabilities reached in
//! every tree. The hard label is 1 only when that mean is strictly above 0.5.

mod grower;
mod tree;

pub use tree::{DecisionTree, Node, SplitCondition};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::ClassPrediction;
use crate::ports::{ModelError, RiskClassifier};
use grower::{GrowthLimits, TreeGrower};

/// Version of the serialized forest layout.
pub const FOREST_FORMAT_VERSION: u32 = 1;

/// Number of candidate features examined per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1
    Sqrt,
    /// Every feature
    All,
    /// A fixed count, clamped to `[1, n_features]`
    Count(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            Self::Sqrt => (n_features as f64).sqrt().floor() as usize,
            Self::All => n_features,
            Self::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters for [`RandomForest::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 6,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameters(
                "n_estimators must be at least 1".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ModelError::InvalidParameters(
                "max_depth must be at least 1".into(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidParameters(
                "min_samples_split must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Fitted random forest, serializable as a JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub params: ForestParams,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on a design matrix.
    ///
    /// # Arguments
    /// * `params` - Ensemble hyperparameters
    /// * `feature_names` - Column names, one per entry of each row
    /// * `rows` - Design matrix, one row per sample
    /// * `labels` - 0/1 labels, one per row
    ///
    /// # Errors
    /// Returns [`ModelError`] for invalid parameters, empty or ragged input,
    /// non-finite values, or labels other than 0/1.
    pub fn fit<R>(
        params: ForestParams,
        feature_names: Vec<String>,
        rows: &[R],
        labels: &[u8],
    ) -> Result<Self, ModelError>
    where
        R: AsRef<[f64]> + Sync,
    {
        params.validate()?;

        let n_features = feature_names.len();
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(ModelError::InvalidParameters(format!(
                "need matching non-empty rows and labels, got {} and {}",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(ModelError::InvalidParameters(format!(
                "labels must be 0 or 1, found {bad}"
            )));
        }
        for row in rows {
            check_row(row.as_ref(), n_features)?;
        }

        let limits = GrowthLimits {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: params.max_features.resolve(n_features),
        };

        let mut master = ChaCha8Rng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();
        let n_rows = rows.len();

        tracing::info!(
            "Fitting random forest: {} trees, max_depth={}, max_features={}, {} rows x {} features",
            params.n_estimators,
            params.max_depth,
            limits.max_features,
            n_rows,
            n_features
        );

        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
                TreeGrower::new(rows, labels, n_features, limits, rng).grow(bootstrap)
            })
            .collect();

        tracing::debug!(
            "Fitted {} trees, mean leaves per tree {:.1}",
            trees.len(),
            trees.iter().map(DecisionTree::num_leaves).sum::<usize>() as f64 / trees.len() as f64
        );

        Ok(Self {
            format_version: FOREST_FORMAT_VERSION,
            feature_names,
            params,
            trees,
        })
    }

    /// Check a deserialized forest before it is used for scoring.
    ///
    /// # Errors
    /// Returns [`ModelError`] for an unknown format version, an empty
    /// ensemble, or a structurally invalid tree.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.format_version != FOREST_FORMAT_VERSION {
            return Err(ModelError::InvalidParameters(format!(
                "unsupported forest format version {} (expected {FOREST_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        let n_features = self.feature_names.len();
        for (tree, t) in self.trees.iter().enumerate() {
            t.validate(n_features)
                .map_err(|reason| ModelError::InvalidTree { tree, reason })?;
        }
        Ok(())
    }

    /// Mean class-1 probability over all trees.
    ///
    /// # Errors
    /// Returns [`ModelError`] if the row does not fit the model.
    pub fn probability(&self, features: &[f64]) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_row(features, self.feature_names.len())?;

        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(sum / self.trees.len() as f64)
    }
}

fn check_row(row: &[f64], n_features: usize) -> Result<(), ModelError> {
    if row.len() != n_features {
        return Err(ModelError::WidthMismatch {
            expected: n_features,
            actual: row.len(),
        });
    }
    if let Some(index) = row.iter().position(|v| !v.is_finite()) {
        return Err(ModelError::NonFiniteFeature { index });
    }
    Ok(())
}

impl RiskClassifier for RandomForest {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> Result<ClassPrediction, ModelError> {
        let probability = self.probability(features)?;
        Ok(ClassPrediction {
            label: u8::from(probability > 0.5),
            probability,
        })
    }
}
