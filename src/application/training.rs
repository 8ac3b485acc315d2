//! Training service: Fits the scaler and classifier from labeled data.
//!
//! This service coordinates:
//! - Seeded, label-stratified train/test split
//! - Scaler fit on the training split only
//! - Interaction features on both splits
//! - Forest fit and held-out evaluation
//! - Artifact persistence

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::adapters::forest::RandomForest;
use crate::application::evaluation::EvaluationReport;
use crate::config::TrainingConfig;
use crate::domain::{
    derive_interactions, feature_names, BaseFeatures, Dataset, ScalerState, FEATURE_COUNT,
};
use crate::ports::{ArtifactStore, RiskClassifier};
use crate::CardioRiskError;

/// Errors specific to the training split.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainingError {
    #[error("Test fraction must be strictly between 0 and 1, got {0}")]
    InvalidTestFraction(f64),

    #[error("Class {class} has {rows} row(s); need at least 2 to stratify")]
    ClassTooSmall { class: u8, rows: usize },
}

/// Row indices of a train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so each class keeps its share in both parts.
///
/// Each class contributes `round(n_class * test_fraction)` rows to the test
/// part, clamped so that both parts keep at least one row of the class.
///
/// # Errors
/// Returns [`TrainingError`] for a fraction outside `(0, 1)` or a class with
/// fewer than two rows.
pub fn stratified_split(
    labels: &[u8],
    test_fraction: f64,
    seed: u64,
) -> Result<Split, TrainingError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainingError::InvalidTestFraction(test_fraction));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::with_capacity(labels.len()),
        test: Vec::new(),
    };

    for class in [0u8, 1] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            return Err(TrainingError::ClassTooSmall {
                class,
                rows: members.len(),
            });
        }

        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        split.test.extend_from_slice(&members[..n_test]);
        split.train.extend_from_slice(&members[n_test..]);
    }

    split.train.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// Everything produced by one training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub scaler: ScalerState,
    pub forest: RandomForest,
    pub report: EvaluationReport,
    pub n_train: usize,
    pub n_test: usize,
}

/// Service for the training pipeline.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

/// Scale rows with a fitted scaler and append the interaction columns.
fn engineer(
    rows: &[BaseFeatures],
    scaler: &ScalerState,
) -> Result<Vec<[f64; FEATURE_COUNT]>, CardioRiskError> {
    rows.iter()
        .map(|r| -> Result<_, CardioRiskError> {
            Ok(derive_interactions(scaler.transform(r)?).to_array())
        })
        .collect()
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit and evaluate on an encoded dataset.
    ///
    /// # Errors
    /// Returns error if the split, scaler fit or forest fit fails.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome, CardioRiskError> {
        tracing::info!("Starting training pipeline on {} rows...", dataset.len());

        tracing::debug!(
            "Step 1: Stratified split (test_fraction={})...",
            self.config.test_fraction
        );
        let split = stratified_split(&dataset.labels, self.config.test_fraction, self.config.seed)?;
        let train = dataset.subset(&split.train);
        let test = dataset.subset(&split.test);
        tracing::info!("Split: {} train rows, {} test rows", train.len(), test.len());

        tracing::debug!("Step 2: Fitting scaler on the training split...");
        let scaler = ScalerState::fit(&train.rows)?;

        tracing::debug!("Step 3: Scaling and deriving interactions...");
        let train_rows = engineer(&train.rows, &scaler)?;
        let test_rows = engineer(&test.rows, &scaler)?;

        tracing::debug!("Step 4: Fitting forest...");
        let forest = RandomForest::fit(
            self.config.forest_params(),
            feature_names(),
            &train_rows,
            &train.labels,
        )?;

        tracing::debug!("Step 5: Evaluating on the test split...");
        let mut predicted = Vec::with_capacity(test_rows.len());
        let mut probabilities = Vec::with_capacity(test_rows.len());
        for row in &test_rows {
            let p = forest.predict(row)?;
            predicted.push(p.label);
            probabilities.push(p.probability);
        }
        let report = EvaluationReport::compute(&test.labels, &predicted, &probabilities);

        tracing::info!(
            "Training complete: accuracy={:.4}, roc_auc={}",
            report.accuracy,
            report
                .roc_auc
                .map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}"))
        );

        Ok(TrainingOutcome {
            scaler,
            forest,
            report,
            n_train: train.len(),
            n_test: test.len(),
        })
    }

    /// Train and persist the resulting artifacts.
    ///
    /// # Errors
    /// Returns error if training or saving fails.
    pub fn train_and_save<S>(
        &self,
        dataset: &Dataset,
        store: &S,
    ) -> Result<TrainingOutcome, CardioRiskError>
    where
        S: ArtifactStore<Model = RandomForest>,
        CardioRiskError: From<S::Error>,
    {
        let outcome = self.train(dataset)?;
        store.save(&outcome.scaler, &outcome.forest)?;
        Ok(outcome)
    }
}
