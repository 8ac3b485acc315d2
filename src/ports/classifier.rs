//! Classifier port: Trait for the trained risk model.
//!
//! The inference pipeline treats the model as a black box from a
//! canonical-order feature row to a label and class-1 probability.

use crate::domain::ClassPrediction;

/// Errors raised by a classifier implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid tree {tree}: {reason}")]
    InvalidTree { tree: usize, reason: String },

    #[error("Feature row has {actual} columns, model expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("Feature {index} is not finite")]
    NonFiniteFeature { index: usize },
}

/// Trait for a fitted binary classifier.
///
/// Implementations are immutable after loading and shared across threads.
pub trait RiskClassifier: Send + Sync {
    /// Column names the model was fitted on, in order.
    fn feature_names(&self) -> &[String];

    /// Score one feature row.
    ///
    /// # Arguments
    /// * `features` - One row in the order of [`RiskClassifier::feature_names`]
    ///
    /// # Errors
    /// Returns [`ModelError`] if the row width is wrong or a value is not finite.
    fn predict(&self, features: &[f64]) -> Result<ClassPrediction, ModelError>;
}
