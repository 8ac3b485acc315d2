//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the training and inference pipelines.

pub mod evaluation;
mod inference;
mod training;

pub use evaluation::{ClassMetrics, ConfusionMatrix, EvaluationReport};
pub use inference::{infer, InferenceService};
pub use training::{stratified_split, Split, Trainer, TrainingError, TrainingOutcome};
