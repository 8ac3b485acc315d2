//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the pipelines and the model / artifact implementations.

mod artifacts;
mod classifier;

pub use artifacts::{ArtifactStore, LoadedArtifacts};
pub use classifier::{ModelError, RiskClassifier};
