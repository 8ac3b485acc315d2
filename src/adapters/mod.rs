//! Adapters layer: Concrete implementations of ports.
//!
//! - `forest`: bagged CART ensemble behind [`crate::ports::RiskClassifier`]
//! - `artifacts`: signed JSON artifact sets behind [`crate::ports::ArtifactStore`]
//! - `dataset`: JSON training data reader

pub mod artifacts;
pub mod dataset;
pub mod forest;

pub use artifacts::{ArtifactError, FsArtifactStore, SignaturePolicy};
pub use dataset::DatasetLoadError;
pub use forest::{ForestParams, MaxFeatures, RandomForest};
