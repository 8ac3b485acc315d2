//! Artifact store port: Trait for persisting the fitted scaler and classifier.
//!
//! Training writes both artifacts once; inference loads them once and keeps
//! them as immutable handles.

use crate::domain::ScalerState;
use crate::ports::RiskClassifier;

/// Scaler and classifier loaded together from one artifact set.
#[derive(Debug, Clone)]
pub struct LoadedArtifacts<M> {
    /// Training-fitted scaler
    pub scaler: ScalerState,
    /// Training-fitted classifier
    pub classifier: M,
}

/// Trait for artifact persistence.
pub trait ArtifactStore {
    /// Concrete classifier type stored by this backend.
    type Model: RiskClassifier;

    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist a fitted scaler and classifier as one artifact set.
    ///
    /// # Errors
    /// Returns error if either artifact cannot be written.
    fn save(&self, scaler: &ScalerState, classifier: &Self::Model) -> Result<(), Self::Error>;

    /// Load and validate a previously saved artifact set.
    ///
    /// # Errors
    /// Returns error if an artifact is missing, corrupt, of an unsupported
    /// version, or does not match the feature contract.
    fn load(&self) -> Result<LoadedArtifacts<Self::Model>, Self::Error>;
}
