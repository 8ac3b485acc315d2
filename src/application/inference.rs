//! Inference service: Scores one clinical request against frozen artifacts.
//!
//! This service coordinates:
//! - Encoding onto the feature contract
//! - Scaling with the training-fitted scaler
//! - Interaction features
//! - Schema check and classification
//! - Risk banding

use std::sync::Arc;

use crate::domain::{
    check_schema, derive_interactions, encode, scale, RawClinicalInput, RiskResult, ScalerState,
};
use crate::ports::{ArtifactStore, RiskClassifier};
use crate::CardioRiskError;

/// Service for scoring clinical input.
///
/// Holds the scaler and classifier as shared immutable handles, so one
/// instance can serve any number of threads without locking.
pub struct InferenceService<C>
where
    C: RiskClassifier,
{
    scaler: Arc<ScalerState>,
    classifier: Arc<C>,
}

impl<C: RiskClassifier> Clone for InferenceService<C> {
    fn clone(&self) -> Self {
        Self {
            scaler: Arc::clone(&self.scaler),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<C> InferenceService<C>
where
    C: RiskClassifier,
{
    /// Create a service from already loaded artifacts.
    ///
    /// # Errors
    /// Returns error if the scaler is invalid or the classifier was fitted on
    /// a different feature layout.
    pub fn new(scaler: Arc<ScalerState>, classifier: Arc<C>) -> Result<Self, CardioRiskError> {
        scaler.validate()?;
        check_schema(classifier.feature_names())?;
        Ok(Self { scaler, classifier })
    }

    /// Load artifacts once from a store and build the service.
    ///
    /// # Errors
    /// Returns error if loading or validation fails.
    pub fn from_store<S>(store: &S) -> Result<Self, CardioRiskError>
    where
        S: ArtifactStore<Model = C>,
        CardioRiskError: From<S::Error>,
    {
        let loaded = store.load()?;
        Self::new(Arc::new(loaded.scaler), Arc::new(loaded.classifier))
    }

    /// Run the full inference pipeline on one request.
    ///
    /// # Errors
    /// Returns error if any step fails; no partial result is produced.
    pub fn infer(&self, input: &RawClinicalInput) -> Result<RiskResult, CardioRiskError> {
        infer(input, &self.scaler, self.classifier.as_ref())
    }

    /// Parse a JSON request body and score it.
    ///
    /// # Errors
    /// Returns [`CardioRiskError::Input`] for malformed or implausible input,
    /// otherwise as [`Self::infer`].
    pub fn infer_json(&self, body: &str) -> Result<RiskResult, CardioRiskError> {
        let input = RawClinicalInput::from_json(body)?;
        self.infer(&input)
    }

    /// The scaler this service was built with.
    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }
}

/// Score one request against the given scaler and classifier.
///
/// Steps: encode, scale, append interactions, check the classifier's schema,
/// predict, band.
///
/// # Errors
/// Returns error if the scaler is invalid, the classifier's layout differs
/// from the contract, or prediction fails.
pub fn infer<C>(
    input: &RawClinicalInput,
    scaler: &ScalerState,
    classifier: &C,
) -> Result<RiskResult, CardioRiskError>
where
    C: RiskClassifier + ?Sized,
{
    tracing::debug!("Step 1: Encoding request onto the feature contract...");
    let base = encode(input);

    tracing::debug!("Step 2: Scaling continuous columns...");
    let scaled = scale(&base, scaler)?;

    tracing::debug!("Step 3: Deriving interaction features...");
    let row = derive_interactions(scaled).to_array();

    tracing::debug!("Step 4: Classifying...");
    check_schema(classifier.feature_names())?;
    let prediction = classifier.predict(&row)?;

    let result = RiskResult::from(prediction);
    tracing::info!(
        "Inference complete: prediction={}, probability={:.4}, risk={}",
        result.prediction,
        prediction.probability,
        result.risk_level
    );

    Ok(result)
}
