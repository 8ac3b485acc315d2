//! Domain layer: Core business types and logic.
//!
//! This module contains pure Rust types with no I/O. The feature contract,
//! scaler and risk banding are shared by training and inference. The
//! Framingham score stands alone.

mod clinical;
pub mod dataset;
pub mod features;
mod framingham;
mod risk;
mod scaler;

pub use clinical::{InputError, RawClinicalInput};
pub use dataset::{Dataset, DatasetError, LabeledRecord};
pub use features::{
    check_schema, derive_interactions, encode, feature_names, BaseColumn, BaseFeatures,
    FeatureVector, SchemaError, BASE_FEATURE_COUNT, CONTINUOUS_COLUMNS, FEATURE_COUNT,
    FEATURE_NAMES, FROZEN_COLUMNS,
};
pub use framingham::{ten_year_risk, FraminghamInput, FraminghamRisk, Sex};
pub use risk::{ClassPrediction, RiskLevel, RiskResult, HIGH_RISK_THRESHOLD, MEDIUM_RISK_THRESHOLD};
pub use scaler::{scale, ScalerError, ScalerState, MIN_FIT_ROWS};
