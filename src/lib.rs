//! # cardiorisk
//!
//! Heart disease risk scoring behind a fixed feature contract.
//!
//! This crate provides:
//! - One feature layout shared by training and inference
//! - A training pipeline that fits a scaler and a random forest
//! - An inference pipeline that turns a clinical request into a banded risk
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (clinical input, feature contract, scaler, risk)
//! - `ports`: Trait definitions for the classifier and artifact storage
//! - `adapters`: Concrete implementations (random forest, JSON artifacts, datasets)
//! - `application`: Use cases orchestrating domain and ports
//! - `config` / `logging`: Environment configuration and tracing setup

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;

pub use domain::{RawClinicalInput, RiskLevel, RiskResult};

/// Result type for cardiorisk operations
pub type Result<T> = std::result::Result<T, CardioRiskError>;

/// Main error type for cardiorisk
#[derive(Debug, thiserror::Error)]
pub enum CardioRiskError {
    #[error("Invalid input: {0}")]
    Input(#[from] domain::InputError),

    #[error("Scaler error: {0}")]
    Scaler(#[from] domain::ScalerError),

    #[error("Schema skew: {0}")]
    Schema(#[from] domain::SchemaError),

    #[error("Invalid dataset: {0}")]
    Dataset(#[from] domain::DatasetError),

    #[error("Dataset load failed: {0}")]
    DatasetLoad(#[from] adapters::DatasetLoadError),

    #[error("Model error: {0}")]
    Model(#[from] ports::ModelError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Training error: {0}")]
    Training(#[from] application::TrainingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
