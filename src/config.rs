//! Runtime configuration from `CARDIORISK_*` environment variables.

use std::path::PathBuf;

use crate::adapters::forest::{ForestParams, MaxFeatures};

pub const ARTIFACT_DIR_ENV: &str = "CARDIORISK_ARTIFACT_DIR";
pub const LOG_MODE_ENV: &str = "CARDIORISK_LOG_MODE";
pub const LOG_FILE_ENV: &str = "CARDIORISK_LOG_FILE";
pub const REQUIRE_SIGNED_ENV: &str = "CARDIORISK_REQUIRE_SIGNED_ARTIFACTS";
pub const PUBKEY_FILE_ENV: &str = "CARDIORISK_ARTIFACT_PUBKEY_B64_FILE";
pub const PUBKEY_ENV: &str = "CARDIORISK_ARTIFACT_PUBKEY_B64";

const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
const DEFAULT_LOG_FILE: &str = "cardiorisk.log";

/// Parse a boolean flag the way every `CARDIORISK_*` switch is parsed.
pub fn parse_bool_env(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMode {
    /// Standard error, keeping stdout free for JSON responses
    Stderr,
    /// Append to a file
    File(PathBuf),
}

/// Source of the Ed25519 key that verifies signed artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubkeySource {
    File(PathBuf),
    Inline(String),
}

/// Settings shared by the binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub artifact_dir: PathBuf,
    pub log_mode: LogMode,
    pub require_signed_artifacts: bool,
    pub artifact_pubkey: Option<PubkeySource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            log_mode: LogMode::Stderr,
            require_signed_artifacts: false,
            artifact_pubkey: None,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Unknown `CARDIORISK_LOG_MODE` values fall back to stderr. A key file
    /// takes precedence over an inline key.
    pub fn from_env() -> Self {
        let env = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let artifact_dir = env(ARTIFACT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR));

        let log_mode = match env(LOG_MODE_ENV).as_deref() {
            Some("file") => LogMode::File(
                env(LOG_FILE_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            ),
            _ => LogMode::Stderr,
        };

        let artifact_pubkey = env(PUBKEY_FILE_ENV)
            .map(|p| PubkeySource::File(PathBuf::from(p)))
            .or_else(|| env(PUBKEY_ENV).map(PubkeySource::Inline));

        Self {
            artifact_dir,
            log_mode,
            require_signed_artifacts: parse_bool_env(REQUIRE_SIGNED_ENV),
            artifact_pubkey,
        }
    }
}

/// Hyperparameters of the training pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    /// Seed for both the split and the forest
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 6,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features,
            seed: self.seed,
        }
    }
}
