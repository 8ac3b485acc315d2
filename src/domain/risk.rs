//! Risk result types.
//!
//! Represents the output of the heart disease classifier and the risk band
//! derived from its probability.

use serde::{Deserialize, Serialize};

/// Probabilities below this are [`RiskLevel::Low`].
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.3;

/// Probabilities at or above this are [`RiskLevel::High`].
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Risk band for heart disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Low risk of heart disease
    Low,
    /// Medium risk, monitoring recommended
    Medium,
    /// High risk, intervention recommended
    High,
}

impl RiskLevel {
    /// Band a class-1 probability. Boundaries belong to the upper band.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability < MEDIUM_RISK_THRESHOLD {
            Self::Low
        } else if probability < HIGH_RISK_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Raw classifier output (before banding).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassPrediction {
    /// Hard label (0 = no disease, 1 = disease present)
    pub label: u8,

    /// Probability of the positive class (0.0 to 1.0)
    pub probability: f64,
}

/// Response for one inference request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    /// Class-1 probability scaled to 0-100
    pub risk_score: f64,

    /// Band derived from the probability
    pub risk_level: RiskLevel,

    /// The classifier's hard label
    pub prediction: u8,
}

impl From<ClassPrediction> for RiskResult {
    fn from(p: ClassPrediction) -> Self {
        Self {
            risk_score: p.probability * 100.0,
            risk_level: RiskLevel::from_probability(p.probability),
            prediction: p.label,
        }
    }
}
