//! Framingham 10-year cardiovascular risk.
//!
//! A closed-form score over the same vitals the classifier sees plus three
//! history flags. It does not touch the fitted artifacts.
//!
//! risk = 1 - S0 ^ exp(sum - mean_sum), where `sum` is the sex-specific
//! weighted sum of log age, log cholesterol, log HDL, log systolic pressure
//! (treated or untreated weight) and the smoker and diabetes flags.

use serde::{Deserialize, Serialize};

use super::clinical::InputError;

/// Sex as used by the Framingham coefficient tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

struct Coefficients {
    ln_age: f64,
    ln_total_chol: f64,
    ln_hdl: f64,
    ln_sbp_treated: f64,
    ln_sbp_untreated: f64,
    smoker: f64,
    diabetes: f64,
    mean_coefficient_sum: f64,
    baseline_survival: f64,
}

const MALE: Coefficients = Coefficients {
    ln_age: 3.06117,
    ln_total_chol: 1.12370,
    ln_hdl: -0.93263,
    ln_sbp_treated: 1.99881,
    ln_sbp_untreated: 1.93303,
    smoker: 0.65451,
    diabetes: 0.57367,
    mean_coefficient_sum: 23.9802,
    baseline_survival: 0.88936,
};

const FEMALE: Coefficients = Coefficients {
    ln_age: 2.32888,
    ln_total_chol: 1.20904,
    ln_hdl: -0.70833,
    ln_sbp_treated: 2.82263,
    ln_sbp_untreated: 2.76157,
    smoker: 0.52873,
    diabetes: 0.69154,
    mean_coefficient_sum: 26.1931,
    baseline_survival: 0.95012,
};

impl Sex {
    fn coefficients(self) -> &'static Coefficients {
        match self {
            Self::Male => &MALE,
            Self::Female => &FEMALE,
        }
    }
}

/// Input for a Framingham estimate.
///
/// Wire names follow the inference request (`systolicBP`,
/// `totalCholesterol`, `hdlCholesterol`); the flags default to `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraminghamInput {
    /// Age in years
    pub age: f64,

    pub sex: Sex,

    /// Systolic blood pressure in mmHg
    #[serde(rename = "systolicBP")]
    pub systolic_bp: f64,

    /// Total cholesterol in mg/dL
    #[serde(rename = "totalCholesterol")]
    pub total_cholesterol: f64,

    /// HDL cholesterol in mg/dL
    #[serde(rename = "hdlCholesterol")]
    pub hdl_cholesterol: f64,

    #[serde(rename = "isTreatedForBP", default)]
    pub treated_for_bp: bool,

    #[serde(rename = "isSmoker", default)]
    pub smoker: bool,

    #[serde(rename = "hasDiabetes", default)]
    pub diabetes: bool,
}

/// Ten-year risk, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraminghamRisk {
    pub ten_year_risk: f64,
}

impl FraminghamInput {
    /// Parse and validate a request body.
    ///
    /// # Errors
    /// Returns [`InputError::Parse`] for malformed JSON or a missing field,
    /// [`InputError::OutOfRange`] for values outside the calibrated ranges.
    pub fn from_json(body: &str) -> Result<Self, InputError> {
        let input: Self =
            serde_json::from_str(body).map_err(|e| InputError::Parse(e.to_string()))?;
        input.validate().map_err(InputError::OutOfRange)?;
        Ok(input)
    }

    /// Check the vitals against the ranges the coefficients were fitted on.
    ///
    /// # Errors
    /// Returns every violation as a string.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for (name, value, min, max) in [
            ("Age", self.age, 20.0, 79.0),
            ("Total cholesterol", self.total_cholesterol, 100.0, 400.0),
            ("HDL cholesterol", self.hdl_cholesterol, 20.0, 100.0),
            ("Systolic BP", self.systolic_bp, 90.0, 200.0),
        ] {
            if !(min..=max).contains(&value) {
                errors.push(format!("{name} {value} out of range [{min}, {max}]"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Weighted sum of the log-transformed vitals and flags.
    fn coefficient_sum(&self) -> f64 {
        let c = self.sex.coefficients();
        let sbp_weight = if self.treated_for_bp {
            c.ln_sbp_treated
        } else {
            c.ln_sbp_untreated
        };

        c.ln_age * self.age.ln()
            + c.ln_total_chol * self.total_cholesterol.ln()
            + c.ln_hdl * self.hdl_cholesterol.ln()
            + sbp_weight * self.systolic_bp.ln()
            + c.smoker * f64::from(u8::from(self.smoker))
            + c.diabetes * f64::from(u8::from(self.diabetes))
    }
}

/// Ten-year cardiovascular risk for a validated input.
///
/// # Errors
/// Returns [`InputError::OutOfRange`] if the input fails validation.
pub fn ten_year_risk(input: &FraminghamInput) -> Result<FraminghamRisk, InputError> {
    input.validate().map_err(InputError::OutOfRange)?;

    let c = input.sex.coefficients();
    let exponent = (input.coefficient_sum() - c.mean_coefficient_sum).exp();
    let risk = 1.0 - c.baseline_survival.powf(exponent);

    Ok(FraminghamRisk {
        ten_year_risk: risk * 100.0,
    })
}
