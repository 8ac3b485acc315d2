//! Inference request types.
//!
//! A request carries five vitals. All of them are required: a missing or
//! mistyped field is rejected here, before any feature encoding happens.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for malformed inference requests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("Request is not a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Implausible clinical values: {}", .0.join("; "))]
    OutOfRange(Vec<String>),

    #[error("Invalid JSON: {0}")]
    Parse(String),
}

/// Clinical input for one risk estimate.
///
/// Field names on the wire are camelCase (`systolicBP`, `totalCholesterol`,
/// `hdlCholesterol`). Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct RawClinicalInput {
    /// Age in years
    pub age: f64,

    /// "male" or anything else; compared exactly, case-sensitive
    pub sex: String,

    /// Systolic blood pressure in mmHg
    #[serde(rename = "systolicBP")]
    pub systolic_bp: f64,

    /// Total cholesterol in mg/dL
    #[serde(rename = "totalCholesterol")]
    pub total_cholesterol: f64,

    /// HDL cholesterol in mg/dL
    #[serde(rename = "hdlCholesterol")]
    pub hdl_cholesterol: f64,
}

fn required<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, InputError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(InputError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

fn required_number(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<f64, InputError> {
    required(obj, field)?
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or(InputError::WrongType {
            field,
            expected: "finite number",
        })
}

impl RawClinicalInput {
    /// Parse a request body.
    ///
    /// # Errors
    /// Returns [`InputError`] if the body is not JSON, a field is missing or
    /// mistyped, or a value is implausible.
    pub fn from_json(body: &str) -> Result<Self, InputError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| InputError::Parse(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Extract and validate the five required fields.
    ///
    /// # Errors
    /// Same as [`RawClinicalInput::from_json`].
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        let obj = value.as_object().ok_or(InputError::NotAnObject)?;

        let input = Self {
            age: required_number(obj, "age")?,
            sex: required(obj, "sex")?
                .as_str()
                .ok_or(InputError::WrongType {
                    field: "sex",
                    expected: "string",
                })?
                .to_string(),
            systolic_bp: required_number(obj, "systolicBP")?,
            total_cholesterol: required_number(obj, "totalCholesterol")?,
            hdl_cholesterol: required_number(obj, "hdlCholesterol")?,
        };

        input.validate().map_err(InputError::OutOfRange)?;
        Ok(input)
    }

    /// Whether the request encodes as male.
    #[must_use]
    pub fn is_male(&self) -> bool {
        self.sex == "male"
    }

    /// Validate that all vitals are within plausible ranges.
    ///
    /// # Errors
    /// Returns validation errors as a vector of strings.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(1.0..=120.0).contains(&self.age) {
            errors.push(format!("Age {} out of range [1, 120]", self.age));
        }
        if !(50.0..=300.0).contains(&self.systolic_bp) {
            errors.push(format!(
                "Systolic BP {} out of range [50, 300]",
                self.systolic_bp
            ));
        }
        if !(50.0..=1000.0).contains(&self.total_cholesterol) {
            errors.push(format!(
                "Total cholesterol {} out of range [50, 1000]",
                self.total_cholesterol
            ));
        }
        if !(5.0..=300.0).contains(&self.hdl_cholesterol) {
            errors.push(format!(
                "HDL cholesterol {} out of range [5, 300]",
                self.hdl_cholesterol
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl TryFrom<Value> for RawClinicalInput {
    type Error = InputError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}
