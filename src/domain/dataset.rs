//! Labeled training records and their mapping onto the feature contract.
//!
//! Raw categorical columns are dummy-encoded with the first level dropped,
//! producing exactly the indicator columns of [`BaseFeatures`].

use serde::{Deserialize, Serialize};

use super::features::{BaseColumn, BaseFeatures};

/// Error type for training data that cannot be mapped onto the contract.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset is empty")]
    Empty,

    #[error("Row {row}: column {column} has level {value}, expected one of {allowed:?}")]
    UnknownLevel {
        row: usize,
        column: &'static str,
        value: f64,
        allowed: &'static [i64],
    },

    #[error("Row {row}: target {value} is not 0 or 1")]
    InvalidLabel { row: usize, value: f64 },

    #[error("Row {row}: column {column} is not finite")]
    NonFinite { row: usize, column: &'static str },

    #[error("Need both classes to train, found only class {0}")]
    SingleClass(u8),
}

/// One row of the raw heart disease dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub age: f64,
    pub sex: f64,
    pub cp: f64,
    pub trestbps: f64,
    pub chol: f64,
    pub fbs: f64,
    pub restecg: f64,
    pub thalach: f64,
    pub exang: f64,
    pub oldpeak: f64,
    pub slope: f64,
    pub ca: f64,
    pub thal: f64,
    pub target: f64,
}

const BINARY: &[i64] = &[0, 1];
const CP_LEVELS: &[i64] = &[0, 1, 2, 3];
const RESTECG_LEVELS: &[i64] = &[0, 1, 2];
const SLOPE_LEVELS: &[i64] = &[0, 1, 2];
const CA_LEVELS: &[i64] = &[0, 1, 2, 3];
const THAL_LEVELS: &[i64] = &[1, 2, 3];

fn level_index(
    row: usize,
    column: &'static str,
    value: f64,
    allowed: &'static [i64],
) -> Result<usize, DatasetError> {
    let unknown = DatasetError::UnknownLevel {
        row,
        column,
        value,
        allowed,
    };
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(unknown);
    }
    allowed
        .iter()
        .position(|&level| level as f64 == value)
        .ok_or(unknown)
}

impl LabeledRecord {
    /// Map this record onto the base columns and a 0/1 label.
    ///
    /// # Errors
    /// Returns [`DatasetError`] for non-finite values, categorical levels
    /// outside the contract, or a label other than 0/1.
    pub fn encode(&self, row: usize) -> Result<(BaseFeatures, u8), DatasetError> {
        for (column, value) in [
            ("age", self.age),
            ("trestbps", self.trestbps),
            ("chol", self.chol),
            ("thalach", self.thalach),
            ("oldpeak", self.oldpeak),
        ] {
            if !value.is_finite() {
                return Err(DatasetError::NonFinite { row, column });
            }
        }

        let mut base = BaseFeatures {
            age: self.age,
            trestbps: self.trestbps,
            chol: self.chol,
            thalach: self.thalach,
            oldpeak: self.oldpeak,
            ..BaseFeatures::default()
        };

        for (column, value, slot) in [
            ("sex", self.sex, BaseColumn::Sex),
            ("fbs", self.fbs, BaseColumn::Fbs),
            ("exang", self.exang, BaseColumn::Exang),
        ] {
            let level = level_index(row, column, value, BINARY)?;
            base.set(slot, level as f64);
        }

        // Drop-first: `indicators[i]` encodes `levels[i + 1]`.
        let categoricals: [(&'static str, f64, &'static [i64], &[BaseColumn]); 5] = [
            (
                "cp",
                self.cp,
                CP_LEVELS,
                &[BaseColumn::Cp1, BaseColumn::Cp2, BaseColumn::Cp3],
            ),
            (
                "restecg",
                self.restecg,
                RESTECG_LEVELS,
                &[BaseColumn::Restecg1, BaseColumn::Restecg2],
            ),
            (
                "slope",
                self.slope,
                SLOPE_LEVELS,
                &[BaseColumn::Slope1, BaseColumn::Slope2],
            ),
            (
                "ca",
                self.ca,
                CA_LEVELS,
                &[BaseColumn::Ca1, BaseColumn::Ca2, BaseColumn::Ca3],
            ),
            (
                "thal",
                self.thal,
                THAL_LEVELS,
                &[BaseColumn::Thal2, BaseColumn::Thal3],
            ),
        ];

        for (column, value, levels, indicators) in categoricals {
            let idx = level_index(row, column, value, levels)?;
            if idx > 0 {
                base.set(indicators[idx - 1], 1.0);
            }
        }

        let label = match self.target {
            t if t == 0.0 => 0,
            t if t == 1.0 => 1,
            value => return Err(DatasetError::InvalidLabel { row, value }),
        };

        Ok((base, label))
    }
}

/// Encoded design matrix (base columns only) with labels.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub rows: Vec<BaseFeatures>,
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Encode every record, failing on the first bad row.
    ///
    /// # Errors
    /// Returns [`DatasetError`] if the input is empty, a row cannot be
    /// encoded, or only one class is present.
    pub fn from_records(records: &[LabeledRecord]) -> Result<Self, DatasetError> {
        if records.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut dataset = Self {
            rows: Vec::with_capacity(records.len()),
            labels: Vec::with_capacity(records.len()),
        };
        for (i, record) in records.iter().enumerate() {
            let (base, label) = record.encode(i)?;
            dataset.rows.push(base);
            dataset.labels.push(label);
        }

        let positives = dataset.labels.iter().filter(|&&l| l == 1).count();
        if positives == 0 {
            return Err(DatasetError::SingleClass(0));
        }
        if positives == dataset.len() {
            return Err(DatasetError::SingleClass(1));
        }

        Ok(dataset)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows and labels at the given indices.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}
