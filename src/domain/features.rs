//! Feature contract shared by the training and inference pipelines.
//!
//! The classifier only ever sees a [`FeatureVector`]: 20 base columns followed
//! by 2 interaction columns, in the exact order of [`FEATURE_NAMES`]. Training
//! builds its design matrix through [`BaseFeatures`] as well, so both sides
//! agree on layout by construction.

use serde::{Deserialize, Serialize};

use super::clinical::RawClinicalInput;

/// Number of base columns (continuous + indicator).
pub const BASE_FEATURE_COUNT: usize = 20;

/// Number of columns the classifier consumes (base + interactions).
pub const FEATURE_COUNT: usize = 22;

/// Canonical column order of the design matrix.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age",
    "sex",
    "trestbps",
    "chol",
    "fbs",
    "thalach",
    "exang",
    "oldpeak",
    "cp_1",
    "cp_2",
    "cp_3",
    "restecg_1",
    "restecg_2",
    "slope_1",
    "slope_2",
    "ca_1",
    "ca_2",
    "ca_3",
    "thal_2",
    "thal_3",
    "ca_total",
    "cp_highrisk",
];

/// One of the 20 base columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseColumn {
    Age,
    Sex,
    Trestbps,
    Chol,
    Fbs,
    Thalach,
    Exang,
    Oldpeak,
    Cp1,
    Cp2,
    Cp3,
    Restecg1,
    Restecg2,
    Slope1,
    Slope2,
    Ca1,
    Ca2,
    Ca3,
    Thal2,
    Thal3,
}

impl BaseColumn {
    /// All base columns in canonical order.
    pub const ALL: [BaseColumn; BASE_FEATURE_COUNT] = [
        Self::Age,
        Self::Sex,
        Self::Trestbps,
        Self::Chol,
        Self::Fbs,
        Self::Thalach,
        Self::Exang,
        Self::Oldpeak,
        Self::Cp1,
        Self::Cp2,
        Self::Cp3,
        Self::Restecg1,
        Self::Restecg2,
        Self::Slope1,
        Self::Slope2,
        Self::Ca1,
        Self::Ca2,
        Self::Ca3,
        Self::Thal2,
        Self::Thal3,
    ];

    /// Position of this column in the design matrix.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name as used in persisted artifacts.
    #[must_use]
    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }
}

/// Columns standardized by the fitted scaler. Everything else is 0/1.
pub const CONTINUOUS_COLUMNS: [BaseColumn; 5] = [
    BaseColumn::Age,
    BaseColumn::Trestbps,
    BaseColumn::Chol,
    BaseColumn::Thalach,
    BaseColumn::Oldpeak,
];

/// Columns with no counterpart in [`RawClinicalInput`].
///
/// Inference pins these to the values below. They are part of the contract,
/// not a fallback for missing request fields.
pub const FROZEN_COLUMNS: [(BaseColumn, f64); 14] = [
    (BaseColumn::Fbs, 0.0),
    (BaseColumn::Exang, 0.0),
    (BaseColumn::Oldpeak, 0.0),
    (BaseColumn::Cp1, 0.0),
    (BaseColumn::Cp3, 0.0),
    (BaseColumn::Restecg1, 1.0),
    (BaseColumn::Restecg2, 0.0),
    (BaseColumn::Slope1, 1.0),
    (BaseColumn::Slope2, 0.0),
    (BaseColumn::Ca1, 0.0),
    (BaseColumn::Ca2, 0.0),
    (BaseColumn::Ca3, 0.0),
    (BaseColumn::Thal2, 1.0),
    (BaseColumn::Thal3, 0.0),
];

/// Error raised when a feature layout does not match [`FEATURE_NAMES`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Feature width mismatch: expected {expected} columns, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("Feature name mismatch at column {index}: expected {expected}, got {actual}")]
    NameMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
}

/// The 20 base columns, before interaction features are appended.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseFeatures {
    pub age: f64,
    pub sex: f64,
    pub trestbps: f64,
    pub chol: f64,
    pub fbs: f64,
    pub thalach: f64,
    pub exang: f64,
    pub oldpeak: f64,
    pub cp_1: f64,
    pub cp_2: f64,
    pub cp_3: f64,
    pub restecg_1: f64,
    pub restecg_2: f64,
    pub slope_1: f64,
    pub slope_2: f64,
    pub ca_1: f64,
    pub ca_2: f64,
    pub ca_3: f64,
    pub thal_2: f64,
    pub thal_3: f64,
}

impl BaseFeatures {
    /// Read a column by name.
    #[must_use]
    pub fn get(&self, column: BaseColumn) -> f64 {
        match column {
            BaseColumn::Age => self.age,
            BaseColumn::Sex => self.sex,
            BaseColumn::Trestbps => self.trestbps,
            BaseColumn::Chol => self.chol,
            BaseColumn::Fbs => self.fbs,
            BaseColumn::Thalach => self.thalach,
            BaseColumn::Exang => self.exang,
            BaseColumn::Oldpeak => self.oldpeak,
            BaseColumn::Cp1 => self.cp_1,
            BaseColumn::Cp2 => self.cp_2,
            BaseColumn::Cp3 => self.cp_3,
            BaseColumn::Restecg1 => self.restecg_1,
            BaseColumn::Restecg2 => self.restecg_2,
            BaseColumn::Slope1 => self.slope_1,
            BaseColumn::Slope2 => self.slope_2,
            BaseColumn::Ca1 => self.ca_1,
            BaseColumn::Ca2 => self.ca_2,
            BaseColumn::Ca3 => self.ca_3,
            BaseColumn::Thal2 => self.thal_2,
            BaseColumn::Thal3 => self.thal_3,
        }
    }

    /// Overwrite a column.
    pub fn set(&mut self, column: BaseColumn, value: f64) {
        let slot = match column {
            BaseColumn::Age => &mut self.age,
            BaseColumn::Sex => &mut self.sex,
            BaseColumn::Trestbps => &mut self.trestbps,
            BaseColumn::Chol => &mut self.chol,
            BaseColumn::Fbs => &mut self.fbs,
            BaseColumn::Thalach => &mut self.thalach,
            BaseColumn::Exang => &mut self.exang,
            BaseColumn::Oldpeak => &mut self.oldpeak,
            BaseColumn::Cp1 => &mut self.cp_1,
            BaseColumn::Cp2 => &mut self.cp_2,
            BaseColumn::Cp3 => &mut self.cp_3,
            BaseColumn::Restecg1 => &mut self.restecg_1,
            BaseColumn::Restecg2 => &mut self.restecg_2,
            BaseColumn::Slope1 => &mut self.slope_1,
            BaseColumn::Slope2 => &mut self.slope_2,
            BaseColumn::Ca1 => &mut self.ca_1,
            BaseColumn::Ca2 => &mut self.ca_2,
            BaseColumn::Ca3 => &mut self.ca_3,
            BaseColumn::Thal2 => &mut self.thal_2,
            BaseColumn::Thal3 => &mut self.thal_3,
        };
        *slot = value;
    }

    /// Columns in canonical order.
    #[must_use]
    pub fn to_array(&self) -> [f64; BASE_FEATURE_COUNT] {
        BaseColumn::ALL.map(|column| self.get(column))
    }
}

/// Full classifier input: base columns plus interaction features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub base: BaseFeatures,
    pub ca_total: f64,
    pub cp_highrisk: f64,
}

impl FeatureVector {
    /// Columns in canonical order, ready for the classifier.
    #[must_use]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        out[..BASE_FEATURE_COUNT].copy_from_slice(&self.base.to_array());
        out[BASE_FEATURE_COUNT] = self.ca_total;
        out[BASE_FEATURE_COUNT + 1] = self.cp_highrisk;
        out
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Build the base columns for one inference request.
///
/// `sex` and `cp_2` are both driven by `sex == "male"`. That coupling is kept
/// for compatibility with the fitted model; see DESIGN.md before changing it.
#[must_use]
pub fn encode(input: &RawClinicalInput) -> BaseFeatures {
    let male = indicator(input.is_male());

    let mut base = BaseFeatures {
        age: input.age,
        sex: male,
        trestbps: input.systolic_bp,
        chol: input.total_cholesterol,
        thalach: input.hdl_cholesterol,
        cp_2: male,
        ..BaseFeatures::default()
    };

    for (column, value) in FROZEN_COLUMNS {
        base.set(column, value);
    }

    base
}

/// Append `ca_total` and `cp_highrisk`.
///
/// Must run on a fully populated (and, at inference, already scaled) base.
#[must_use]
pub fn derive_interactions(base: BaseFeatures) -> FeatureVector {
    FeatureVector {
        ca_total: base.ca_1 + base.ca_2 + base.ca_3,
        cp_highrisk: base.cp_2 + base.cp_3,
        base,
    }
}

/// Check that a model's declared feature layout matches [`FEATURE_NAMES`].
///
/// # Errors
/// Returns [`SchemaError`] on the first width or name difference.
pub fn check_schema<S: AsRef<str>>(names: &[S]) -> Result<(), SchemaError> {
    if names.len() != FEATURE_COUNT {
        return Err(SchemaError::WidthMismatch {
            expected: FEATURE_COUNT,
            actual: names.len(),
        });
    }

    for (index, (expected, actual)) in FEATURE_NAMES.iter().zip(names).enumerate() {
        if *expected != actual.as_ref() {
            return Err(SchemaError::NameMismatch {
                index,
                expected: (*expected).to_string(),
                actual: actual.as_ref().to_string(),
            });
        }
    }

    Ok(())
}

/// [`FEATURE_NAMES`] as owned strings, for persisted artifacts.
#[must_use]
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn input(sex: &str) -> RawClinicalInput {
        RawClinicalInput {
            age: 54.0,
            sex: sex.to_string(),
            systolic_bp: 130.0,
            total_cholesterol: 246.0,
            hdl_cholesterol: 150.0,
        }
    }

    #[test]
    fn test_base_column_order_matches_names() {
        for (i, column) in BaseColumn::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
            assert_eq!(column.name(), FEATURE_NAMES[i]);
        }
        assert_eq!(FEATURE_NAMES[20], "ca_total");
        assert_eq!(FEATURE_NAMES[21], "cp_highrisk");
    }

    #[test]
    fn test_every_base_column_is_accounted_for() {
        // Copied from input, driven by sex, or frozen: nothing else.
        let mut covered: HashSet<BaseColumn> = HashSet::new();
        covered.extend([
            BaseColumn::Age,
            BaseColumn::Trestbps,
            BaseColumn::Chol,
            BaseColumn::Thalach,
            BaseColumn::Sex,
            BaseColumn::Cp2,
        ]);
        for (column, _) in FROZEN_COLUMNS {
            assert!(covered.insert(column), "{} listed twice", column.name());
        }
        assert_eq!(covered.len(), BASE_FEATURE_COUNT);
    }

    #[test]
    fn test_encode_copies_vitals_into_continuous_slots() {
        let base = encode(&input("male"));
        assert_eq!(base.age, 54.0);
        assert_eq!(base.trestbps, 130.0);
        assert_eq!(base.chol, 246.0);
        assert_eq!(base.thalach, 150.0);
        assert_eq!(base.oldpeak, 0.0);
    }

    #[test]
    fn test_encode_applies_frozen_table() {
        let base = encode(&input("female"));
        for (column, value) in FROZEN_COLUMNS {
            assert_eq!(base.get(column), value, "column {}", column.name());
        }
        assert_eq!(base.restecg_1, 1.0);
        assert_eq!(base.slope_1, 1.0);
        assert_eq!(base.thal_2, 1.0);
    }

    #[test]
    fn test_encoded_reference_rows_are_pinned() {
        #[rustfmt::skip]
        let male: [f64; BASE_FEATURE_COUNT] = [
            54.0, 1.0, 130.0, 246.0, 0.0, 150.0, 0.0, 0.0, 0.0, 1.0,
            0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0,
        ];
        #[rustfmt::skip]
        let female: [f64; BASE_FEATURE_COUNT] = [
            54.0, 0.0, 130.0, 246.0, 0.0, 150.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0,
        ];

        assert_eq!(encode(&input("male")).to_array(), male);
        assert_eq!(encode(&input("female")).to_array(), female);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let raw = input("male");
        assert_eq!(encode(&raw), encode(&raw));
        assert_eq!(encode(&raw).to_array(), encode(&raw).to_array());
    }

    #[test]
    fn test_male_drives_sex_and_chest_pain() {
        let fv = derive_interactions(encode(&input("male")));
        assert_eq!(fv.base.sex, 1.0);
        assert_eq!(fv.base.cp_2, 1.0);
        assert_eq!(fv.cp_highrisk, 1.0);
    }

    #[test]
    fn test_non_male_values_clear_sex_and_chest_pain() {
        for sex in ["female", "Male", "MALE", "", "other"] {
            let fv = derive_interactions(encode(&input(sex)));
            assert_eq!(fv.base.sex, 0.0, "sex={sex:?}");
            assert_eq!(fv.base.cp_2, 0.0, "sex={sex:?}");
            assert_eq!(fv.cp_highrisk, 0.0, "sex={sex:?}");
        }
    }

    #[test]
    fn test_ca_total_is_always_zero() {
        for sex in ["male", "female"] {
            for age in [18.0, 54.0, 99.0] {
                let mut raw = input(sex);
                raw.age = age;
                assert_eq!(derive_interactions(encode(&raw)).ca_total, 0.0);
            }
        }
    }

    #[test]
    fn test_derive_interactions_sums_indicators() {
        let base = BaseFeatures {
            ca_1: 1.0,
            ca_3: 1.0,
            cp_2: 1.0,
            cp_3: 1.0,
            ..BaseFeatures::default()
        };
        let fv = derive_interactions(base);
        assert_eq!(fv.ca_total, 2.0);
        assert_eq!(fv.cp_highrisk, 2.0);
    }

    #[test]
    fn test_feature_vector_layout() {
        let fv = derive_interactions(encode(&input("male")));
        let arr = fv.to_array();
        assert_eq!(arr.len(), FEATURE_COUNT);
        assert_eq!(arr[0], 54.0);
        assert_eq!(arr[1], 1.0);
        assert_eq!(arr[9], 1.0);
        assert_eq!(arr[11], 1.0);
        assert_eq!(arr[20], 0.0);
        assert_eq!(arr[21], 1.0);
    }

    #[test]
    fn test_check_schema() {
        assert!(check_schema(&FEATURE_NAMES).is_ok());
        assert!(check_schema(&feature_names()).is_ok());

        let short = &FEATURE_NAMES[..BASE_FEATURE_COUNT];
        assert_eq!(
            check_schema(short),
            Err(SchemaError::WidthMismatch {
                expected: 22,
                actual: 20
            })
        );

        let mut swapped = feature_names();
        swapped.swap(2, 3);
        match check_schema(&swapped) {
            Err(SchemaError::NameMismatch { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected name mismatch, got {other:?}"),
        }
    }
}
