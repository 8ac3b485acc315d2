//! Standardization of the continuous columns.
//!
//! Statistics are fitted once on the training split and frozen. Inference only
//! ever applies a previously fitted [`ScalerState`].

use serde::{Deserialize, Serialize};

use super::features::{BaseFeatures, CONTINUOUS_COLUMNS};

/// Minimum rows for a meaningful fit. One row has no variance.
pub const MIN_FIT_ROWS: usize = 2;

/// Error type for scaler fitting and application.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScalerError {
    #[error("Cannot fit scaler on {rows} row(s); need at least {MIN_FIT_ROWS}")]
    InsufficientRows { rows: usize },

    #[error("Scaler columns {actual:?} do not match continuous columns {expected:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Invalid statistic for column {column}: {reason}")]
    InvalidStatistic { column: String, reason: String },
}

/// Fitted per-column mean and scale for the continuous columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    /// Column names, in [`CONTINUOUS_COLUMNS`] order
    pub columns: Vec<String>,

    /// Per-column mean
    pub mean: Vec<f64>,

    /// Per-column scale (population standard deviation, 1.0 for constant columns)
    pub scale: Vec<f64>,

    /// Rows the statistics were computed from
    pub n_samples_seen: usize,
}

fn continuous_names() -> Vec<String> {
    CONTINUOUS_COLUMNS
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

impl ScalerState {
    /// Fit mean and scale on training rows.
    ///
    /// A constant column gets scale 1.0 so it is centred but not divided by
    /// zero.
    ///
    /// # Errors
    /// Returns [`ScalerError::InsufficientRows`] for fewer than
    /// [`MIN_FIT_ROWS`] rows and [`ScalerError::InvalidStatistic`] if a
    /// column contains non-finite values.
    pub fn fit(rows: &[BaseFeatures]) -> Result<Self, ScalerError> {
        if rows.len() < MIN_FIT_ROWS {
            return Err(ScalerError::InsufficientRows { rows: rows.len() });
        }

        let n = rows.len() as f64;
        let mut mean = Vec::with_capacity(CONTINUOUS_COLUMNS.len());
        let mut scale = Vec::with_capacity(CONTINUOUS_COLUMNS.len());

        for column in CONTINUOUS_COLUMNS {
            let m = rows.iter().map(|r| r.get(column)).sum::<f64>() / n;
            let var = rows
                .iter()
                .map(|r| {
                    let d = r.get(column) - m;
                    d * d
                })
                .sum::<f64>()
                / n;
            let std = var.sqrt();

            if !m.is_finite() || !std.is_finite() {
                return Err(ScalerError::InvalidStatistic {
                    column: column.name().to_string(),
                    reason: "non-finite training values".into(),
                });
            }

            mean.push(m);
            scale.push(if std == 0.0 { 1.0 } else { std });
        }

        let state = Self {
            columns: continuous_names(),
            mean,
            scale,
            n_samples_seen: rows.len(),
        };

        tracing::debug!(
            "Fitted scaler on {} rows: mean={:?}, scale={:?}",
            state.n_samples_seen,
            state.mean,
            state.scale
        );

        Ok(state)
    }

    /// Check the state against the continuous-column contract.
    ///
    /// # Errors
    /// Returns [`ScalerError`] if columns, lengths or statistics are invalid.
    pub fn validate(&self) -> Result<(), ScalerError> {
        let expected = continuous_names();
        if self.columns != expected {
            return Err(ScalerError::ColumnMismatch {
                expected,
                actual: self.columns.clone(),
            });
        }

        for (i, column) in self.columns.iter().enumerate() {
            let (Some(m), Some(s)) = (self.mean.get(i), self.scale.get(i)) else {
                return Err(ScalerError::InvalidStatistic {
                    column: column.clone(),
                    reason: format!(
                        "expected {} means and scales, got {} and {}",
                        self.columns.len(),
                        self.mean.len(),
                        self.scale.len()
                    ),
                });
            };
            if !m.is_finite() {
                return Err(ScalerError::InvalidStatistic {
                    column: column.clone(),
                    reason: format!("mean {m} is not finite"),
                });
            }
            if !s.is_finite() || *s <= 0.0 {
                return Err(ScalerError::InvalidStatistic {
                    column: column.clone(),
                    reason: format!("scale {s} must be finite and positive"),
                });
            }
        }

        if self.mean.len() != self.columns.len() || self.scale.len() != self.columns.len() {
            return Err(ScalerError::InvalidStatistic {
                column: self.columns.join(","),
                reason: "more statistics than columns".into(),
            });
        }

        Ok(())
    }

    /// Standardize the continuous columns; indicators pass through.
    ///
    /// # Errors
    /// Returns [`ScalerError`] if this state does not satisfy [`Self::validate`].
    pub fn transform(&self, base: &BaseFeatures) -> Result<BaseFeatures, ScalerError> {
        self.validate()?;

        let mut out = *base;
        for (i, column) in CONTINUOUS_COLUMNS.iter().enumerate() {
            out.set(*column, (base.get(*column) - self.mean[i]) / self.scale[i]);
        }
        Ok(out)
    }
}

/// Apply a fitted scaler to one row.
///
/// # Errors
/// See [`ScalerState::transform`].
pub fn scale(base: &BaseFeatures, scaler: &ScalerState) -> Result<BaseFeatures, ScalerError> {
    scaler.transform(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::{encode, BaseColumn};
    use crate::domain::RawClinicalInput;
    use approx::assert_abs_diff_eq;

    fn row(age: f64, trestbps: f64, chol: f64, thalach: f64, oldpeak: f64) -> BaseFeatures {
        BaseFeatures {
            age,
            trestbps,
            chol,
            thalach,
            oldpeak,
            sex: 1.0,
            thal_2: 1.0,
            ..BaseFeatures::default()
        }
    }

    fn fitted() -> ScalerState {
        ScalerState {
            columns: continuous_names(),
            mean: vec![54.0, 131.0, 246.0, 149.0, 1.0],
            scale: vec![9.0, 17.5, 51.0, 22.5, 1.2],
            n_samples_seen: 242,
        }
    }

    #[test]
    fn test_fit_population_statistics() {
        let rows = vec![
            row(40.0, 120.0, 200.0, 150.0, 0.0),
            row(60.0, 140.0, 300.0, 170.0, 2.0),
        ];
        let scaler = ScalerState::fit(&rows).expect("Should fit");

        assert_eq!(scaler.columns, vec!["age", "trestbps", "chol", "thalach", "oldpeak"]);
        assert_abs_diff_eq!(scaler.mean[0], 50.0);
        assert_abs_diff_eq!(scaler.scale[0], 10.0);
        assert_abs_diff_eq!(scaler.mean[2], 250.0);
        assert_abs_diff_eq!(scaler.scale[2], 50.0);
        assert_abs_diff_eq!(scaler.scale[4], 1.0);
        assert_eq!(scaler.n_samples_seen, 2);
    }

    #[test]
    fn test_constant_column_gets_unit_scale() {
        let rows = vec![
            row(40.0, 120.0, 200.0, 150.0, 0.0),
            row(60.0, 120.0, 300.0, 170.0, 0.0),
        ];
        let scaler = ScalerState::fit(&rows).expect("Should fit");
        assert_eq!(scaler.scale[1], 1.0);
        assert_eq!(scaler.scale[4], 1.0);
    }

    #[test]
    fn test_single_row_fit_is_refused() {
        let rows = vec![row(54.0, 130.0, 246.0, 150.0, 0.0)];
        assert_eq!(
            ScalerState::fit(&rows),
            Err(ScalerError::InsufficientRows { rows: 1 })
        );
        assert!(ScalerState::fit(&[]).is_err());
    }

    #[test]
    fn test_transform_matches_independent_formula() {
        let scaler = fitted();
        let raw = RawClinicalInput {
            age: 54.0,
            sex: "male".into(),
            systolic_bp: 130.0,
            total_cholesterol: 246.0,
            hdl_cholesterol: 150.0,
        };
        let base = encode(&raw);
        let scaled = scale(&base, &scaler).expect("Should scale");

        let expected = [
            (54.0 - 54.0) / 9.0,
            (130.0 - 131.0) / 17.5,
            (246.0 - 246.0) / 51.0,
            (150.0 - 149.0) / 22.5,
            (0.0 - 1.0) / 1.2,
        ];
        for (column, want) in CONTINUOUS_COLUMNS.iter().zip(expected) {
            assert_eq!(scaled.get(*column), want, "column {}", column.name());
        }
    }

    #[test]
    fn test_transform_leaves_indicators_untouched() {
        let scaler = fitted();
        let base = row(54.0, 130.0, 246.0, 150.0, 0.0);
        let scaled = scaler.transform(&base).expect("Should scale");

        for column in BaseColumn::ALL {
            if CONTINUOUS_COLUMNS.contains(&column) {
                continue;
            }
            assert_eq!(scaled.get(column), base.get(column), "column {}", column.name());
        }
    }

    #[test]
    fn test_transform_uses_training_statistics_not_the_row() {
        // A refit on the row itself would centre everything to zero.
        let scaler = fitted();
        let scaled = scaler
            .transform(&row(80.0, 180.0, 400.0, 100.0, 0.0))
            .expect("Should scale");
        assert_abs_diff_eq!(scaled.age, 26.0 / 9.0, epsilon = 1e-12);
        assert!(scaled.chol > 0.0);
        assert!(scaled.thalach < 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_states() {
        let mut reordered = fitted();
        reordered.columns.swap(0, 1);
        assert!(matches!(
            reordered.validate(),
            Err(ScalerError::ColumnMismatch { .. })
        ));

        let mut short = fitted();
        short.scale.pop();
        assert!(matches!(
            short.validate(),
            Err(ScalerError::InvalidStatistic { .. })
        ));

        let mut zero = fitted();
        zero.scale[2] = 0.0;
        assert!(zero.transform(&BaseFeatures::default()).is_err());

        let mut long = fitted();
        long.mean.push(0.0);
        assert!(long.validate().is_err());
    }
}
