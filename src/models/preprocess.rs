//! Preprocessing stages fitted on training rows only.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::features::FeatureMatrix;
use crate::math::median_mut;
use crate::train::budget::FitError;

/// Replaces missing cells with the per-column training median.
///
/// A column with no known training values is filled with 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Vec<f64>,
}

impl MedianImputer {
    pub fn fit(x: &FeatureMatrix) -> Self {
        let medians = (0..x.n_cols())
            .map(|j| median_mut(&mut x.known_column(j)).unwrap_or(0.0))
            .collect();
        Self { medians }
    }

    pub fn n_features(&self) -> usize {
        self.medians.len()
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    /// Dense matrix with every gap filled.
    pub fn transform(&self, x: &FeatureMatrix) -> Result<DMatrix<f64>, FitError> {
        if x.n_cols() != self.medians.len() {
            return Err(FitError::WidthMismatch {
                expected: self.medians.len(),
                actual: x.n_cols(),
            });
        }
        let rows = x.rows();
        Ok(DMatrix::from_fn(rows.len(), self.medians.len(), |i, j| {
            match rows[i][j] {
                Some(v) if v.is_finite() => v,
                _ => self.medians[j],
            }
        }))
    }
}

/// Per-column standardization.
///
/// Constant columns keep a unit scale so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    with_mean: bool,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &DMatrix<f64>, with_mean: bool) -> Self {
        let n = x.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(x.ncols());
        let mut scales = Vec::with_capacity(x.ncols());
        for col in x.column_iter() {
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            means.push(mean);
            scales.push(if std.is_finite() && std > 1e-12 { std } else { 1.0 });
        }
        Self {
            with_mean,
            means,
            scales,
        }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, FitError> {
        if x.ncols() != self.scales.len() {
            return Err(FitError::WidthMismatch {
                expected: self.scales.len(),
                actual: x.ncols(),
            });
        }
        Ok(DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
            let centered = if self.with_mean {
                x[(i, j)] - self.means[j]
            } else {
                x[(i, j)]
            };
            centered / self.scales[j]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            2,
            vec![
                vec![Some(1.0), None],
                vec![Some(3.0), None],
                vec![None, None],
                vec![Some(2.0), None],
            ],
        )
        .unwrap()
    }

    #[test]
    fn imputer_fills_with_training_median() {
        let x = matrix();
        let imputer = MedianImputer::fit(&x);
        assert_eq!(imputer.medians(), &[2.0, 0.0]);

        let dense = imputer.transform(&x).unwrap();
        assert_eq!(dense[(2, 0)], 2.0);
        assert_eq!(dense[(0, 1)], 0.0);
        assert_eq!(dense[(1, 0)], 3.0);
    }

    #[test]
    fn imputer_rejects_wrong_width() {
        let imputer = MedianImputer::fit(&matrix());
        let other = FeatureMatrix::from_rows(1, vec![vec![Some(1.0)]]).unwrap();
        assert!(matches!(
            imputer.transform(&other),
            Err(FitError::WidthMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn scaler_standardizes_and_handles_constant_columns() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0, 4.0, 5.0]);
        let scaler = StandardScaler::fit(&x, true);
        let z = scaler.transform(&x).unwrap();
        let mean0: f64 = z.column(0).sum() / 4.0;
        let var0: f64 = z.column(0).iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!(mean0.abs() < 1e-12);
        assert!((var0 - 1.0).abs() < 1e-12);
        assert!(z.column(1).iter().all(|v| *v == 0.0));

        let unc = StandardScaler::fit(&x, false).transform(&x).unwrap();
        assert_eq!(unc[(0, 1)], 5.0);
    }
}
