//! Feature derivation: catalog rows to a numeric matrix with explicit gaps.
//!
//! The builder never imputes; `None` cells are resolved later by the model
//! pipeline's median imputer so that imputation statistics come from training
//! data only.

use crate::domain::PlanetRecord;
use crate::error::AppError;
use crate::math::habitable_zone;
use crate::scoring::density_proxy;

/// Column order of the feature matrix.
pub const FEATURE_NAMES: [&str; 17] = [
    "pl_rade",
    "pl_masse",
    "pl_orbper",
    "pl_orbsmax",
    "pl_eqt",
    "st_teff",
    "st_rad",
    "st_mass",
    "st_age",
    "sy_jmag",
    "sy_kmag",
    "st_lum",
    "in_habitable_zone",
    "planet_density",
    "stellar_type_encoded",
    "log_pl_orbper",
    "log_pl_eqt",
];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Row-major matrix of optional feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    n_cols: usize,
    rows: Vec<Vec<Option<f64>>>,
}

impl FeatureMatrix {
    /// Build from rows; every row must have `n_cols` cells.
    pub fn from_rows(n_cols: usize, rows: Vec<Vec<Option<f64>>>) -> Result<Self, AppError> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(AppError::new(
                4,
                format!(
                    "Feature row {i} has {} cells; expected {n_cols}.",
                    row.len()
                ),
            ));
        }
        Ok(Self { n_cols, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    /// Known (finite) values of column `j`.
    pub fn known_column(&self, j: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(j).copied().flatten())
            .filter(|v| v.is_finite())
            .collect()
    }

    /// Sub-matrix with the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            n_cols: self.n_cols,
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Fraction of missing cells per column.
    pub fn missing_fraction(&self) -> Vec<f64> {
        if self.rows.is_empty() {
            return vec![0.0; self.n_cols];
        }
        let n = self.rows.len() as f64;
        (0..self.n_cols)
            .map(|j| (self.rows.len() - self.known_column(j).len()) as f64 / n)
            .collect()
    }
}

/// Derive the feature matrix for a catalog, one row per record.
pub fn build_features(records: &[PlanetRecord]) -> FeatureMatrix {
    FeatureMatrix {
        n_cols: N_FEATURES,
        rows: records.iter().map(|r| feature_row(r).to_vec()).collect(),
    }
}

/// Derive one feature row in [`FEATURE_NAMES`] order.
pub fn feature_row(record: &PlanetRecord) -> [Option<f64>; N_FEATURES] {
    let k = |v: Option<f64>| v.filter(|x| x.is_finite());

    let in_hz = match (
        habitable_zone(record.star_teff, record.star_lum),
        k(record.semi_major_axis),
    ) {
        (Some(hz), Some(a)) if hz.contains(a) => 1.0,
        _ => 0.0,
    };

    let log_period = k(record.orbital_period)
        .map(f64::ln_1p)
        .filter(|v| v.is_finite());
    let log_eqt = k(record.eq_temp).map(|t| t.max(0.0).ln_1p());

    [
        k(record.radius),
        k(record.mass),
        k(record.orbital_period),
        k(record.semi_major_axis),
        k(record.eq_temp),
        k(record.star_teff),
        k(record.star_radius),
        k(record.star_mass),
        k(record.star_age),
        k(record.j_mag),
        k(record.k_mag),
        k(record.star_lum),
        Some(in_hz),
        density_proxy(record.mass, record.radius),
        Some(encode_spectral_type(record.spectral_type.as_deref())),
        log_period,
        log_eqt,
    ]
}

/// Ordinal encoding of the host's spectral class (M=1, K=2, G=3, F=4, other=0).
pub fn encode_spectral_type(spectral: Option<&str>) -> f64 {
    let Some(s) = spectral else {
        return 0.0;
    };
    let s = s.to_uppercase();
    [('M', 1.0), ('K', 2.0), ('G', 3.0), ('F', 4.0)]
        .iter()
        .find(|(c, _)| s.contains(*c))
        .map(|(_, code)| *code)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> usize {
        FEATURE_NAMES.iter().position(|n| *n == name).unwrap()
    }

    #[test]
    fn missing_inputs_stay_missing() {
        let m = build_features(&[PlanetRecord::default()]);
        let row = &m.rows()[0];
        assert_eq!(row.len(), N_FEATURES);
        assert_eq!(row[col("pl_rade")], None);
        assert_eq!(row[col("planet_density")], None);
        assert_eq!(row[col("log_pl_orbper")], None);
        assert_eq!(row[col("log_pl_eqt")], None);
        // Flags and encodings are never missing.
        assert_eq!(row[col("in_habitable_zone")], Some(0.0));
        assert_eq!(row[col("stellar_type_encoded")], Some(0.0));
    }

    #[test]
    fn derived_columns() {
        let record = PlanetRecord {
            radius: Some(2.0),
            mass: Some(16.0),
            orbital_period: Some(std::f64::consts::E - 1.0),
            eq_temp: Some(-5.0),
            star_teff: Some(5778.0),
            semi_major_axis: Some(1.2),
            spectral_type: Some("k1v".to_string()),
            ..PlanetRecord::default()
        };
        let row = feature_row(&record);
        assert_eq!(row[col("planet_density")], Some(2.0));
        assert!((row[col("log_pl_orbper")].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(row[col("log_pl_eqt")], Some(0.0));
        assert_eq!(row[col("in_habitable_zone")], Some(1.0));
        assert_eq!(row[col("stellar_type_encoded")], Some(2.0));
    }

    #[test]
    fn spectral_encoding_prefers_m_first() {
        assert_eq!(encode_spectral_type(Some("M4.5V")), 1.0);
        assert_eq!(encode_spectral_type(Some("G2 V")), 3.0);
        assert_eq!(encode_spectral_type(Some("F8")), 4.0);
        assert_eq!(encode_spectral_type(Some("B9")), 0.0);
        assert_eq!(encode_spectral_type(None), 0.0);
    }

    #[test]
    fn select_and_missing_fraction() {
        let m = FeatureMatrix::from_rows(
            2,
            vec![
                vec![Some(1.0), None],
                vec![Some(2.0), Some(5.0)],
                vec![None, None],
            ],
        )
        .unwrap();
        assert_eq!(m.missing_fraction(), vec![1.0 / 3.0, 2.0 / 3.0]);
        let sub = m.select(&[2, 0]);
        assert_eq!(sub.rows()[0], vec![None, None]);
        assert_eq!(sub.known_column(0), vec![1.0]);
        assert!(FeatureMatrix::from_rows(2, vec![vec![Some(1.0)]]).is_err());
    }
}
