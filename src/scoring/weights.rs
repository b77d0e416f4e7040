//! Scoring configuration: category weights and per-factor thresholds.
//!
//! Every constant used by the composite scorer lives here so it can be
//! inspected, serialized with a run, or overridden from a TOML file. The
//! defaults reproduce the reference policy exactly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Relative weight of each score category.
///
/// The weights describe the category caps (35/30/25/10 out of 100); the scorer
/// adds clipped sub-scores directly rather than multiplying by these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub habitability: f64,
    pub detectability: f64,
    pub biosignature: f64,
    pub stellar_activity: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            habitability: 0.35,
            detectability: 0.30,
            biosignature: 0.25,
            stellar_activity: 0.10,
        }
    }
}

impl CategoryWeights {
    /// Weights must sum to ~1.0.
    pub fn validate(&self) -> bool {
        let sum = self.as_array().iter().sum::<f64>();
        (sum - 1.0).abs() < 1e-6
    }

    pub fn as_array(&self) -> [f64; 4] {
        [
            self.habitability,
            self.detectability,
            self.biosignature,
            self.stellar_activity,
        ]
    }
}

/// Habitability factors: HZ placement, planet size, equilibrium temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitabilityRules {
    pub hz_bonus: f64,
    pub hz_margin_bonus: f64,
    /// Margin below the inner edge, as a fraction of it.
    pub hz_inner_margin: f64,
    /// Margin above the outer edge, as a multiple of it.
    pub hz_outer_margin: f64,

    pub earth_size_range: [f64; 2],
    pub earth_size_bonus: f64,
    pub super_earth_max: f64,
    pub super_earth_bonus: f64,
    pub giant_min: f64,
    pub giant_penalty: f64,

    pub temperate_range: [f64; 2],
    pub temperate_bonus: f64,
    pub mild_range: [f64; 2],
    pub mild_bonus: f64,
    pub hostile_penalty: f64,
}

impl Default for HabitabilityRules {
    fn default() -> Self {
        Self {
            hz_bonus: 25.0,
            hz_margin_bonus: 12.0,
            hz_inner_margin: 0.75,
            hz_outer_margin: 1.25,

            earth_size_range: [0.8, 1.2],
            earth_size_bonus: 20.0,
            super_earth_max: 2.0,
            super_earth_bonus: 15.0,
            giant_min: 4.0,
            giant_penalty: -15.0,

            temperate_range: [250.0, 350.0],
            temperate_bonus: 20.0,
            mild_range: [200.0, 400.0],
            mild_bonus: 10.0,
            hostile_penalty: -10.0,
        }
    }
}

/// One J-band brightness tier: stars fainter than the previous tier and
/// brighter than `below` receive `bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeTier {
    pub below: f64,
    pub bonus: f64,
}

/// Detectability factors: host brightness, period, transit depth, spectral type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectabilityRules {
    /// Hosts brighter than this saturate the detector.
    pub saturation_jmag: f64,
    pub saturation_penalty: f64,
    /// Ascending by `below`.
    pub jmag_tiers: Vec<MagnitudeTier>,
    pub faint_bonus: f64,

    pub period_range: [f64; 2],
    pub period_bonus: f64,
    pub long_period_min: f64,
    pub long_period_penalty: f64,

    pub deep_transit_ppm: f64,
    pub deep_transit_bonus: f64,
    pub moderate_transit_ppm: f64,
    pub moderate_transit_bonus: f64,

    pub m_dwarf_bonus: f64,
    pub fgk_bonus: f64,
}

impl Default for DetectabilityRules {
    fn default() -> Self {
        Self {
            saturation_jmag: 6.0,
            saturation_penalty: -10.0,
            jmag_tiers: vec![
                MagnitudeTier {
                    below: 8.0,
                    bonus: 25.0,
                },
                MagnitudeTier {
                    below: 10.0,
                    bonus: 20.0,
                },
                MagnitudeTier {
                    below: 12.0,
                    bonus: 15.0,
                },
            ],
            faint_bonus: 5.0,

            period_range: [1.0, 50.0],
            period_bonus: 10.0,
            long_period_min: 100.0,
            long_period_penalty: -5.0,

            deep_transit_ppm: 1000.0,
            deep_transit_bonus: 5.0,
            moderate_transit_ppm: 500.0,
            moderate_transit_bonus: 3.0,

            m_dwarf_bonus: 15.0,
            fgk_bonus: 5.0,
        }
    }
}

/// Biosignature plausibility: base score plus a rocky-density bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiosignatureRules {
    pub base: f64,
    /// Density proxy `M / R^3` in Earth units.
    pub rocky_density_range: [f64; 2],
    pub rocky_bonus: f64,
}

impl Default for BiosignatureRules {
    fn default() -> Self {
        Self {
            base: 20.0,
            rocky_density_range: [3.0, 8.0],
            rocky_bonus: 5.0,
        }
    }
}

/// Stellar activity proxy from host age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityRules {
    pub old_age_gyr: f64,
    pub old_bonus: f64,
    pub young_age_gyr: f64,
    pub young_penalty: f64,
}

impl Default for ActivityRules {
    fn default() -> Self {
        Self {
            old_age_gyr: 5.0,
            old_bonus: 5.0,
            young_age_gyr: 1.0,
            young_penalty: -5.0,
        }
    }
}

/// Full scoring policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: CategoryWeights,
    pub habitability: HabitabilityRules,
    pub detectability: DetectabilityRules,
    pub biosignature: BiosignatureRules,
    pub activity: ActivityRules,
}

impl ScoringConfig {
    /// Read a (possibly partial) config from TOML; omitted keys keep defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to read scoring config {}: {e}", path.display()),
            )
        })?;
        let config: ScoringConfig = toml::from_str(&text).map_err(|e| {
            AppError::new(
                2,
                format!("Invalid scoring config {}: {e}", path.display()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.weights.validate() {
            return Err(AppError::new(2, "Category weights must sum to 1.0."));
        }

        let h = &self.habitability;
        let d = &self.detectability;
        let b = &self.biosignature;
        let ranges = [
            ("habitability.earth_size_range", h.earth_size_range),
            ("habitability.temperate_range", h.temperate_range),
            ("habitability.mild_range", h.mild_range),
            ("detectability.period_range", d.period_range),
            ("biosignature.rocky_density_range", b.rocky_density_range),
        ];
        for (name, [lo, hi]) in ranges {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(AppError::new(2, format!("Invalid range for {name}.")));
            }
        }

        if !d.jmag_tiers.windows(2).all(|w| w[0].below <= w[1].below) {
            return Err(AppError::new(
                2,
                "detectability.jmag_tiers must be sorted by `below`.",
            ));
        }
        if !(h.hz_inner_margin > 0.0 && h.hz_inner_margin <= 1.0 && h.hz_outer_margin >= 1.0) {
            return Err(AppError::new(2, "Invalid habitable-zone margins."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!(CategoryWeights::default().validate());
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ScoringConfig = toml::from_str(
            r#"
            [habitability]
            hz_bonus = 30.0

            [activity]
            old_bonus = 4.0
            "#,
        )
        .unwrap();
        assert_eq!(config.habitability.hz_bonus, 30.0);
        assert_eq!(config.habitability.hz_margin_bonus, 12.0);
        assert_eq!(config.activity.old_bonus, 4.0);
        assert_eq!(config.detectability, DetectabilityRules::default());
    }

    #[test]
    fn rejects_inverted_range() {
        let mut config = ScoringConfig::default();
        config.habitability.temperate_range = [350.0, 250.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unbalanced_weights() {
        let mut config = ScoringConfig::default();
        config.weights.habitability += 0.1;
        let err = config.validate().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
