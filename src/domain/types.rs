//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during scoring and training
//! - exported to JSON/CSV
//! - reloaded later for prediction-only runs

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::math::HabitableZone;
use crate::scoring::ScoringConfig;

/// Number of priority classes produced by the label encoder.
pub const N_CLASSES: usize = 5;

/// One planet row from a catalog.
///
/// Every numeric attribute is optional: `None` means "unknown" and must never be
/// read as zero. Column names are resolved into these fields once, at ingest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanetRecord {
    /// `pl_name`
    pub planet_name: Option<String>,
    /// `hostname`
    pub host_name: Option<String>,
    /// `pl_orbper` (days)
    pub orbital_period: Option<f64>,
    /// `pl_orbsmax` (AU)
    pub semi_major_axis: Option<f64>,
    /// `pl_rade` (Earth radii)
    pub radius: Option<f64>,
    /// `pl_masse` (Earth masses)
    pub mass: Option<f64>,
    /// `pl_eqt` (K)
    pub eq_temp: Option<f64>,
    /// `st_teff` (K)
    pub star_teff: Option<f64>,
    /// `st_lum` (solar luminosities, linear)
    pub star_lum: Option<f64>,
    /// `st_rad` (solar radii)
    pub star_radius: Option<f64>,
    /// `st_mass` (solar masses)
    pub star_mass: Option<f64>,
    /// `st_age` (Gyr)
    pub star_age: Option<f64>,
    /// `st_spectype`
    pub spectral_type: Option<String>,
    /// `sy_jmag`
    pub j_mag: Option<f64>,
    /// `sy_kmag`
    pub k_mag: Option<f64>,
    /// `pl_trandep` / `tran_depth` (ppm)
    pub transit_depth: Option<f64>,
    /// `disc_year`
    pub disc_year: Option<f64>,
}

impl PlanetRecord {
    /// Display name used in reports; falls back to the row position.
    pub fn display_name(&self, row: usize) -> String {
        self.planet_name
            .clone()
            .unwrap_or_else(|| format!("Planet_{row}"))
    }
}

/// Per-planet composite score.
///
/// Sub-scores are already clipped to their category ranges and `total` is the
/// clipped sum of the four.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub habitability: f64,
    pub detectability: f64,
    pub biosignature: f64,
    pub stellar_activity: f64,
    pub total: f64,
    /// Conservative habitable zone used for the HZ term (`None` = undefined).
    pub zone: Option<HabitableZone>,
}

/// Discrete observation priority derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLabel {
    NoViable,
    Low,
    Medium,
    High,
    PrimeTarget,
}

impl PriorityLabel {
    pub const ALL: [PriorityLabel; N_CLASSES] = [
        PriorityLabel::NoViable,
        PriorityLabel::Low,
        PriorityLabel::Medium,
        PriorityLabel::High,
        PriorityLabel::PrimeTarget,
    ];

    /// Class index in `0..N_CLASSES`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            PriorityLabel::NoViable => "No Viable",
            PriorityLabel::Low => "Low Priority",
            PriorityLabel::Medium => "Medium Priority",
            PriorityLabel::High => "High Priority",
            PriorityLabel::PrimeTarget => "Prime Target",
        }
    }
}

/// How continuous totals are turned into priority labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LabelingPolicy {
    /// Fixed cut points (30/50/70/85).
    Thresholds,
    /// Batch quintiles; labels depend on the whole batch.
    Quantiles,
}

/// Interpretation of the `st_lum` column.
///
/// The scoring formula expects a linear luminosity in solar units. Some archive
/// tables publish `log10(L/Lsun)` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LumScale {
    Linear,
    Log10,
}

/// Model output for one planet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: PriorityLabel,
    /// Probability the model assigns to its own predicted class.
    pub confidence: f64,
}

/// One row of the final ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based rank.
    pub rank: usize,
    /// Position of the planet in the input table.
    pub row: usize,
    pub planet_name: String,
    pub host_name: String,
    pub scores: ScoreBreakdown,
    pub predicted: PriorityLabel,
    pub confidence: f64,
}

/// Settings for the candidate training run.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub seed: u64,
    /// Wall-clock budget per candidate fit.
    pub timeout: Duration,
    pub cv_folds: usize,
    pub holdout_fraction: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            timeout: Duration::from_secs(300),
            cv_folds: 3,
            holdout_fraction: 0.2,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) and passed explicitly to every
/// stage; nothing in the pipeline reads global state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub scoring: ScoringConfig,
    pub labeling: LabelingPolicy,
    pub trainer: TrainerConfig,

    pub top_n: usize,
    pub export_ranking: Option<PathBuf>,
    pub export_metrics: Option<PathBuf>,
    /// Directory where trained pipelines are persisted (none = skip).
    pub model_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            labeling: LabelingPolicy::Thresholds,
            trainer: TrainerConfig::default(),
            top_n: 20,
            export_ranking: None,
            export_metrics: None,
            model_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_index_roundtrip() {
        for (i, label) in PriorityLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(PriorityLabel::from_index(i), Some(*label));
        }
        assert_eq!(PriorityLabel::from_index(N_CLASSES), None);
    }

    #[test]
    fn display_name_falls_back_to_row() {
        let record = PlanetRecord::default();
        assert_eq!(record.display_name(7), "Planet_7");
    }
}
