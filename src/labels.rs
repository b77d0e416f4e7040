//! Priority labels from composite totals.
//!
//! `Thresholds` labels each planet independently. `Quantiles` cuts the batch
//! at its 20/40/60/80th percentiles, so the label of a planet depends on the
//! rest of the batch.

use std::cmp::Ordering;

use crate::domain::{LabelingPolicy, PriorityLabel};
use crate::math::quantile_sorted;

/// Fixed cut points for the threshold policy.
pub const THRESHOLDS: [f64; 4] = [30.0, 50.0, 70.0, 85.0];

/// Percentiles for the quantile policy.
pub const QUANTILE_LEVELS: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

/// Label every total under the given policy.
pub fn encode_labels(totals: &[f64], policy: LabelingPolicy) -> Vec<PriorityLabel> {
    match policy {
        LabelingPolicy::Thresholds => totals.iter().map(|&s| threshold_label(s)).collect(),
        LabelingPolicy::Quantiles => quantile_labels(totals),
    }
}

/// `<30 -> 0, <50 -> 1, <70 -> 2, <85 -> 3, else 4`.
pub fn threshold_label(total: f64) -> PriorityLabel {
    let idx = THRESHOLDS.iter().take_while(|&&cut| total >= cut).count();
    to_label(idx)
}

/// Batch quintile labels. A value equal to a cut point counts as above it, so
/// a constant batch collapses to the top label.
pub fn quantile_labels(totals: &[f64]) -> Vec<PriorityLabel> {
    let cuts = quantile_cuts(totals);
    totals
        .iter()
        .map(|&s| to_label(cuts.iter().filter(|&&c| c <= s).count()))
        .collect()
}

/// Cut points for the quantile policy (empty for an empty batch).
pub fn quantile_cuts(totals: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = totals.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    QUANTILE_LEVELS
        .iter()
        .filter_map(|&q| quantile_sorted(&sorted, q))
        .collect()
}

/// Per-class counts, indexed by label.
pub fn class_counts(labels: &[PriorityLabel]) -> [usize; crate::domain::N_CLASSES] {
    let mut counts = [0usize; crate::domain::N_CLASSES];
    for label in labels {
        counts[label.index()] += 1;
    }
    counts
}

fn to_label(idx: usize) -> PriorityLabel {
    PriorityLabel::from_index(idx).unwrap_or(PriorityLabel::PrimeTarget)
}
