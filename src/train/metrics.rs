//! Classification metrics over the five-label space.

use serde::{Deserialize, Serialize};

use crate::domain::{N_CLASSES, PriorityLabel};

/// `matrix[true][predicted]` counts.
pub type ConfusionMatrix = [[usize; N_CLASSES]; N_CLASSES];

/// Diagnostics of one successfully trained candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub balanced_accuracy: f64,
    pub cv_mean_accuracy: f64,
    pub cv_std_accuracy: f64,
    pub cv_mean_balanced_accuracy: f64,
    pub cv_std_balanced_accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub fit_seconds: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

pub fn accuracy(y_true: &[PriorityLabel], y_pred: &[PriorityLabel]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Mean per-class recall over the classes present in `y_true`.
pub fn balanced_accuracy(y_true: &[PriorityLabel], y_pred: &[PriorityLabel]) -> f64 {
    let cm = confusion_matrix(y_true, y_pred);
    let recalls: Vec<f64> = cm
        .iter()
        .enumerate()
        .filter_map(|(k, row)| {
            let support: usize = row.iter().sum();
            (support > 0).then(|| row[k] as f64 / support as f64)
        })
        .collect();
    if recalls.is_empty() {
        0.0
    } else {
        recalls.iter().sum::<f64>() / recalls.len() as f64
    }
}

pub fn confusion_matrix(y_true: &[PriorityLabel], y_pred: &[PriorityLabel]) -> ConfusionMatrix {
    let mut cm = [[0usize; N_CLASSES]; N_CLASSES];
    for (t, p) in y_true.iter().zip(y_pred) {
        cm[t.index()][p.index()] += 1;
    }
    cm
}
