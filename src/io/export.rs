//! Exports: ranked targets as CSV, training diagnostics as JSON.
//!
//! The CSV is meant for spreadsheets and downstream scripts; the JSON keeps
//! every candidate's metrics together with the policy that produced the
//! labels, so runs can be compared later.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::domain::{LabelingPolicy, RankedEntry};
use crate::error::AppError;
use crate::scoring::ScoringConfig;
use crate::train::{ModelMetrics, TrainingRun};

const RANKING_HEADER: [&str; 13] = [
    "rank",
    "pl_name",
    "hostname",
    "total_score",
    "habitability_score",
    "detectability_score",
    "biosignature_score",
    "stellar_activity_score",
    "predicted_priority",
    "predicted_label",
    "prediction_confidence",
    "hz_inner_au",
    "hz_outer_au",
];

/// Write the ranked table to a CSV file.
pub fn write_ranking_csv(path: &Path, entries: &[RankedEntry]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create ranking CSV '{}': {e}", path.display()),
        )
    })?;
    write_ranking(file, entries)
}

/// Write the ranked table as CSV to any writer.
pub fn write_ranking<W: Write>(writer: W, entries: &[RankedEntry]) -> Result<(), AppError> {
    let mut csv = csv::Writer::from_writer(writer);
    let err = |e: csv::Error| AppError::new(2, format!("Failed to write ranking CSV: {e}"));

    csv.write_record(RANKING_HEADER).map_err(err)?;
    for e in entries {
        let s = &e.scores;
        let (inner, outer) = s
            .zone
            .map(|z| (format!("{:.6}", z.inner_au), format!("{:.6}", z.outer_au)))
            .unwrap_or_default();
        csv.write_record([
            e.rank.to_string(),
            e.planet_name.clone(),
            e.host_name.clone(),
            format!("{:.2}", s.total),
            format!("{:.2}", s.habitability),
            format!("{:.2}", s.detectability),
            format!("{:.2}", s.biosignature),
            format!("{:.2}", s.stellar_activity),
            e.predicted.index().to_string(),
            e.predicted.display_name().to_string(),
            format!("{:.4}", e.confidence),
            inner,
            outer,
        ])
        .map_err(err)?;
    }
    csv.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush ranking CSV: {e}")))?;
    Ok(())
}

/// Serialized diagnostics of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub timestamp: String,
    pub labeling_policy: LabelingPolicy,
    /// Cut points used by the quantile policy (batch dependent).
    pub quantile_cuts: Option<Vec<f64>>,
    pub n_planets: usize,
    pub label_distribution: Vec<LabelCount>,
    pub best_model: String,
    pub models: Vec<CandidateReport>,
    pub failures: Vec<FailureReport>,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub name: String,
    #[serde(flatten)]
    pub metrics: ModelMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub name: String,
    pub reason: String,
}

impl MetricsReport {
    pub fn from_run(
        training: &TrainingRun,
        labeling_policy: LabelingPolicy,
        quantile_cuts: Option<Vec<f64>>,
        label_counts: &[usize],
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            labeling_policy,
            quantile_cuts,
            n_planets: label_counts.iter().sum(),
            label_distribution: crate::domain::PriorityLabel::ALL
                .iter()
                .zip(label_counts)
                .map(|(label, &count)| LabelCount {
                    label: label.display_name().to_string(),
                    count,
                })
                .collect(),
            best_model: training.best().name.clone(),
            models: training
                .trained
                .iter()
                .map(|t| CandidateReport {
                    name: t.name.clone(),
                    metrics: t.metrics.clone(),
                })
                .collect(),
            failures: training
                .failures
                .iter()
                .map(|f| FailureReport {
                    name: f.name.clone(),
                    reason: f.reason.to_string(),
                })
                .collect(),
            scoring: scoring.clone(),
        }
    }
}

/// Write the metrics report as pretty JSON.
pub fn write_metrics_json(path: &Path, report: &MetricsReport) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create metrics JSON '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write metrics JSON: {e}")))?;
    Ok(())
}
