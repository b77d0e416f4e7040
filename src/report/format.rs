//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the scoring/training code stays clean and testable
//! - output changes are localized

use crate::domain::{LabelingPolicy, PriorityLabel, RankedEntry, RunConfig, ScoreBreakdown};
use crate::io::ingest::IngestedCatalog;
use crate::report::class_distribution;
use crate::train::{TrainedPipeline, TrainingRun};

/// Dataset overview: what was read, what was skipped, how complete it is.
pub fn format_dataset(catalog: &IngestedCatalog, scores: &[ScoreBreakdown]) -> String {
    let mut out = String::new();

    out.push_str(&format!("Source: {}\n", catalog.source));
    out.push_str(&format!(
        "Planets: n={} (rows read={}, skipped={})\n",
        catalog.records.len(),
        catalog.rows_read,
        catalog.row_errors.len()
    ));
    if !catalog.missing_fields.is_empty() {
        out.push_str(&format!(
            "Missing columns: {}\n",
            catalog.missing_fields.join(", ")
        ));
    }

    let with_zone = scores.iter().filter(|s| s.zone.is_some()).count();
    out.push_str(&format!(
        "Habitable zone defined: {with_zone}/{}\n",
        scores.len()
    ));
    if let Some((lo, hi)) = total_range(scores) {
        out.push_str(&format!("Total score: [{lo:.1}, {hi:.1}]\n"));
    }

    out
}

/// Full training summary (dataset + candidate diagnostics + chosen model).
pub fn format_run_summary(
    catalog: &IngestedCatalog,
    scores: &[ScoreBreakdown],
    training: &TrainingRun,
    label_counts: &[usize],
    config: &RunConfig,
) -> String {
    let mut out = String::new();

    out.push_str("=== exo - Exoplanet Observation Priorities ===\n");
    out.push_str(&format_dataset(catalog, scores));
    out.push_str(&format!(
        "Labeling: {}\n",
        policy_name(config.labeling)
    ));
    out.push_str(&format!(
        "Weights: habitability={:.2} detectability={:.2} biosignature={:.2} activity={:.2}\n",
        config.scoring.weights.habitability,
        config.scoring.weights.detectability,
        config.scoring.weights.biosignature,
        config.scoring.weights.stellar_activity,
    ));
    out.push_str(&format!(
        "Training labels: {}\n",
        fmt_counts(label_counts)
    ));
    out.push_str(&format!(
        "Split: train={} test={} | cv folds={} | seed={} | timeout={}s\n",
        training.holdout.train.len(),
        training.holdout.test.len(),
        config.trainer.cv_folds,
        config.trainer.seed,
        config.trainer.timeout.as_secs(),
    ));

    out.push_str("\nModel diagnostics:\n");
    let best = &training.best().name;
    for t in &training.trained {
        let chosen = if &t.name == best { "*" } else { " " };
        let m = &t.metrics;
        out.push_str(&format!(
            "{chosen} {:<18} acc={:.3} bal={:.3} cv_bal={:.3}±{:.3} fit={:.2}s\n",
            truncate(&t.name, 18),
            m.accuracy,
            m.balanced_accuracy,
            m.cv_mean_balanced_accuracy,
            m.cv_std_balanced_accuracy,
            m.fit_seconds,
        ));
    }
    for f in &training.failures {
        out.push_str(&format!("  (failed {}) {}\n", f.name, f.reason));
    }

    out.push_str(&format!("\nChosen model: {best}\n"));
    out.push_str(&format_confusion(&training.best().metrics.confusion_matrix));
    out.push('\n');

    out
}

/// Summary for a ranking produced by a stored pipeline.
pub fn format_predict_summary(
    catalog: &IngestedCatalog,
    scores: &[ScoreBreakdown],
    model: &TrainedPipeline,
) -> String {
    let mut out = String::new();

    out.push_str("=== exo - Exoplanet Observation Priorities (stored model) ===\n");
    out.push_str(&format_dataset(catalog, scores));
    out.push_str(&format!(
        "Model: {} (holdout bal={:.3}, cv_bal={:.3})\n",
        model.name, model.metrics.balanced_accuracy, model.metrics.cv_mean_balanced_accuracy
    ));
    out.push('\n');

    out
}

/// Top-N ranked targets plus the predicted class distribution of the full ranking.
pub fn format_ranking(entries: &[RankedEntry], top_n: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!("Top {} targets:\n", top_n.min(entries.len())));
    out.push_str(
        format!(
            "{:>4} {:<24} {:<18} {:>6} {:>6} {:>6} {:>6} {:>6} {:<16} {:>5}\n",
            "rank", "planet", "host", "total", "hab", "det", "bio", "act", "priority", "conf"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<4} {:-<24} {:-<18} {:-<6} {:-<6} {:-<6} {:-<6} {:-<6} {:-<16} {:-<5}\n",
            "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for e in entries.iter().take(top_n) {
        let s = &e.scores;
        out.push_str(
            format!(
                "{:>4} {:<24} {:<18} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:<16} {:>5.2}\n",
                e.rank,
                truncate(&e.planet_name, 24),
                truncate(&e.host_name, 18),
                s.total,
                s.habitability,
                s.detectability,
                s.biosignature,
                s.stellar_activity,
                e.predicted.display_name(),
                e.confidence,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out.push_str(&format!(
        "\nPredicted priorities: {}\n",
        fmt_counts(&class_distribution(entries))
    ));

    out
}

fn format_confusion(cm: &[[usize; 5]; 5]) -> String {
    let mut out = String::new();
    out.push_str("Holdout confusion (rows=true, cols=predicted):\n");
    for (k, row) in cm.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|c| format!("{c:>5}")).collect();
        let label = PriorityLabel::from_index(k)
            .map(PriorityLabel::display_name)
            .unwrap_or("?");
        out.push_str(format!("  {label:<16}{}\n", cells.join("")).trim_end());
        out.push('\n');
    }
    out
}

fn policy_name(policy: LabelingPolicy) -> &'static str {
    match policy {
        LabelingPolicy::Thresholds => "thresholds (30/50/70/85)",
        LabelingPolicy::Quantiles => "quantiles (batch quintiles)",
    }
}

fn fmt_counts(counts: &[usize]) -> String {
    let parts: Vec<String> = PriorityLabel::ALL
        .iter()
        .zip(counts)
        .map(|(label, c)| format!("{}={c}", label.display_name()))
        .collect();
    parts.join(", ")
}

fn total_range(scores: &[ScoreBreakdown]) -> Option<(f64, f64)> {
    let mut it = scores.iter().map(|s| s.total);
    let first = it.next()?;
    Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
