//! Candidate training with fault isolation, cross-validation and selection.
//!
//! Every candidate is fitted independently on a fresh pipeline. A timeout or
//! fit error is recorded as a [`CandidateFailure`] and the next candidate is
//! tried; the run only fails when no candidate survives.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{PriorityLabel, TrainerConfig};
use crate::features::FeatureMatrix;
use crate::labels::class_counts;
use crate::math::mean_std;
use crate::models::{CandidateSpec, FittedPipeline};
use crate::train::budget::{Deadline, FitError};
use crate::train::metrics::{ModelMetrics, accuracy, balanced_accuracy, confusion_matrix};
use crate::train::split::{Split, stratified_kfold, stratified_split};

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    Timeout { budget: Duration },
    Error(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout { budget } => {
                write!(f, "timed out after {:.1}s", budget.as_secs_f64())
            }
            FailureReason::Error(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<FitError> for FailureReason {
    fn from(err: FitError) -> Self {
        match err {
            FitError::Timeout { budget } => FailureReason::Timeout { budget },
            other => FailureReason::Error(other.to_string()),
        }
    }
}

/// A candidate that produced no usable pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFailure {
    pub name: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainError {
    #[error("{rows} feature rows but {labels} labels")]
    ShapeMismatch { rows: usize, labels: usize },
    #[error("no rows to train on")]
    Empty,
    #[error("invalid trainer configuration: {0}")]
    InvalidConfig(String),
    #[error(
        "class '{}' has only {count} member(s); stratified training needs at least 2",
        label.display_name()
    )]
    LabelImbalance { label: PriorityLabel, count: usize },
    #[error("all {} candidate(s) failed", failures.len())]
    Exhausted { failures: Vec<CandidateFailure> },
}

/// A fitted candidate with its evaluation. Never mutated after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPipeline {
    pub name: String,
    pub spec: CandidateSpec,
    pub pipeline: FittedPipeline,
    pub metrics: ModelMetrics,
}

/// Outcome of a training run: survivors in declaration order plus failures.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub trained: Vec<TrainedPipeline>,
    pub failures: Vec<CandidateFailure>,
    pub best_index: usize,
    pub holdout: Split,
}

impl TrainingRun {
    pub fn best(&self) -> &TrainedPipeline {
        &self.trained[self.best_index]
    }
}

/// Train every candidate of `bank` and select the best survivor.
pub fn train_candidates(
    x: &FeatureMatrix,
    y: &[PriorityLabel],
    bank: &[CandidateSpec],
    config: &TrainerConfig,
) -> Result<TrainingRun, TrainError> {
    validate_inputs(x, y, bank, config)?;

    let holdout = stratified_split(y, config.holdout_fraction, config.seed);
    info!(
        train_rows = holdout.train.len(),
        test_rows = holdout.test.len(),
        candidates = bank.len(),
        "training candidates"
    );

    let mut trained = Vec::new();
    let mut failures = Vec::new();
    for spec in bank {
        match train_one(spec, x, y, &holdout, config) {
            Ok(pipeline) => {
                info!(
                    candidate = %spec.name,
                    accuracy = pipeline.metrics.accuracy,
                    balanced_accuracy = pipeline.metrics.balanced_accuracy,
                    cv_balanced_accuracy = pipeline.metrics.cv_mean_balanced_accuracy,
                    "candidate trained"
                );
                trained.push(pipeline);
            }
            Err(reason) => {
                warn!(candidate = %spec.name, %reason, "candidate failed");
                failures.push(CandidateFailure {
                    name: spec.name.clone(),
                    reason,
                });
            }
        }
    }

    let Some(best_index) = select_best(&trained) else {
        return Err(TrainError::Exhausted { failures });
    };
    info!(best = %trained[best_index].name, "selected model");

    Ok(TrainingRun {
        trained,
        failures,
        best_index,
        holdout,
    })
}

/// Highest mean CV balanced accuracy; ties keep the earlier candidate.
pub fn select_best(trained: &[TrainedPipeline]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, t) in trained.iter().enumerate() {
        let better = match best {
            None => true,
            Some(b) => {
                t.metrics.cv_mean_balanced_accuracy > trained[b].metrics.cv_mean_balanced_accuracy
            }
        };
        if better {
            best = Some(i);
        }
    }
    best
}

fn validate_inputs(
    x: &FeatureMatrix,
    y: &[PriorityLabel],
    bank: &[CandidateSpec],
    config: &TrainerConfig,
) -> Result<(), TrainError> {
    if x.n_rows() != y.len() {
        return Err(TrainError::ShapeMismatch {
            rows: x.n_rows(),
            labels: y.len(),
        });
    }
    if y.is_empty() {
        return Err(TrainError::Empty);
    }
    if bank.is_empty() {
        return Err(TrainError::InvalidConfig("empty candidate bank".to_string()));
    }
    if config.cv_folds < 2 {
        return Err(TrainError::InvalidConfig(format!(
            "cv_folds must be >= 2 (got {})",
            config.cv_folds
        )));
    }
    if !(config.holdout_fraction > 0.0 && config.holdout_fraction < 1.0) {
        return Err(TrainError::InvalidConfig(format!(
            "holdout_fraction must be in (0, 1) (got {})",
            config.holdout_fraction
        )));
    }

    let counts = class_counts(y);
    if let Some((k, &count)) = counts.iter().enumerate().find(|(_, c)| **c == 1) {
        return Err(TrainError::LabelImbalance {
            label: PriorityLabel::from_index(k).unwrap_or(PriorityLabel::NoViable),
            count,
        });
    }
    Ok(())
}

/// Fit under a fresh deadline; a fit that returns late counts as a timeout.
fn fit_within_budget(
    spec: &CandidateSpec,
    x: &FeatureMatrix,
    y: &[PriorityLabel],
    config: &TrainerConfig,
) -> Result<FittedPipeline, FailureReason> {
    let deadline = Deadline::new(config.timeout);
    let pipeline = spec.fit(x, y, config.seed, &deadline)?;
    if deadline.expired() {
        return Err(FailureReason::Timeout {
            budget: deadline.budget(),
        });
    }
    Ok(pipeline)
}

fn evaluate(
    pipeline: &FittedPipeline,
    x: &FeatureMatrix,
    y: &[PriorityLabel],
) -> Result<Vec<PriorityLabel>, FailureReason> {
    let predictions = pipeline.predict(x)?;
    debug_assert_eq!(predictions.len(), y.len());
    Ok(predictions.into_iter().map(|p| p.label).collect())
}

fn train_one(
    spec: &CandidateSpec,
    x: &FeatureMatrix,
    y: &[PriorityLabel],
    holdout: &Split,
    config: &TrainerConfig,
) -> Result<TrainedPipeline, FailureReason> {
    let x_train = x.select(&holdout.train);
    let y_train: Vec<PriorityLabel> = holdout.train.iter().map(|&i| y[i]).collect();
    let x_test = x.select(&holdout.test);
    let y_test: Vec<PriorityLabel> = holdout.test.iter().map(|&i| y[i]).collect();

    let started = Instant::now();
    let pipeline = fit_within_budget(spec, &x_train, &y_train, config)?;
    let fit_seconds = started.elapsed().as_secs_f64();

    let predicted = evaluate(&pipeline, &x_test, &y_test)?;

    if y_train.len() < config.cv_folds {
        return Err(FitError::InvalidParams(format!(
            "{} training rows cannot fill {} cv folds",
            y_train.len(),
            config.cv_folds
        ))
        .into());
    }
    let mut cv_acc = Vec::with_capacity(config.cv_folds);
    let mut cv_bal = Vec::with_capacity(config.cv_folds);
    for (fold_idx, fold) in stratified_kfold(&y_train, config.cv_folds, config.seed)
        .iter()
        .enumerate()
        .filter(|(_, fold)| !fold.test.is_empty() && !fold.train.is_empty())
    {
        let fx = x_train.select(&fold.train);
        let fy: Vec<PriorityLabel> = fold.train.iter().map(|&i| y_train[i]).collect();
        let vx = x_train.select(&fold.test);
        let vy: Vec<PriorityLabel> = fold.test.iter().map(|&i| y_train[i]).collect();

        let fold_pipeline = fit_within_budget(spec, &fx, &fy, config)?;
        let fold_pred = evaluate(&fold_pipeline, &vx, &vy)?;
        let acc = accuracy(&vy, &fold_pred);
        let bal = balanced_accuracy(&vy, &fold_pred);
        debug!(candidate = %spec.name, fold = fold_idx, acc, bal, "cv fold");
        cv_acc.push(acc);
        cv_bal.push(bal);
    }
    let (Some(acc), Some(bal)) = (mean_std(&cv_acc), mean_std(&cv_bal)) else {
        return Err(FitError::InvalidParams("no cv fold could be evaluated".to_string()).into());
    };
    let (cv_mean_accuracy, cv_std_accuracy) = acc;
    let (cv_mean_balanced_accuracy, cv_std_balanced_accuracy) = bal;

    Ok(TrainedPipeline {
        name: spec.name.clone(),
        spec: spec.clone(),
        pipeline,
        metrics: ModelMetrics {
            accuracy: accuracy(&y_test, &predicted),
            balanced_accuracy: balanced_accuracy(&y_test, &predicted),
            cv_mean_accuracy,
            cv_std_accuracy,
            cv_mean_balanced_accuracy,
            cv_std_balanced_accuracy,
            confusion_matrix: confusion_matrix(&y_test, &predicted),
            fit_seconds,
            train_rows: y_train.len(),
            test_rows: y_test.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EstimatorSpec;
    use crate::models::forest::ForestParams;
    use crate::models::svm::SvmParams;
    use crate::models::test_support::blob_features;

    fn forest(name: &str, n_trees: usize) -> CandidateSpec {
        CandidateSpec {
            name: name.to_string(),
            scale: false,
            estimator: EstimatorSpec::RandomForest(ForestParams {
                n_trees,
                max_depth: 6,
                ..ForestParams::default()
            }),
        }
    }

    fn svm(name: &str) -> CandidateSpec {
        CandidateSpec {
            name: name.to_string(),
            scale: true,
            estimator: EstimatorSpec::LinearSvm(SvmParams {
                epochs: 3,
                ..SvmParams::default()
            }),
        }
    }

    fn config() -> TrainerConfig {
        TrainerConfig {
            seed: 42,
            timeout: Duration::from_secs(120),
            cv_folds: 3,
            holdout_fraction: 0.2,
        }
    }

    #[test]
    fn single_survivor_is_selected() {
        let (x, y) = blob_features(30, 5, 3);
        let bank = vec![forest("broken", 0), svm("svm"), forest("also-broken", 0)];
        let run = train_candidates(&x, &y, &bank, &config()).unwrap();

        assert_eq!(run.trained.len(), 1);
        assert_eq!(run.best().name, "svm");
        assert_eq!(run.failures.len(), 2);
        assert!(run.failures.iter().all(|f| matches!(f.reason, FailureReason::Error(_))));
    }

    #[test]
    fn exhaustion_reports_one_failure_per_candidate() {
        let (x, y) = blob_features(20, 5, 4);
        let bank = vec![forest("a", 5), svm("b")];
        let config = TrainerConfig {
            timeout: Duration::ZERO,
            ..config()
        };
        let err = train_candidates(&x, &y, &bank, &config).unwrap_err();
        let TrainError::Exhausted { failures } = err else {
            panic!("expected exhaustion, got {err:?}");
        };
        let names: Vec<&str> = failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(
            failures
                .iter()
                .all(|f| matches!(f.reason, FailureReason::Timeout { .. }))
        );
    }

    #[test]
    fn singleton_class_is_rejected_before_training() {
        let (x, _) = blob_features(2, 3, 1);
        let y = vec![
            PriorityLabel::Low,
            PriorityLabel::Low,
            PriorityLabel::Low,
            PriorityLabel::High,
            PriorityLabel::High,
            PriorityLabel::PrimeTarget,
        ];
        let err = train_candidates(&x, &y, &[svm("svm")], &config()).unwrap_err();
        assert_eq!(
            err,
            TrainError::LabelImbalance {
                label: PriorityLabel::PrimeTarget,
                count: 1
            }
        );
    }

    #[test]
    fn metrics_are_populated_and_selection_prefers_earlier_on_ties() {
        let (x, y) = blob_features(30, 5, 8);
        let bank = vec![forest("first", 10), forest("second", 10)];
        let run = train_candidates(&x, &y, &bank, &config()).unwrap();
        assert_eq!(run.trained.len(), 2);
        // Identical specs and seeds yield identical scores.
        assert_eq!(run.best().name, "first");

        let m = &run.best().metrics;
        assert!((0.0..=1.0).contains(&m.accuracy));
        assert!((0.0..=1.0).contains(&m.cv_mean_balanced_accuracy));
        assert!(m.cv_std_accuracy >= 0.0);
        assert_eq!(
            m.confusion_matrix.iter().flatten().sum::<usize>(),
            m.test_rows
        );
        assert_eq!(m.train_rows + m.test_rows, 150);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let (x, y) = blob_features(2, 5, 1);
        let err = train_candidates(&x, &y[..5], &[svm("svm")], &config()).unwrap_err();
        assert_eq!(err, TrainError::ShapeMismatch { rows: 10, labels: 5 });
    }

    #[test]
    fn training_split_smaller_than_cv_folds_fails_candidates() {
        let (x, y) = blob_features(2, 2, 1);
        let err = train_candidates(&x, &y, &[forest("rf", 5), svm("svm")], &config()).unwrap_err();
        let TrainError::Exhausted { failures } = err else {
            panic!("expected exhaustion, got {err:?}");
        };
        assert_eq!(failures.len(), 2);
        for failure in &failures {
            let FailureReason::Error(msg) = &failure.reason else {
                panic!("expected an error, got {:?}", failure.reason);
            };
            assert!(msg.contains("cv folds"), "{msg}");
        }
    }
}
