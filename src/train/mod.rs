//! Model training: split, fit each candidate under a time budget, evaluate,
//! cross-validate and select.

pub mod budget;
pub mod metrics;
pub mod split;
pub mod trainer;

pub use budget::{Deadline, FitError};
pub use metrics::ModelMetrics;
pub use trainer::{
    CandidateFailure, FailureReason, TrainError, TrainedPipeline, TrainingRun, select_best,
    train_candidates,
};
