//! Cooperative wall-clock budget for estimator fits.
//!
//! Estimators call [`Deadline::check`] between units of work (trees, boosting
//! rounds, epochs). An expired deadline aborts the fit with
//! [`FitError::Timeout`]; the partially fitted state is dropped by the caller.

use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a single estimator fit did not produce a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("exceeded time budget of {budget:?}")]
    Timeout { budget: Duration },
    #[error("invalid hyperparameters: {0}")]
    InvalidParams(String),
    #[error("empty training set")]
    EmptyTrainingSet,
    #[error("feature width mismatch: fitted on {expected} columns, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("numerical failure: {0}")]
    Numerical(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// A deadline that never expires in practice.
    pub fn unbounded() -> Self {
        Self::new(Duration::from_secs(60 * 60 * 24 * 365))
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    pub fn check(&self) -> Result<(), FitError> {
        if self.expired() {
            Err(FitError::Timeout {
                budget: self.budget,
            })
        } else {
            Ok(())
        }
    }
}
