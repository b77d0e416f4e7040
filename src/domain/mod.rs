//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - catalog rows (`PlanetRecord`)
//! - scoring and ranking outputs (`ScoreBreakdown`, `RankedEntry`)
//! - labels and predictions (`PriorityLabel`, `Prediction`)
//! - run configuration (`RunConfig`, `TrainerConfig`, `LabelingPolicy`)

pub mod types;

pub use types::*;
