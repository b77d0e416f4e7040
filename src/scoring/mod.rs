//! Physics-based composite scoring.

pub mod scorer;
pub mod weights;

pub use scorer::{density_proxy, score_catalog, score_planet};
pub use weights::ScoringConfig;
