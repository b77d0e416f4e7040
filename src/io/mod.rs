//! Input/output helpers.
//!
//! - catalog CSV ingest (`ingest`)
//! - ranking CSV and metrics JSON exports (`export`)
//! - trained pipeline persistence (`model_store`)

pub mod export;
pub mod ingest;
pub mod model_store;

pub use export::*;
pub use ingest::*;
pub use model_store::{ModelStore, StoreError};
