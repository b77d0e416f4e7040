//! `exo-rank` library crate.
//!
//! The binary (`exo`) is a thin wrapper around this library so that:
//!
//! - scoring, training and ranking are testable without spawning processes
//! - modules are reusable (notebooks, batch jobs, other front-ends)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod io;
pub mod labels;
pub mod math;
pub mod models;
pub mod report;
pub mod scoring;
pub mod train;
pub mod tui;
