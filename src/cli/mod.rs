//! Command-line parsing for the exoplanet priority ranker.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the scoring/training code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::data::ArchiveTable;
use crate::domain::{LabelingPolicy, LumScale};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "exo",
    version,
    about = "Exoplanet observation priorities: habitability scoring + model ranking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score a catalog, train the candidate models, and print the ranking.
    Rank(RankArgs),
    /// Rank a catalog with a previously trained pipeline (no training).
    Predict(PredictArgs),
    /// Launch the interactive TUI.
    ///
    /// This runs the same pipeline as `exo rank`, but renders results in a
    /// terminal UI using Ratatui.
    Tui(RankArgs),
}

/// Where the planets come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CatalogSource {
    /// Seeded synthetic catalog (offline).
    Sample,
    /// NASA Exoplanet Archive download (cached).
    Archive,
}

#[derive(Debug, Args, Clone)]
pub struct CatalogArgs {
    /// Catalog CSV (NASA archive column names). Overrides --source.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Catalog source when no --input is given.
    #[arg(long, value_enum, default_value_t = CatalogSource::Sample)]
    pub source: CatalogSource,

    /// Archive table for --source archive.
    #[arg(long, value_enum, default_value_t = ArchiveTable::Ps)]
    pub table: ArchiveTable,

    /// Re-download the archive table even if a cached copy exists.
    #[arg(long)]
    pub refresh: bool,

    /// Number of synthetic planets for --source sample.
    #[arg(short = 'n', long, default_value_t = 500)]
    pub sample_count: usize,

    /// How to read `st_lum` (archive tables default to log10, CSV to linear).
    #[arg(long, value_enum)]
    pub lum_scale: Option<LumScale>,

    /// Scoring weights/thresholds TOML (defaults built in).
    #[arg(long, value_name = "TOML")]
    pub scoring_config: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// How composite scores become training labels.
    #[arg(long, value_enum, default_value_t = LabelingPolicy::Thresholds)]
    pub labeling: LabelingPolicy,

    /// Random seed (splits, estimators and the synthetic catalog).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Wall-clock budget per candidate fit, in seconds.
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Cross-validation folds on the training split.
    #[arg(long, default_value_t = 3)]
    pub cv_folds: usize,

    /// Fraction of planets held out for evaluation.
    #[arg(long, default_value_t = 0.2)]
    pub holdout: f64,
}

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Show the top-N ranked planets.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the full ranking to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export training metrics to JSON.
    #[arg(long = "export-metrics", value_name = "JSON")]
    pub export_metrics: Option<PathBuf>,

    /// Persist every trained pipeline (plus `best`) into this directory.
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,
}

/// Options for a full training run.
#[derive(Debug, Args, Clone)]
pub struct RankArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    #[command(flatten)]
    pub train: TrainArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Options for ranking with a stored pipeline.
#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Directory holding `model_<name>.json` files.
    #[arg(long, value_name = "DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Stored model name (`best` is written by every `rank --model-dir` run).
    #[arg(short = 'm', long, default_value = "best")]
    pub model: String,

    /// Seed for --source sample.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Show the top-N ranked planets.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the full ranking to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_defaults() {
        let cli = Cli::parse_from(["exo", "rank"]);
        let Command::Rank(args) = cli.command else {
            panic!("expected rank");
        };
        assert_eq!(args.catalog.source, CatalogSource::Sample);
        assert_eq!(args.train.labeling, LabelingPolicy::Thresholds);
        assert_eq!(args.train.seed, 42);
        assert_eq!(args.train.timeout_secs, 300);
        assert_eq!(args.train.cv_folds, 3);
        assert_eq!(args.output.top, 20);
        assert!(args.catalog.lum_scale.is_none());
    }

    #[test]
    fn predict_flags() {
        let cli = Cli::parse_from([
            "exo",
            "predict",
            "--input",
            "planets.csv",
            "--model",
            "RandomForest",
            "--lum-scale",
            "log10",
        ]);
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.model, "RandomForest");
        assert_eq!(args.model_dir, PathBuf::from("models"));
        assert_eq!(args.catalog.lum_scale, Some(LumScale::Log10));
    }
}
