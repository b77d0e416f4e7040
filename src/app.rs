//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the catalog (CSV, archive or synthetic)
//! - runs scoring + model training/selection
//! - prints reports
//! - writes optional exports and stored models

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{CatalogArgs, CatalogSource, Command, PredictArgs, RankArgs};
use crate::domain::{RunConfig, TrainerConfig};
use crate::error::AppError;
use crate::io::model_store::ModelStore;
use crate::scoring::ScoringConfig;

pub mod pipeline;

use pipeline::CatalogRequest;

/// Entry point for the `exo` binary.
pub fn run() -> Result<(), AppError> {
    // `exo` and `exo --input x.csv` behave like `exo tui ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Rank(args) => {
            init_tracing();
            handle_rank(args)
        }
        Command::Predict(args) => {
            init_tracing();
            handle_predict(args)
        }
        // No subscriber: log lines would corrupt the alternate screen.
        Command::Tui(args) => handle_tui(args),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exo_rank=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_rank(args: RankArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let request = catalog_request(&args.catalog, args.train.seed);
    let catalog = pipeline::load_catalog(&request, args.catalog.lum_scale)?;
    let run = pipeline::run_pipeline(catalog, &config)?;

    println!(
        "{}",
        crate::report::format_run_summary(
            &run.catalog,
            &run.scores,
            &run.training,
            &run.label_counts,
            &config
        )
    );
    println!("{}", crate::report::format_ranking(&run.ranking, config.top_n));

    pipeline::persist_outputs(&run, &config)
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let scoring = load_scoring(&args.catalog)?;
    let store = ModelStore::new(&args.model_dir);
    let model = store.load(&args.model)?;

    let request = catalog_request(&args.catalog, args.seed);
    let catalog = pipeline::load_catalog(&request, args.catalog.lum_scale)?;
    let out = pipeline::run_predict(catalog, model, &scoring)?;

    println!(
        "{}",
        crate::report::format_predict_summary(&out.catalog, &out.scores, &out.model)
    );
    println!("{}", crate::report::format_ranking(&out.ranking, args.top));

    if let Some(path) = &args.export {
        crate::io::export::write_ranking_csv(path, &out.ranking)?;
    }
    Ok(())
}

fn handle_tui(args: RankArgs) -> Result<(), AppError> {
    crate::tui::run(args)
}

/// Build the run configuration from parsed flags.
pub fn run_config_from_args(args: &RankArgs) -> Result<RunConfig, AppError> {
    let train = &args.train;
    if train.cv_folds < 2 {
        return Err(AppError::new(2, "--cv-folds must be >= 2."));
    }
    if !(train.holdout > 0.0 && train.holdout < 1.0) {
        return Err(AppError::new(2, "--holdout must be in (0, 1)."));
    }

    Ok(RunConfig {
        scoring: load_scoring(&args.catalog)?,
        labeling: train.labeling,
        trainer: TrainerConfig {
            seed: train.seed,
            timeout: Duration::from_secs(train.timeout_secs),
            cv_folds: train.cv_folds,
            holdout_fraction: train.holdout,
        },
        top_n: args.output.top,
        export_ranking: args.output.export.clone(),
        export_metrics: args.output.export_metrics.clone(),
        model_dir: args.output.model_dir.clone(),
    })
}

pub fn catalog_request(args: &CatalogArgs, seed: u64) -> CatalogRequest {
    match (&args.input, args.source) {
        (Some(path), _) => CatalogRequest::Csv(path.clone()),
        (None, CatalogSource::Archive) => CatalogRequest::Archive {
            table: args.table,
            refresh: args.refresh,
        },
        (None, CatalogSource::Sample) => CatalogRequest::Sample {
            count: args.sample_count,
            seed,
        },
    }
}

fn load_scoring(args: &CatalogArgs) -> Result<ScoringConfig, AppError> {
    match &args.scoring_config {
        Some(path) => ScoringConfig::from_toml_file(path),
        None => Ok(ScoringConfig::default()),
    }
}

/// Rewrite argv so `exo` defaults to `exo tui`.
///
/// Rules:
/// - `exo`                      -> `exo tui`
/// - `exo --input x.csv ...`    -> `exo tui --input x.csv ...`
/// - `exo --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "rank" | "predict" | "tui");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn rank_args(extra: &[&str]) -> RankArgs {
        let mut args = vec!["exo", "rank"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Command::Rank(a) => a,
            other => panic!("expected rank, got {other:?}"),
        }
    }

    #[test]
    fn bare_invocation_and_flags_go_to_tui() {
        assert_eq!(rewrite_args(argv(&["exo"])), argv(&["exo", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["exo", "--input", "p.csv"])),
            argv(&["exo", "tui", "--input", "p.csv"])
        );
        assert_eq!(
            rewrite_args(argv(&["exo", "predict"])),
            argv(&["exo", "predict"])
        );
        assert_eq!(rewrite_args(argv(&["exo", "-h"])), argv(&["exo", "-h"]));
    }

    #[test]
    fn run_config_mirrors_flags() {
        let args = rank_args(&[
            "--labeling",
            "quantiles",
            "--timeout-secs",
            "5",
            "--cv-folds",
            "4",
            "--top",
            "7",
        ]);
        let config = run_config_from_args(&args).unwrap();
        assert_eq!(config.labeling, crate::domain::LabelingPolicy::Quantiles);
        assert_eq!(config.trainer.timeout, Duration::from_secs(5));
        assert_eq!(config.trainer.cv_folds, 4);
        assert_eq!(config.top_n, 7);
        assert_eq!(config.scoring, ScoringConfig::default());
    }

    #[test]
    fn invalid_training_flags_are_usage_errors() {
        let err = run_config_from_args(&rank_args(&["--cv-folds", "1"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = run_config_from_args(&rank_args(&["--holdout", "1.5"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn input_overrides_source() {
        let args = rank_args(&["--input", "p.csv", "--source", "archive"]);
        assert_eq!(
            catalog_request(&args.catalog, 1),
            CatalogRequest::Csv("p.csv".into())
        );
        let args = rank_args(&["--source", "archive", "--table", "toi"]);
        assert_eq!(
            catalog_request(&args.catalog, 1),
            CatalogRequest::Archive {
                table: crate::data::ArchiveTable::Toi,
                refresh: false
            }
        );
    }
}
