//! Shared ranking pipeline used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! catalog -> scores -> features -> labels -> training/selection -> predictions -> ranking
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::path::PathBuf;

use tracing::{info, warn};

use crate::data::{ArchiveClient, ArchiveTable, generate_catalog};
use crate::data::archive::default_lum_scale;
use crate::domain::{
    LabelingPolicy, LumScale, PriorityLabel, RankedEntry, RunConfig, ScoreBreakdown,
};
use crate::error::AppError;
use crate::features::build_features;
use crate::io::export::{MetricsReport, write_metrics_json, write_ranking_csv};
use crate::io::ingest::{IngestOptions, IngestedCatalog, load_catalog_csv};
use crate::io::model_store::ModelStore;
use crate::labels::{class_counts, encode_labels, quantile_cuts};
use crate::models::{CandidateSpec, default_bank};
use crate::report::assemble_ranking;
use crate::scoring::{ScoringConfig, score_catalog};
use crate::train::{TrainedPipeline, TrainingRun, train_candidates};

/// Stored name of the selected pipeline, next to the per-candidate files.
pub const BEST_MODEL_NAME: &str = "best";

/// Where a run reads its planets from.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRequest {
    Csv(PathBuf),
    Archive { table: ArchiveTable, refresh: bool },
    Sample { count: usize, seed: u64 },
}

/// Load the requested catalog. `lum_scale` overrides the source default.
pub fn load_catalog(
    request: &CatalogRequest,
    lum_scale: Option<LumScale>,
) -> Result<IngestedCatalog, AppError> {
    let catalog = match request {
        CatalogRequest::Csv(path) => {
            let options = IngestOptions {
                lum_scale: lum_scale.unwrap_or(LumScale::Linear),
            };
            load_catalog_csv(path, &options)?
        }
        CatalogRequest::Archive { table, refresh } => {
            let options = IngestOptions {
                lum_scale: lum_scale.unwrap_or_else(|| default_lum_scale(Some(*table))),
            };
            ArchiveClient::from_env()?.fetch_catalog(*table, *refresh, &options)?
        }
        CatalogRequest::Sample { count, seed } => {
            if *count == 0 {
                return Err(AppError::new(2, "Sample count must be > 0."));
            }
            IngestedCatalog::from_records(
                format!("synthetic (n={count}, seed={seed})"),
                generate_catalog(*count, *seed),
            )
        }
    };
    info!(
        source = %catalog.source,
        planets = catalog.records.len(),
        skipped = catalog.row_errors.len(),
        "catalog loaded"
    );
    Ok(catalog)
}

/// All computed outputs of a single `exo rank` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub catalog: IngestedCatalog,
    pub scores: Vec<ScoreBreakdown>,
    pub labels: Vec<PriorityLabel>,
    pub label_counts: [usize; crate::domain::N_CLASSES],
    /// Cut points when labels came from batch quantiles.
    pub quantile_cuts: Option<Vec<f64>>,
    pub training: TrainingRun,
    pub ranking: Vec<RankedEntry>,
}

impl RunOutput {
    pub fn best(&self) -> &TrainedPipeline {
        self.training.best()
    }
}

/// Execute the full pipeline with the standard candidate bank.
pub fn run_pipeline(catalog: IngestedCatalog, config: &RunConfig) -> Result<RunOutput, AppError> {
    run_pipeline_with_bank(catalog, config, &default_bank())
}

/// Execute the full pipeline with an explicit candidate bank.
pub fn run_pipeline_with_bank(
    catalog: IngestedCatalog,
    config: &RunConfig,
    bank: &[CandidateSpec],
) -> Result<RunOutput, AppError> {
    if catalog.records.is_empty() {
        return Err(AppError::new(
            3,
            format!("{}: no planets to rank.", catalog.source),
        ));
    }

    // 1) Score every planet.
    let scores = score_catalog(&catalog.records, &config.scoring);

    // 2) Features and labels.
    let features = build_features(&catalog.records);
    let totals: Vec<f64> = scores.iter().map(|s| s.total).collect();
    let labels = encode_labels(&totals, config.labeling);
    let label_counts = class_counts(&labels);
    let quantile_cuts = match config.labeling {
        LabelingPolicy::Quantiles => {
            warn!("quantile labels depend on the whole batch; rankings of different catalogs are not comparable");
            Some(quantile_cuts(&totals))
        }
        LabelingPolicy::Thresholds => None,
    };
    info!(counts = ?label_counts, "labels encoded");

    // 3) Train candidates and select.
    let training = train_candidates(&features, &labels, bank, &config.trainer)?;

    // 4) Predict with the selected pipeline and rank.
    let predictions = training.best().pipeline.predict(&features)?;
    let ranking = assemble_ranking(&catalog.records, &scores, &predictions)?;

    Ok(RunOutput {
        catalog,
        scores,
        labels,
        label_counts,
        quantile_cuts,
        training,
        ranking,
    })
}

/// Write the optional ranking/metrics exports and persist trained pipelines.
pub fn persist_outputs(run: &RunOutput, config: &RunConfig) -> Result<(), AppError> {
    if let Some(path) = &config.export_ranking {
        write_ranking_csv(path, &run.ranking)?;
        info!(path = %path.display(), "ranking exported");
    }
    if let Some(path) = &config.export_metrics {
        let report = MetricsReport::from_run(
            &run.training,
            config.labeling,
            run.quantile_cuts.clone(),
            &run.label_counts,
            &config.scoring,
        );
        write_metrics_json(path, &report)?;
        info!(path = %path.display(), "metrics exported");
    }
    if let Some(dir) = &config.model_dir {
        let store = ModelStore::new(dir);
        for model in &run.training.trained {
            store.save(&model.name, model)?;
        }
        store.save(BEST_MODEL_NAME, run.best())?;
        info!(
            dir = %dir.display(),
            models = run.training.trained.len(),
            "models saved"
        );
    }
    Ok(())
}

/// Outputs of ranking with a stored pipeline.
#[derive(Debug, Clone)]
pub struct PredictOutput {
    pub catalog: IngestedCatalog,
    pub scores: Vec<ScoreBreakdown>,
    pub model: TrainedPipeline,
    pub ranking: Vec<RankedEntry>,
}

/// Score and rank a catalog with an already trained pipeline.
pub fn run_predict(
    catalog: IngestedCatalog,
    model: TrainedPipeline,
    scoring: &ScoringConfig,
) -> Result<PredictOutput, AppError> {
    if catalog.records.is_empty() {
        return Err(AppError::new(
            3,
            format!("{}: no planets to rank.", catalog.source),
        ));
    }
    let scores = score_catalog(&catalog.records, scoring);
    let features = build_features(&catalog.records);
    let predictions = model.pipeline.predict(&features)?;
    let ranking = assemble_ranking(&catalog.records, &scores, &predictions)?;
    Ok(PredictOutput {
        catalog,
        scores,
        model,
        ranking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EstimatorSpec;
    use crate::models::boosting::BoostingParams;
    use crate::models::forest::ForestParams;

    fn small_bank() -> Vec<CandidateSpec> {
        vec![
            CandidateSpec {
                name: "RandomForest".to_string(),
                scale: false,
                estimator: EstimatorSpec::RandomForest(ForestParams {
                    n_trees: 15,
                    max_depth: 8,
                    ..ForestParams::default()
                }),
            },
            CandidateSpec {
                name: "GradientBoosting".to_string(),
                scale: false,
                estimator: EstimatorSpec::GradientBoosting(BoostingParams {
                    n_rounds: 10,
                    ..BoostingParams::default()
                }),
            },
        ]
    }

    fn sample(count: usize, seed: u64) -> IngestedCatalog {
        load_catalog(&CatalogRequest::Sample { count, seed }, None).unwrap()
    }

    /// First synthetic seed whose quantile labels have no singleton class.
    fn trainable_seed(count: usize) -> u64 {
        let scoring = ScoringConfig::default();
        (0..100)
            .find(|&seed| {
                let totals: Vec<f64> = score_catalog(&generate_catalog(count, seed), &scoring)
                    .iter()
                    .map(|s| s.total)
                    .collect();
                let counts = class_counts(&encode_labels(&totals, LabelingPolicy::Quantiles));
                !counts.contains(&1)
            })
            .unwrap()
    }

    fn quantile_config() -> RunConfig {
        RunConfig {
            labeling: LabelingPolicy::Quantiles,
            ..RunConfig::default()
        }
    }

    #[test]
    fn end_to_end_ranking_on_synthetic_catalog() {
        let run = run_pipeline_with_bank(sample(200, trainable_seed(200)), &quantile_config(), &small_bank())
                .unwrap();

        assert_eq!(run.ranking.len(), 200);
        assert!(
            run.ranking
                .windows(2)
                .all(|w| w[0].scores.total >= w[1].scores.total)
        );
        assert_eq!(run.label_counts.iter().sum::<usize>(), 200);
        assert_eq!(run.quantile_cuts.as_ref().map(Vec::len), Some(4));
        assert_eq!(run.training.trained.len() + run.training.failures.len(), 2);
        assert!(run.ranking.iter().all(|e| (0.0..=1.0).contains(&e.confidence)));
    }

    #[test]
    fn stored_model_reproduces_ranking() {
        let dir = std::env::temp_dir().join(format!("exo-rank-pipeline-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let config = RunConfig {
            model_dir: Some(dir.clone()),
            ..quantile_config()
        };
        let seed = trainable_seed(150);
        let run = run_pipeline_with_bank(sample(150, seed), &config, &small_bank()).unwrap();
        persist_outputs(&run, &config).unwrap();

        let store = ModelStore::new(&dir);
        let best = store.load(BEST_MODEL_NAME).unwrap();
        assert_eq!(best.name, run.best().name);

        let predicted = run_predict(sample(150, seed), best, &config.scoring).unwrap();
        assert_eq!(predicted.ranking, run.ranking);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_catalog_is_insufficient_data() {
        let empty = IngestedCatalog::from_records("empty", Vec::new());
        let err = run_pipeline(empty, &RunConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn zero_sample_count_is_rejected() {
        let err = load_catalog(&CatalogRequest::Sample { count: 0, seed: 1 }, None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
