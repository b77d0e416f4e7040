//! On-disk persistence of trained pipelines.
//!
//! One JSON file per pipeline (`model_<name>.json`) holding the fitted
//! imputer, scaler and estimator together with the candidate spec and its
//! evaluation. Files carry a format version; a file written by an
//! incompatible version is rejected rather than half-decoded.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::train::TrainedPipeline;

pub const FORMAT_VERSION: u32 = 1;

const PREFIX: &str = "model_";
const SUFFIX: &str = ".json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored model '{name}' in {}", dir.display())]
    NotFound { name: String, dir: PathBuf },
    #[error("model store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} has format version {found}, expected {expected}", path.display())]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    format_version: u32,
    saved_at: DateTime<Utc>,
    model: TrainedPipeline,
}

/// Only the header, so version checks do not depend on the model layout.
#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{PREFIX}{}{SUFFIX}", file_stem(name)))
    }

    /// Write `model` under `name`, replacing any previous file.
    pub fn save(&self, name: &str, model: &TrainedPipeline) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(name);
        let file = File::create(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let record = ModelFile {
            format_version: FORMAT_VERSION,
            saved_at: Utc::now(),
            model: model.clone(),
        };
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &record).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        writer.flush().map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "saved model");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<TrainedPipeline, StoreError> {
        let path = self.path_for(name);
        let text = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    name: name.to_string(),
                    dir: self.dir.clone(),
                }
            } else {
                StoreError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let probe: VersionProbe =
            serde_json::from_str(&text).map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?;
        if probe.format_version != FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                path,
                found: probe.format_version,
                expected: FORMAT_VERSION,
            });
        }
        let record: ModelFile =
            serde_json::from_str(&text).map_err(|source| StoreError::Decode { path, source })?;
        Ok(record.model)
    }

    /// Names of stored models, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name().into_string().ok()?;
                let name = file_name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
                Some(name.to_string())
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Keep names filesystem-safe.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrainerConfig;
    use crate::models::EstimatorSpec;
    use crate::models::svm::SvmParams;
    use crate::models::test_support::blob_features;
    use crate::models::{CandidateSpec, forest::ForestParams};
    use crate::train::train_candidates;

    fn temp_store(tag: &str) -> ModelStore {
        let dir = std::env::temp_dir().join(format!(
            "exo-rank-store-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        ModelStore::new(dir)
    }

    fn trained() -> (crate::features::FeatureMatrix, Vec<TrainedPipeline>) {
        let (x, y) = blob_features(20, 5, 11);
        let bank = vec![
            CandidateSpec {
                name: "forest".to_string(),
                scale: false,
                estimator: EstimatorSpec::RandomForest(ForestParams {
                    n_trees: 8,
                    max_depth: 5,
                    ..ForestParams::default()
                }),
            },
            CandidateSpec {
                name: "svm".to_string(),
                scale: true,
                estimator: EstimatorSpec::LinearSvm(SvmParams {
                    epochs: 3,
                    ..SvmParams::default()
                }),
            },
        ];
        let run = train_candidates(&x, &y, &bank, &TrainerConfig::default()).unwrap();
        (x, run.trained)
    }

    #[test]
    fn reloaded_pipeline_reproduces_predictions() {
        let store = temp_store("reload");
        let (x, trained) = trained();
        for model in &trained {
            store.save(&model.name, model).unwrap();
            let loaded = store.load(&model.name).unwrap();
            assert_eq!(&loaded, model);
            assert_eq!(
                loaded.pipeline.predict(&x).unwrap(),
                model.pipeline.predict(&x).unwrap()
            );
        }
        assert_eq!(store.list().unwrap(), ["forest", "svm"]);
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn missing_model_is_not_found() {
        let store = temp_store("missing");
        assert!(matches!(
            store.load("nope"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn version_and_garbage_are_rejected() {
        let store = temp_store("version");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(
            store.path_for("old"),
            r#"{"format_version": 0, "saved_at": "2024-01-01T00:00:00Z", "model": {}}"#,
        )
        .unwrap();
        fs::write(store.path_for("junk"), "not json").unwrap();

        assert!(matches!(
            store.load("old"),
            Err(StoreError::VersionMismatch { found: 0, .. })
        ));
        assert!(matches!(store.load("junk"), Err(StoreError::Decode { .. })));
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn names_are_sanitized() {
        let store = ModelStore::new("/tmp/x");
        assert!(store.path_for("a/b c").ends_with("model_a_b_c.json"));
    }
}
