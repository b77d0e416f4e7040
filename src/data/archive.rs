//! NASA Exoplanet Archive integration (TAP `sync` endpoint, CSV output).
//!
//! Downloads are cached on disk as plain CSV. When a request fails the last
//! cached copy is used instead, so a run can proceed offline once a table has
//! been fetched.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::domain::LumScale;
use crate::error::AppError;
use crate::io::ingest::{IngestOptions, IngestedCatalog, load_catalog_csv};

const DEFAULT_BASE_URL: &str = "https://exoplanetarchive.ipac.caltech.edu/TAP/sync";
const DEFAULT_CACHE_DIR: &str = "exoplanet_data";

/// Archive tables the ranking understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchiveTable {
    /// Planetary Systems (default solution per planet).
    Ps,
    /// TESS Objects of Interest.
    Toi,
    /// K2 planets and candidates.
    K2pandc,
}

impl ArchiveTable {
    pub fn table_name(self) -> &'static str {
        match self {
            ArchiveTable::Ps => "ps",
            ArchiveTable::Toi => "toi",
            ArchiveTable::K2pandc => "k2pandc",
        }
    }

    pub fn query(self) -> String {
        match self {
            ArchiveTable::Ps | ArchiveTable::K2pandc => {
                format!("select * from {} where default_flag = 1", self.table_name())
            }
            ArchiveTable::Toi => format!("select * from {}", self.table_name()),
        }
    }

    /// The archive publishes `st_lum` as log10(L/Lsun).
    pub fn lum_scale(self) -> LumScale {
        LumScale::Log10
    }

    fn timeout(self) -> Duration {
        match self {
            ArchiveTable::Ps => Duration::from_secs(120),
            ArchiveTable::Toi | ArchiveTable::K2pandc => Duration::from_secs(60),
        }
    }
}

pub struct ArchiveClient {
    client: Client,
    base_url: String,
    cache_dir: PathBuf,
}

impl ArchiveClient {
    /// Build from `EXO_ARCHIVE_URL` / `EXO_CACHE_DIR` (a `.env` file is honoured).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let base_url =
            std::env::var("EXO_ARCHIVE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let cache_dir = std::env::var("EXO_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_DIR));
        Self::new(base_url, cache_dir)
    }

    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("exo-rank/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            cache_dir: cache_dir.into(),
        })
    }

    pub fn cache_path(&self, table: ArchiveTable) -> PathBuf {
        self.cache_dir.join(format!("{}.csv", table.table_name()))
    }

    /// Fetch `table` and ingest it.
    ///
    /// A cached copy is used as-is unless `refresh` is set; a failed download
    /// falls back to the cache when one exists.
    pub fn fetch_catalog(
        &self,
        table: ArchiveTable,
        refresh: bool,
        options: &IngestOptions,
    ) -> Result<IngestedCatalog, AppError> {
        let path = self.cache_path(table);
        if !refresh && path.is_file() {
            info!(table = table.table_name(), path = %path.display(), "using cached table");
        } else {
            match self.download(table, &path) {
                Ok(bytes) => {
                    info!(table = table.table_name(), bytes, "downloaded table");
                }
                Err(err) if path.is_file() => {
                    warn!(
                        table = table.table_name(),
                        error = %err,
                        "download failed; falling back to cached copy"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let mut catalog = load_catalog_csv(&path, options)?;
        catalog.source = format!("archive:{} ({})", table.table_name(), path.display());
        Ok(catalog)
    }

    fn download(&self, table: ArchiveTable, path: &Path) -> Result<usize, AppError> {
        let query = table.query();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("query", query.as_str()), ("format", "csv")])
            .timeout(table.timeout())
            .send()
            .map_err(|e| AppError::new(4, format!("Archive request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("Archive request failed with status {}.", resp.status()),
            ));
        }

        let body = resp
            .bytes()
            .map_err(|e| AppError::new(4, format!("Failed to read archive response: {e}")))?;
        if body.is_empty() {
            return Err(AppError::new(4, "Archive returned an empty table."));
        }

        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            AppError::new(
                2,
                format!(
                    "Failed to create cache dir '{}': {e}",
                    self.cache_dir.display()
                ),
            )
        })?;
        fs::write(path, &body).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to write cache file '{}': {e}", path.display()),
            )
        })?;
        Ok(body.len())
    }
}

/// Default `--lum-scale` for a catalog source when none is given.
pub fn default_lum_scale(table: Option<ArchiveTable>) -> LumScale {
    table.map(ArchiveTable::lum_scale).unwrap_or(LumScale::Linear)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("exo-rank-archive-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    // Nothing listens on the discard port, so requests fail fast.
    const DEAD_URL: &str = "http://127.0.0.1:9/TAP/sync";

    #[test]
    fn queries_name_their_table() {
        assert_eq!(
            ArchiveTable::Ps.query(),
            "select * from ps where default_flag = 1"
        );
        assert_eq!(ArchiveTable::Toi.query(), "select * from toi");
        assert_eq!(default_lum_scale(None), LumScale::Linear);
        assert_eq!(default_lum_scale(Some(ArchiveTable::Ps)), LumScale::Log10);
    }

    #[test]
    fn failed_download_falls_back_to_cache() {
        let dir = temp_dir("fallback");
        let client = ArchiveClient::new(DEAD_URL, &dir).unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            client.cache_path(ArchiveTable::Toi),
            "toi,st_teff,pl_rade\n1000.01,5700,1.1\n",
        )
        .unwrap();

        let catalog = client
            .fetch_catalog(ArchiveTable::Toi, true, &IngestOptions::default())
            .unwrap();
        assert_eq!(catalog.records.len(), 1);
        assert_eq!(catalog.records[0].planet_name.as_deref(), Some("1000.01"));
        assert!(catalog.source.starts_with("archive:toi"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_download_without_cache_is_an_error() {
        let dir = temp_dir("nocache");
        let client = ArchiveClient::new(DEAD_URL, &dir).unwrap();
        let err = client
            .fetch_catalog(ArchiveTable::Ps, false, &IngestOptions::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
