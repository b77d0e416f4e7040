//! CSV catalog ingest.
//!
//! Turns an exoplanet table (NASA Exoplanet Archive export, or any CSV with
//! the same column names) into `PlanetRecord`s. Columns are addressed by
//! header name, so column order, extra columns and missing columns are all
//! tolerated. Each header is resolved once, here; downstream code only sees
//! typed optional fields.
//!
//! Cell policy:
//! - empty, unparsable or non-finite numeric cells become `None`
//! - rows the CSV reader cannot decode are skipped and reported as `RowError`

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::domain::{LumScale, PlanetRecord};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: records + what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedCatalog {
    /// Human-readable origin (file path, archive table, ...).
    pub source: String,
    pub records: Vec<PlanetRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Known fields with no matching column in this file.
    pub missing_fields: Vec<&'static str>,
}

impl IngestedCatalog {
    /// Wrap in-memory records (e.g. a synthetic catalog).
    pub fn from_records(source: impl Into<String>, records: Vec<PlanetRecord>) -> Self {
        let rows_read = records.len();
        Self {
            source: source.into(),
            records,
            row_errors: Vec::new(),
            rows_read,
            missing_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub lum_scale: LumScale,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            lum_scale: LumScale::Linear,
        }
    }
}

/// Canonical field name followed by accepted header aliases.
const FIELDS: [(&str, &[&str]); 17] = [
    ("pl_name", &["pl_name", "planet_name", "toi"]),
    ("hostname", &["hostname", "host_name"]),
    ("pl_orbper", &["pl_orbper"]),
    ("pl_orbsmax", &["pl_orbsmax"]),
    ("pl_rade", &["pl_rade"]),
    ("pl_masse", &["pl_masse", "pl_bmasse"]),
    ("pl_eqt", &["pl_eqt"]),
    ("st_teff", &["st_teff"]),
    ("st_lum", &["st_lum"]),
    ("st_rad", &["st_rad"]),
    ("st_mass", &["st_mass"]),
    ("st_age", &["st_age"]),
    ("st_spectype", &["st_spectype", "spectype"]),
    ("sy_jmag", &["sy_jmag"]),
    ("sy_kmag", &["sy_kmag"]),
    ("pl_trandep", &["pl_trandep", "tran_depth"]),
    ("disc_year", &["disc_year"]),
];

/// Load a catalog CSV from disk.
pub fn load_catalog_csv(path: &Path, options: &IngestOptions) -> Result<IngestedCatalog, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open catalog CSV '{}': {e}", path.display()),
        )
    })?;
    read_catalog(file, &path.display().to_string(), options)
}

/// Read a catalog CSV from any reader.
pub fn read_catalog<R: Read>(
    reader: R,
    source: &str,
    options: &IngestOptions,
) -> Result<IngestedCatalog, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers from {source}: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let columns: HashMap<&'static str, usize> = FIELDS
        .iter()
        .filter_map(|(field, aliases)| {
            aliases
                .iter()
                .find_map(|alias| header_map.get(*alias))
                .map(|&idx| (*field, idx))
        })
        .collect();
    if columns.is_empty() {
        return Err(AppError::new(
            2,
            format!("{source}: no recognized catalog columns (expected e.g. pl_name, st_teff, pl_rade)."),
        ));
    }
    let missing_fields: Vec<&'static str> = FIELDS
        .iter()
        .map(|(field, _)| *field)
        .filter(|field| !columns.contains_key(field))
        .collect();
    if !missing_fields.is_empty() {
        debug!(source, missing = ?missing_fields, "catalog lacks some columns");
    }

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    for (idx, result) in reader.records().enumerate() {
        rows_read += 1;
        match result {
            Ok(record) => records.push(parse_row(&record, &columns, options)),
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(idx + 2);
                row_errors.push(RowError {
                    line,
                    message: e.to_string(),
                });
            }
        }
    }
    if !row_errors.is_empty() {
        warn!(source, skipped = row_errors.len(), "skipped unreadable rows");
    }

    Ok(IngestedCatalog {
        source: source.to_string(),
        records,
        row_errors,
        rows_read,
        missing_fields,
    })
}

fn parse_row(
    record: &StringRecord,
    columns: &HashMap<&'static str, usize>,
    options: &IngestOptions,
) -> PlanetRecord {
    let text = |field: &str| get_optional(record, columns, field).map(str::to_string);
    let num = |field: &str| parse_opt_f64(get_optional(record, columns, field));

    let star_lum = match options.lum_scale {
        LumScale::Linear => num("st_lum"),
        LumScale::Log10 => num("st_lum")
            .map(|v| 10f64.powf(v))
            .filter(|v| v.is_finite()),
    };

    PlanetRecord {
        planet_name: text("pl_name"),
        host_name: text("hostname"),
        orbital_period: num("pl_orbper"),
        semi_major_axis: num("pl_orbsmax"),
        radius: num("pl_rade"),
        mass: num("pl_masse"),
        eq_temp: num("pl_eqt"),
        star_teff: num("st_teff"),
        star_lum,
        star_radius: num("st_rad"),
        star_mass: num("st_mass"),
        star_age: num("st_age"),
        spectral_type: text("st_spectype"),
        j_mag: num("sy_jmag"),
        k_mag: num("sy_kmag"),
        transit_depth: num("pl_trandep"),
        disc_year: num("disc_year"),
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_optional<'a>(
    record: &'a StringRecord,
    columns: &HashMap<&'static str, usize>,
    field: &str,
) -> Option<&'a str> {
    let idx = columns.get(field)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
