//! Catalog file reader - turns per-language movie CSVs into catalog queries.
//!
//! A catalog file needs `Title`, `Release Date` and `Language` columns. Rows
//! with an empty title, an unparsable release date or a year before 1900 are
//! dropped here so the pipeline only ever sees valid queries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::model::CatalogQuery;

/// Columns every catalog file must have.
pub const REQUIRED_COLUMNS: [&str; 3] = ["Title", "Release Date", "Language"];

/// Earliest release year accepted.
pub const MIN_YEAR: i32 = 1900;

/// Formats tried in order: day-first first, then month-first for dates
/// like `05/13/1999` that no day-first reading accepts.
const DATE_FORMATS: &[&str] = &[
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%m-%d-%Y",
    "%m/%d/%Y",
    "%m.%d.%Y",
];

/// Errors reading a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Catalog {path} is missing required columns: {}", missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },
}

/// Read one catalog file.
///
/// `language` is the key the file is configured under; it tags rows whose
/// `Language` cell is empty.
pub fn read_catalog(path: &Path, language: &str) -> Result<Vec<CatalogQuery>, CatalogError> {
    let read_error = |source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_error)?;
    let headers = reader.headers().map_err(read_error)?.clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| column(**name).is_none())
        .map(|name| name.to_string())
        .collect();
    let (Some(title_col), Some(date_col), Some(lang_col)) =
        (column("Title"), column("Release Date"), column("Language"))
    else {
        return Err(CatalogError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    };

    let mut queries = Vec::new();
    let mut dropped = 0usize;
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping malformed row {} in {:?}: {}", line + 2, path, e);
                dropped += 1;
                continue;
            }
        };

        let title = record.get(title_col).unwrap_or_default();
        let release = record.get(date_col).unwrap_or_default();
        if title.is_empty() {
            dropped += 1;
            continue;
        }
        let Some(year) = release_year(release).filter(|y| *y >= MIN_YEAR) else {
            tracing::debug!(title, release, "Dropping catalog row without a usable release year");
            dropped += 1;
            continue;
        };

        let row_language = record
            .get(lang_col)
            .filter(|l| !l.is_empty())
            .unwrap_or(language)
            .to_lowercase();
        queries.push(CatalogQuery::new(title, row_language, year));
    }

    tracing::info!(
        language,
        queries = queries.len(),
        dropped,
        "Read catalog {:?}",
        path
    );
    Ok(queries)
}

/// Read every configured catalog, optionally restricted to `languages`.
///
/// Files that do not exist are skipped with a warning; any other error is
/// returned.
pub fn read_catalogs(
    files: &BTreeMap<String, PathBuf>,
    languages: &[String],
) -> Result<Vec<CatalogQuery>, CatalogError> {
    let mut queries = Vec::new();
    for (language, path) in files {
        if !languages.is_empty() && !languages.iter().any(|l| l.eq_ignore_ascii_case(language)) {
            continue;
        }
        if !path.exists() {
            tracing::warn!(language = %language, "Catalog file {:?} not found, skipping", path);
            continue;
        }
        queries.extend(read_catalog(path, language)?);
    }
    Ok(queries)
}

/// Release year from a date string (day-first, month-first fallback) or a bare year.
pub fn release_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse().ok();
    }
    // Drop a time component ("2021-12-17 00:00:00", "2021-12-17T00:00:00")
    let date = value
        .split_once('T')
        .filter(|(d, _)| d.len() == 10)
        .map_or(value, |(d, _)| d);
    let date = match date.split_once(' ') {
        Some((d, rest)) if rest.contains(':') => d,
        _ => date,
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
        .map(|d| d.year())
}
