//! Append-only CSV files with a single header row.
//!
//! Rows are serialised in memory and written with one `write_all`. If that
//! write fails the file is truncated back to its previous length, so a file
//! never ends in half a row. The header is written by the same append that
//! writes the first row, which keeps the "is this file new?" decision and
//! the header write together.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::StoreError;
use crate::model::EnrichedRecord;

/// Column order shared by the combined store and every partition file.
pub const COLUMNS: [&str; 16] = [
    "Spotify ID",
    "Title",
    "Artist",
    "Album",
    "Release Date",
    "Popularity",
    "tempo",
    "loudness",
    "key",
    "danceability",
    "energy",
    "speechiness",
    "instrumentalness",
    "movie_title",
    "language",
    "year",
];

/// Column holding the external ID
pub const ID_COLUMN: &str = "Spotify ID";

/// One CSV row for a record, in [`COLUMNS`] order. Absent descriptors are empty.
pub fn record_row(record: &EnrichedRecord) -> Vec<String> {
    let track = &record.track;
    let mut row = Vec::with_capacity(COLUMNS.len());
    row.push(track.external_id.clone());
    row.push(track.title.clone());
    row.push(track.artists_joined());
    row.push(track.album_name.clone());
    row.push(track.release_date.clone());
    row.push(track.popularity.to_string());
    row.extend(
        record
            .features
            .values()
            .iter()
            .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
    );
    row.push(track.source_title.clone());
    row.push(track.language.clone());
    row.push(track.year.to_string());
    row
}

/// Create `path` holding just the header row.
pub fn create_with_header(path: &Path) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(COLUMNS)?;
    writer.flush()?;
    Ok(())
}

/// Load the external IDs of an existing store.
///
/// The header must contain [`ID_COLUMN`]. Rows that fail to parse are skipped
/// with a warning.
pub fn load_ids(path: &Path) -> Result<HashSet<String>, StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_col = headers
        .iter()
        .position(|h| h.trim() == ID_COLUMN)
        .ok_or_else(|| StoreError::SchemaMismatch {
            path: path.to_path_buf(),
            missing: ID_COLUMN.to_string(),
        })?;

    let mut ids = HashSet::new();
    for (line, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                if let Some(id) = record.get(id_col).map(str::trim).filter(|id| !id.is_empty()) {
                    ids.insert(id.to_string());
                }
            }
            Err(e) => {
                tracing::warn!("Skipping malformed row {} in {:?}: {}", line + 2, path, e);
            }
        }
    }
    Ok(ids)
}

/// Append one row, writing the header first if the file is new or empty.
///
/// Returns whether the header was written.
pub fn append_row(path: &Path, row: &[String]) -> Result<bool, StoreError> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;
    let len = file.metadata()?.len();
    let needs_header = len == 0;

    let mut buf = Vec::with_capacity(256);
    if !needs_header && !ends_with_newline(&mut file, len)? {
        buf.push(b'\n');
    }
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        if needs_header {
            writer.write_record(COLUMNS)?;
        }
        writer.write_record(row)?;
        writer.flush()?;
    }

    if let Err(e) = file.write_all(&buf).and_then(|_| file.flush()) {
        // Roll back whatever part of the row made it to disk
        if let Err(truncate) = file.set_len(len) {
            tracing::error!("Failed to roll back partial row in {:?}: {}", path, truncate);
        }
        return Err(e.into());
    }
    Ok(needs_header)
}

/// Current length of `path` in bytes (0 if it does not exist yet).
pub fn file_len(path: &Path) -> Result<u64, StoreError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Cut `path` back to `len` bytes, dropping rows appended after that point.
pub fn truncate_to(path: &Path, len: u64) -> Result<(), StoreError> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}

fn ends_with_newline(file: &mut File, len: u64) -> Result<bool, StoreError> {
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Number of data rows (excluding the header).
pub fn count_rows(path: &Path) -> Result<usize, StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    Ok(reader.records().filter(Result::is_ok).count())
}
