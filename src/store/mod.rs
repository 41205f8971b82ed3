//! Dedup & persistence for enriched records.
//!
//! One combined CSV store holds every record ever written and is the source
//! of truth for which external IDs have been processed. Each record is also
//! appended to a partition file keyed by (language, year) for scoped exports.
//!
//! # At-most-once
//!
//! IDs already in the combined store are loaded on [`RecordStore::open`].
//! Workers [`claim`](RecordStore::claim) an ID before doing any network or CPU
//! work for it, and [`persist`](RecordStore::persist) re-checks under the write
//! lock, so an ID is appended to the combined store at most once across runs.
//!
//! # Partial failure
//!
//! The combined row is written first, then the partition row. An ID only
//! becomes processed once both are on disk. If the partition append fails,
//! the combined store is truncated back to its length before the write, so a
//! later run sees the ID as new and retries the track into both files.

mod csv_file;

pub use csv_file::{COLUMNS, ID_COLUMN, record_row};

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::EnrichedRecord;

/// Errors from the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path} is not a record store: missing column '{missing}'")]
    SchemaMismatch { path: PathBuf, missing: String },
}

/// Result of [`RecordStore::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Appended to the combined store and the partition file
    Written,
    /// The ID was already in the combined store; nothing was written
    AlreadyProcessed,
}

#[derive(Debug, Default)]
struct IdState {
    processed: HashSet<String>,
    in_flight: HashSet<String>,
}

/// Reservation of an external ID for in-flight work. Released on drop.
#[derive(Debug)]
pub struct Claim {
    id: String,
    ids: Arc<Mutex<IdState>>,
}

impl Claim {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.ids.lock().in_flight.remove(&self.id);
    }
}

/// Processed-ID count and row counts per partition file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatus {
    pub processed: usize,
    /// (file name, data rows), sorted by file name
    pub partitions: Vec<(String, usize)>,
}

/// Append-only combined store plus (language, year) partitions.
#[derive(Debug)]
pub struct RecordStore {
    combined: PathBuf,
    partition_dir: PathBuf,
    ids: Arc<Mutex<IdState>>,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Open (or create) the store.
    ///
    /// A missing or empty combined store is created with its header row. An
    /// existing one must carry the ID column.
    pub fn open(
        combined: impl Into<PathBuf>,
        partition_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let combined = combined.into();
        let partition_dir = partition_dir.into();

        if let Some(parent) = combined.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let processed = match fs::metadata(&combined) {
            Ok(meta) if meta.len() > 0 => csv_file::load_ids(&combined)?,
            Ok(_) => {
                csv_file::create_with_header(&combined)?;
                HashSet::new()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("Creating record store {:?}", combined);
                csv_file::create_with_header(&combined)?;
                HashSet::new()
            }
            Err(e) => return Err(e.into()),
        };

        fs::create_dir_all(&partition_dir)?;

        tracing::info!(
            processed = processed.len(),
            "Opened record store {:?}",
            combined
        );

        Ok(Self {
            combined,
            partition_dir,
            ids: Arc::new(Mutex::new(IdState {
                processed,
                in_flight: HashSet::new(),
            })),
            write_lock: Mutex::new(()),
        })
    }

    pub fn combined_path(&self) -> &Path {
        &self.combined
    }

    pub fn partition_dir(&self) -> &Path {
        &self.partition_dir
    }

    pub fn is_processed(&self, external_id: &str) -> bool {
        self.ids.lock().processed.contains(external_id)
    }

    pub fn processed_count(&self) -> usize {
        self.ids.lock().processed.len()
    }

    /// Reserve `external_id` for processing.
    ///
    /// Returns `None` if the ID is already processed or another worker holds it.
    pub fn claim(&self, external_id: &str) -> Option<Claim> {
        let mut state = self.ids.lock();
        if state.processed.contains(external_id) || !state.in_flight.insert(external_id.to_string())
        {
            return None;
        }
        Some(Claim {
            id: external_id.to_string(),
            ids: Arc::clone(&self.ids),
        })
    }

    /// Partition file for (language, year).
    pub fn partition_path(&self, language: &str, year: i32) -> PathBuf {
        self.partition_dir
            .join(format!("{}_{}.csv", partition_key(language), year))
    }

    /// Append a record to the combined store and its partition file.
    ///
    /// Blocking; call from the blocking pool in async code.
    pub fn persist(&self, record: &EnrichedRecord) -> Result<PersistOutcome, StoreError> {
        let id = record.external_id();
        let _write = self.write_lock.lock();

        if self.is_processed(id) {
            tracing::debug!(external_id = id, "Already in combined store");
            return Ok(PersistOutcome::AlreadyProcessed);
        }

        let row = record_row(record);
        let combined_len = csv_file::file_len(&self.combined)?;
        csv_file::append_row(&self.combined, &row)?;

        let partition = self.partition_path(&record.track.language, record.track.year);
        let partition_result = fs::create_dir_all(&self.partition_dir)
            .map_err(StoreError::from)
            .and_then(|_| csv_file::append_row(&partition, &row));

        match partition_result {
            Ok(created) => {
                if created {
                    tracing::info!("Created partition file {:?}", partition);
                }
                self.ids.lock().processed.insert(id.to_string());
                tracing::debug!(external_id = id, "Persisted record");
                Ok(PersistOutcome::Written)
            }
            Err(e) => {
                tracing::warn!(
                    external_id = id,
                    "Partition write to {:?} failed, rolling back combined row: {}",
                    partition,
                    e
                );
                if let Err(rollback) = csv_file::truncate_to(&self.combined, combined_len) {
                    tracing::error!(
                        external_id = id,
                        "Failed to roll back combined store {:?}: {}",
                        self.combined,
                        rollback
                    );
                }
                Err(e)
            }
        }
    }

    /// Processed-ID count and per-partition row counts.
    pub fn status(&self) -> Result<StoreStatus, StoreError> {
        Ok(StoreStatus {
            processed: self.processed_count(),
            partitions: partition_counts(&self.partition_dir)?,
        })
    }

    /// Report on a store without opening it.
    ///
    /// Never creates or modifies files; a missing combined store or partition
    /// directory counts as empty.
    pub fn inspect(combined: &Path, partition_dir: &Path) -> Result<StoreStatus, StoreError> {
        let processed = match fs::metadata(combined) {
            Ok(meta) if meta.len() > 0 => csv_file::load_ids(combined)?.len(),
            Ok(_) => 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        Ok(StoreStatus {
            processed,
            partitions: partition_counts(partition_dir)?,
        })
    }
}

/// Filesystem-safe, lower-cased language key ("unknown" if nothing is left).
fn partition_key(language: &str) -> String {
    let key: String = language
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let key = key.trim_matches('_');
    if key.is_empty() {
        "unknown".to_string()
    } else {
        key.to_string()
    }
}

/// Data rows per `*.csv` file in `dir`, sorted by file name.
fn partition_counts(dir: &Path) -> Result<Vec<(String, usize)>, StoreError> {
    let mut partitions = Vec::new();
    if !dir.is_dir() {
        return Ok(partitions);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        partitions.push((name.to_string(), csv_file::count_rows(&path)?));
    }
    partitions.sort();
    Ok(partitions)
}
