//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the application.
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors (e.g., [`EnrichmentError`], [`StoreError`]) for detailed handling
//! - All errors implement `std::error::Error` for compatibility
//!
//! Only configuration-class errors (bad config, unreadable catalog, foreign
//! record store) travel up as [`Error`]. Per-track failures stay inside the
//! pipeline as outcomes.
//!
//! # Example
//!
//! ```ignore
//! use soundtrack_enricher::error::{Result, ResultExt};
//!
//! fn open(config: &Config) -> Result<RecordStore> {
//!     let store = RecordStore::open(&config.storage.combined_store, &config.storage.partition_dir)?;
//!     std::fs::create_dir_all(&config.storage.scratch_dir).with_context("creating scratch dir")?;
//!     Ok(store)
//! }
//! ```
//!
//! [`EnrichmentError`]: crate::enrichment::EnrichmentError
//! [`StoreError`]: crate::store::StoreError

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Catalog file error
    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    /// Record store error
    #[error("Persistence error: {0}")]
    Persistence(#[from] crate::store::StoreError),

    /// Enrichment error
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] crate::enrichment::EnrichmentError),

    /// Credential pool error
    #[error("Credential error: {0}")]
    Credentials(#[from] crate::enrichment::RotatorError),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, crate::store::StoreError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Persistence(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_error_display() {
        let err = Error::from(ConfigError::NoCredentials);
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::from(std::io::Error::other("disk full")).context("while opening store");
        let msg = err.to_string();
        assert!(msg.contains("while opening store"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_result_ext() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));
    }

    #[test]
    fn test_store_error_context() {
        let result: std::result::Result<(), crate::store::StoreError> =
            Err(std::io::Error::other("locked").into());
        let err = result.with_context("persisting").unwrap_err();
        assert!(matches!(err, Error::WithContext { .. }));
    }
}
