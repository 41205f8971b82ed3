//! Internal domain models for catalog resolution and media acquisition.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All external API responses get converted into these types via adapters.

/// Best album match for a catalog search.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumMatch {
    /// Catalog album ID
    pub id: String,
    /// Album title
    pub name: String,
    /// Release date (YYYY, YYYY-MM, or YYYY-MM-DD)
    pub release_date: String,
}

/// One track from an album's track listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlbumTrack {
    /// Catalog track ID
    pub id: String,
    /// Track title
    pub name: String,
    /// Credited artist names, in order
    pub artists: Vec<String>,
    /// Short preview clip URL, when the catalog offers one
    pub preview_url: Option<String>,
}

/// Pipeline stage an error or outcome is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Locate,
    Acquire,
    Extract,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Locate => "locate",
            Stage::Acquire => "acquire",
            Stage::Extract => "extract",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while enriching a track.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Credentials rejected: {0}")]
    Unauthorized(String),

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("No matches found")]
    NoMatches,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Feature extraction failed: {0}")]
    Extraction(String),

    #[error("{0} not found. Install it or set its path in the [tools] config section")]
    ToolMissing(String),

    #[error("Cancelled")]
    Cancelled,
}

impl EnrichmentError {
    /// Whether retrying (after backoff and credential rotation) might succeed.
    ///
    /// Rate limits, network blips, rejected credentials and malformed responses
    /// are transient; not-found and local processing failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EnrichmentError::Network(_)
                | EnrichmentError::RateLimited
                | EnrichmentError::Unauthorized(_)
                | EnrichmentError::ApiError(_)
                | EnrichmentError::Parse(_)
                | EnrichmentError::InvalidResponse(_)
        )
    }
}
