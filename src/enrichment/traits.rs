//! Capability contracts for the external services the pipeline consumes.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real implementations (Spotify client, yt-dlp,
//! headless browser, ffmpeg), while tests substitute the mocks below.
//!
//! # Example
//!
//! ```ignore
//! use soundtrack_enricher::enrichment::traits::CatalogSearchApi;
//!
//! async fn first_album<C: CatalogSearchApi>(client: &C) -> Result<Option<AlbumMatch>, EnrichmentError> {
//!     client.search_album("Pushpa telugu 2021").await
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;

use super::domain::{AlbumMatch, AlbumTrack, EnrichmentError};
use crate::model::MediaLocator;

/// Catalog metadata search (album search + track listing).
///
/// Implementations are subject to rate limiting; callers must be ready for
/// [`EnrichmentError::RateLimited`].
#[async_trait]
pub trait CatalogSearchApi: Send + Sync {
    /// Find the best album match for a free-text query.
    async fn search_album(&self, query: &str) -> Result<Option<AlbumMatch>, EnrichmentError>;

    /// List the tracks of an album.
    async fn album_tracks(&self, album_id: &str) -> Result<Vec<AlbumTrack>, EnrichmentError>;

    /// Look up a short preview clip for a track.
    ///
    /// Catalogs without previews keep the default.
    async fn track_preview(
        &self,
        _title: &str,
        _artist: &str,
    ) -> Result<Option<MediaLocator>, EnrichmentError> {
        Ok(None)
    }

    /// Confirm the client's credentials are accepted.
    ///
    /// Returns [`EnrichmentError::Unauthorized`] when they are rejected.
    async fn check_credentials(&self) -> Result<(), EnrichmentError> {
        Ok(())
    }
}

/// One link in the source locator's fallback chain.
#[async_trait]
pub trait MediaSearchStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Find a playable source for (title, artist). `Ok(None)` means not found.
    async fn find_media(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<MediaLocator>, EnrichmentError>;
}

/// Fetches and transcodes media into the canonical PCM file.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download the resource behind `locator` to exactly `dest`.
    async fn download(&self, locator: &MediaLocator, dest: &Path) -> Result<(), EnrichmentError>;

    /// Transcode `source` into a mono 16-bit PCM WAV at `dest`.
    async fn transcode(&self, source: &Path, dest: &Path) -> Result<(), EnrichmentError>;
}

/// Mock implementations for testing.
///
/// Return configurable responses for testing different scenarios.
#[cfg(test)]
pub mod mocks {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// Shared behaviour for every [`MockCatalog`] handle built by a rotator.
    #[derive(Default)]
    pub struct CatalogScript {
        /// Album returned by `search_album`
        pub album: Option<AlbumMatch>,
        /// Tracks returned by `album_tracks`
        pub tracks: Vec<AlbumTrack>,
        /// Preview returned by `track_preview`
        pub preview: Option<String>,
        /// Number of `search_album` calls that fail with `failure` before succeeding
        pub failures_remaining: AtomicUsize,
        /// Error used for scripted failures (defaults to `RateLimited`)
        pub failure: Option<EnrichmentError>,
        /// Credential index used for each `search_album` call, in order
        pub search_calls: Mutex<Vec<usize>>,
        /// Number of `album_tracks` calls
        pub track_calls: AtomicUsize,
        /// Number of `track_preview` calls
        pub preview_calls: AtomicUsize,
        /// Credential indices whose `check_credentials` is rejected
        pub rejected: Vec<usize>,
        /// Credential index used for each `check_credentials` call, in order
        pub credential_checks: Mutex<Vec<usize>>,
    }

    impl CatalogScript {
        /// A catalog that always finds `album` with `tracks`.
        pub fn with_album(album: AlbumMatch, tracks: Vec<AlbumTrack>) -> Self {
            Self {
                album: Some(album),
                tracks,
                ..Default::default()
            }
        }

        /// Fail the first `n` searches with the scripted error.
        pub fn failing_first(mut self, n: usize) -> Self {
            self.failures_remaining = AtomicUsize::new(n);
            self
        }

        pub fn failing_with(mut self, error: EnrichmentError) -> Self {
            self.failure = Some(error);
            self
        }

        pub fn with_preview(mut self, url: &str) -> Self {
            self.preview = Some(url.to_string());
            self
        }

        /// Reject the credentials of set `index`.
        pub fn rejecting(mut self, index: usize) -> Self {
            self.rejected.push(index);
            self
        }

        pub fn search_indices(&self) -> Vec<usize> {
            self.search_calls.lock().clone()
        }

        fn take_failure(&self) -> Option<EnrichmentError> {
            let previous = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            previous
                .ok()
                .map(|_| self.failure.clone().unwrap_or(EnrichmentError::RateLimited))
        }
    }

    /// Mock catalog client bound to one credential index.
    pub struct MockCatalog {
        pub index: usize,
        pub script: Arc<CatalogScript>,
    }

    #[async_trait]
    impl CatalogSearchApi for MockCatalog {
        async fn search_album(&self, _query: &str) -> Result<Option<AlbumMatch>, EnrichmentError> {
            self.script.search_calls.lock().push(self.index);
            if let Some(err) = self.script.take_failure() {
                return Err(err);
            }
            Ok(self.script.album.clone())
        }

        async fn album_tracks(&self, _album_id: &str) -> Result<Vec<AlbumTrack>, EnrichmentError> {
            self.script.track_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.tracks.clone())
        }

        async fn track_preview(
            &self,
            _title: &str,
            _artist: &str,
        ) -> Result<Option<MediaLocator>, EnrichmentError> {
            self.script.preview_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.preview.as_deref().map(MediaLocator::direct_audio))
        }

        async fn check_credentials(&self) -> Result<(), EnrichmentError> {
            self.script.credential_checks.lock().push(self.index);
            if self.script.rejected.contains(&self.index) {
                return Err(EnrichmentError::Unauthorized(format!(
                    "credential set {} rejected",
                    self.index
                )));
            }
            Ok(())
        }
    }

    /// Mock search strategy that returns a fixed answer and counts calls.
    pub struct MockStrategy {
        pub name: String,
        pub result: Option<MediaLocator>,
        pub error: Option<EnrichmentError>,
        pub calls: AtomicUsize,
    }

    impl MockStrategy {
        pub fn found(name: &str, url: &str) -> Self {
            Self {
                name: name.to_string(),
                result: Some(MediaLocator::page(url)),
                error: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn not_found(name: &str) -> Self {
            Self {
                name: name.to_string(),
                result: None,
                error: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(name: &str, error: EnrichmentError) -> Self {
            Self {
                name: name.to_string(),
                result: None,
                error: Some(error),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaSearchStrategy for MockStrategy {
        fn name(&self) -> &str {
            &self.name
        }

        async fn find_media(
            &self,
            _title: &str,
            _artist: &str,
        ) -> Result<Option<MediaLocator>, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref err) = self.error {
                return Err(err.clone());
            }
            Ok(self.result.clone())
        }
    }

    /// Mock downloader that "transcodes" by writing a generated sine-wave WAV.
    pub struct MockDownloader {
        /// Locator URLs whose download fails
        pub failing_urls: HashSet<String>,
        /// Write garbage instead of a WAV (decode then fails)
        pub corrupt_output: bool,
        /// Length of the generated audio in seconds
        pub seconds: f32,
        /// Every path this downloader wrote
        pub written: Mutex<Vec<std::path::PathBuf>>,
    }

    impl Default for MockDownloader {
        fn default() -> Self {
            Self {
                failing_urls: HashSet::new(),
                corrupt_output: false,
                seconds: 2.0,
                written: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockDownloader {
        pub fn failing_for(urls: &[&str]) -> Self {
            Self {
                failing_urls: urls.iter().map(|u| u.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn corrupt() -> Self {
            Self {
                corrupt_output: true,
                ..Default::default()
            }
        }

        pub fn written_paths(&self) -> Vec<std::path::PathBuf> {
            self.written.lock().clone()
        }
    }

    #[async_trait]
    impl MediaDownloader for MockDownloader {
        async fn download(&self, locator: &MediaLocator, dest: &Path) -> Result<(), EnrichmentError> {
            if self.failing_urls.contains(&locator.url) {
                // Leave a partial file behind, like an interrupted download would
                std::fs::write(dest.with_extension("source.part"), b"partial").ok();
                self.written.lock().push(dest.with_extension("source.part"));
                return Err(EnrichmentError::Download(format!("refused: {}", locator.url)));
            }
            std::fs::write(dest, b"compressed audio")
                .map_err(|e| EnrichmentError::Download(e.to_string()))?;
            self.written.lock().push(dest.to_path_buf());
            Ok(())
        }

        async fn transcode(&self, _source: &Path, dest: &Path) -> Result<(), EnrichmentError> {
            self.written.lock().push(dest.to_path_buf());
            if self.corrupt_output {
                std::fs::write(dest, b"RIFF this is not a wave file")
                    .map_err(|e| EnrichmentError::Transcode(e.to_string()))?;
                return Ok(());
            }
            crate::test_utils::write_sine_wav(dest, 440.0, self.seconds, 22_050)
                .map_err(|e| EnrichmentError::Transcode(e.to_string()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_catalog_fails_then_succeeds() {
            let album = AlbumMatch {
                id: "album-1".to_string(),
                name: "Album".to_string(),
                release_date: "2021".to_string(),
            };
            let script = Arc::new(CatalogScript::with_album(album, vec![]).failing_first(1));
            let client = MockCatalog {
                index: 0,
                script: script.clone(),
            };

            assert!(matches!(
                client.search_album("q").await,
                Err(EnrichmentError::RateLimited)
            ));
            assert!(client.search_album("q").await.unwrap().is_some());
            assert_eq!(script.search_indices(), vec![0, 0]);
        }

        #[tokio::test]
        async fn test_mock_strategy_counts_calls() {
            let strategy = MockStrategy::found("primary", "https://example.com/watch?v=abc");
            let result = strategy.find_media("Song", "Artist").await.unwrap();
            assert_eq!(result.unwrap().url, "https://example.com/watch?v=abc");
            assert_eq!(strategy.call_count(), 1);
        }

        #[tokio::test]
        async fn test_mock_strategy_error() {
            let strategy = MockStrategy::failing("broken", EnrichmentError::Network("timeout".into()));
            let result = strategy.find_media("Song", "Artist").await;
            assert!(matches!(result, Err(EnrichmentError::Network(_))));
        }
    }
}
