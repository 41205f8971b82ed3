//! Pipeline orchestrator.
//!
//! Queries are resolved one at a time (they share the rotating credential
//! state). Each query's tracks then fan out to at most `concurrency` workers:
//!
//! ```text
//! claim → locate → acquire → extract → persist
//! ```
//!
//! The orchestrator waits for the whole batch before moving to the next query.
//! A failure in any stage only drops that track. Decoding, feature extraction
//! and CSV writes run on the blocking pool so they never stall the workers'
//! network I/O.
//!
//! The [`CancellationToken`] is checked at the top of every stage. Tracks that
//! had not finished when it fired come back as [`TrackOutcome::Cancelled`].

mod summary;

pub use summary::{BatchSummary, RunSummary, TrackOutcome};

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::acquire::{Acquirer, ToolDownloader};
use crate::catalog;
use crate::config::{Config, ConfigError};
use crate::enrichment::{
    CatalogResolver, CatalogSearchApi, CredentialRotator, EnrichmentError, SpotifyClient, Stage,
};
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::locator::SourceLocator;
use crate::model::{CatalogQuery, EnrichedRecord, TrackRecord};
use crate::store::{PersistOutcome, RecordStore};

/// Drives catalog queries through every stage.
pub struct Pipeline<C> {
    resolver: CatalogResolver<C>,
    locator: SourceLocator,
    acquirer: Acquirer,
    extractor: Arc<FeatureExtractor>,
    store: Arc<RecordStore>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl<C: CatalogSearchApi> Pipeline<C> {
    pub fn new(
        resolver: CatalogResolver<C>,
        locator: SourceLocator,
        acquirer: Acquirer,
        extractor: FeatureExtractor,
        store: Arc<RecordStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            locator,
            acquirer,
            extractor: Arc::new(extractor),
            store,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to stop the run early.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Fail fast when the catalog rejects any configured credential set.
    pub async fn verify_credentials(&self) -> Result<()> {
        match self.resolver.verify_credentials().await {
            Err(EnrichmentError::Unauthorized(msg)) => {
                Err(ConfigError::InvalidCredential(msg).into())
            }
            _ => Ok(()),
        }
    }

    /// Run every query. Never fails; problems are counted in the summary.
    pub async fn run(&self, queries: &[CatalogQuery]) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        tracing::info!(
            queries = queries.len(),
            concurrency = self.concurrency,
            "Starting enrichment run"
        );

        for query in queries {
            if self.cancel.is_cancelled() {
                break;
            }

            let tracks = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                tracks = self.resolver.resolve(query) => tracks,
            };
            summary.queries += 1;

            if tracks.is_empty() {
                summary.unresolved_queries += 1;
                continue;
            }

            let batch = self.run_batch(tracks).await;
            tracing::info!(query = %query, "Batch complete: {}", batch);
            summary.add_batch(&batch);
        }

        summary.elapsed = started.elapsed();
        summary.cancelled = self.cancel.is_cancelled();
        if summary.cancelled {
            tracing::warn!("Run cancelled");
        }
        tracing::info!(
            queries = summary.queries,
            tracks = summary.tracks,
            "Run finished: {}",
            summary.totals
        );
        summary
    }

    /// Process one batch of tracks on the bounded worker pool and wait for all of them.
    pub async fn run_batch(&self, tracks: Vec<TrackRecord>) -> BatchSummary {
        let outcomes: Vec<(String, TrackOutcome)> = futures::stream::iter(tracks)
            .map(|track| async move {
                let id = track.external_id.clone();
                let title = track.title.clone();
                let outcome = self.process_track(track).await;
                match &outcome {
                    TrackOutcome::Persisted => {
                        tracing::info!(external_id = %id, title = %title, "Enriched")
                    }
                    TrackOutcome::Failed { stage, error } => {
                        tracing::warn!(external_id = %id, title = %title, %stage, "Dropped: {}", error)
                    }
                    other => tracing::debug!(external_id = %id, title = %title, "{}", other),
                }
                (id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        outcomes.iter().map(|(_, outcome)| outcome).collect()
    }

    /// Run one track through locate → acquire → extract → persist.
    pub async fn process_track(&self, track: TrackRecord) -> TrackOutcome {
        if self.cancel.is_cancelled() {
            return TrackOutcome::Cancelled;
        }
        let Some(_claim) = self.store.claim(&track.external_id) else {
            return TrackOutcome::AlreadyProcessed;
        };

        // Locate
        let artist = track.search_artist();
        let Some(locator) = self.locator.locate(&track.title, &artist).await else {
            return TrackOutcome::Unresolved;
        };

        // Acquire
        if self.cancel.is_cancelled() {
            return TrackOutcome::Cancelled;
        }
        let acquired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return TrackOutcome::Cancelled,
            result = self.acquirer.acquire(&track.external_id, &locator) => result,
        };
        let waveform = match acquired {
            Ok(waveform) => waveform,
            Err(e) => return TrackOutcome::failed(Stage::Acquire, e),
        };

        // Extract
        if self.cancel.is_cancelled() {
            return TrackOutcome::Cancelled;
        }
        let extractor = Arc::clone(&self.extractor);
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&waveform))
            .await
            .map_err(|e| EnrichmentError::Extraction(format!("Extraction task failed: {}", e)))
            .and_then(|result| result);
        let features = match extracted {
            Ok(features) if features.is_empty() => {
                return TrackOutcome::failed(Stage::Extract, "no finite descriptors");
            }
            Ok(features) => features,
            Err(e) => return TrackOutcome::failed(Stage::Extract, e),
        };

        // Persist
        if self.cancel.is_cancelled() {
            return TrackOutcome::Cancelled;
        }
        let store = Arc::clone(&self.store);
        let record = EnrichedRecord::new(track, features);
        match tokio::task::spawn_blocking(move || store.persist(&record)).await {
            Ok(Ok(PersistOutcome::Written)) => TrackOutcome::Persisted,
            Ok(Ok(PersistOutcome::AlreadyProcessed)) => TrackOutcome::AlreadyProcessed,
            Ok(Err(e)) => TrackOutcome::failed(Stage::Persist, e),
            Err(e) => TrackOutcome::failed(Stage::Persist, format!("Persist task failed: {}", e)),
        }
    }
}

impl Pipeline<SpotifyClient> {
    /// Build the production pipeline: Spotify catalog, yt-dlp / browser /
    /// preview locator chain, yt-dlp + ffmpeg acquisition.
    pub fn from_config(config: &Config, store: Arc<RecordStore>) -> Result<Self> {
        config.validate()?;

        let http = SpotifyClient::http_client()?;
        let factory_http = http.clone();
        let rotator = Arc::new(CredentialRotator::new(
            config.credential_pool(),
            move |set| SpotifyClient::new(factory_http.clone(), set),
        )?);

        let resolver = CatalogResolver::new(Arc::clone(&rotator), config.retry_policy());
        let locator = SourceLocator::standard(&config.tools, rotator);
        tracing::debug!(strategies = ?locator.strategy_names(), "Source locator chain");

        let downloader = Arc::new(ToolDownloader::new(&config.tools, http));
        let acquirer = Acquirer::new(&config.storage.scratch_dir, downloader);

        Ok(Self::new(
            resolver,
            locator,
            acquirer,
            FeatureExtractor::default(),
            store,
            config.pipeline.concurrency,
        ))
    }
}

/// Read the configured catalogs (optionally only `languages`), open the store
/// and run the full pipeline.
pub async fn run_catalogs(
    config: &Config,
    languages: &[String],
    cancel: CancellationToken,
) -> Result<RunSummary> {
    config.validate()?;
    let queries = catalog::read_catalogs(&config.catalog.files, languages)?;
    let store = Arc::new(RecordStore::open(
        &config.storage.combined_store,
        &config.storage.partition_dir,
    )?);

    let pipeline = Pipeline::from_config(config, store)?.with_cancellation(cancel);
    pipeline.verify_credentials().await?;
    tracing::info!(
        combined = ?pipeline.store().combined_path(),
        partitions = ?pipeline.store().partition_dir(),
        "Writing records"
    );
    Ok(pipeline.run(&queries).await)
}
