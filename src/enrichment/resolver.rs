//! Catalog resolver - turns a catalog query into track records.
//!
//! 1. Build the search key from (title, language, year)
//! 2. Search for the best album match through the current credential handle
//! 3. Fetch the album's track listing with the same handle
//! 4. Tag every track with the originating query
//!
//! Transient failures back off (`base_delay * 2^attempt`), rotate credentials
//! and retry, up to `max_retries` attempts in total. The resolver never fails
//! past its boundary: exhaustion and not-found both come back as an empty list.

use std::sync::Arc;
use std::time::Duration;

use super::domain::{AlbumMatch, AlbumTrack, EnrichmentError};
use super::rotator::CredentialRotator;
use super::traits::CatalogSearchApi;
use crate::model::{CatalogQuery, TrackRecord};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts (at least 1)
    pub max_retries: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Resolves catalog queries to track records with rotation and backoff.
pub struct CatalogResolver<C> {
    rotator: Arc<CredentialRotator<C>>,
    policy: RetryPolicy,
}

impl<C: CatalogSearchApi> CatalogResolver<C> {
    pub fn new(rotator: Arc<CredentialRotator<C>>, policy: RetryPolicy) -> Self {
        Self { rotator, policy }
    }

    pub fn rotator(&self) -> &Arc<CredentialRotator<C>> {
        &self.rotator
    }

    /// Ask the catalog to accept every credential set in the pool.
    ///
    /// A rejected set fails the check. Any other error (network, rate
    /// limiting) is logged and left for the retry loop to deal with.
    pub async fn verify_credentials(&self) -> Result<(), EnrichmentError> {
        for handle in self.rotator.each_client() {
            match handle.check_credentials().await {
                Ok(()) => tracing::debug!(credential_index = handle.index, "Credentials accepted"),
                Err(EnrichmentError::Unauthorized(msg)) => {
                    return Err(EnrichmentError::Unauthorized(format!(
                        "credential set {}: {}",
                        handle.index, msg
                    )));
                }
                Err(e) => tracing::warn!(
                    credential_index = handle.index,
                    "Could not verify credentials: {}",
                    e
                ),
            }
        }
        Ok(())
    }

    /// Resolve a query. Returns an empty list when nothing could be resolved.
    pub async fn resolve(&self, query: &CatalogQuery) -> Vec<TrackRecord> {
        match self.try_resolve(query).await {
            Ok(tracks) => {
                tracing::info!(query = %query, tracks = tracks.len(), "Resolved catalog query");
                tracks
            }
            Err(EnrichmentError::NoMatches) => {
                tracing::info!(query = %query, "No album match");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(query = %query, "Giving up on catalog query: {}", e);
                Vec::new()
            }
        }
    }

    /// Resolve a query, reporting why nothing came back.
    pub async fn try_resolve(
        &self,
        query: &CatalogQuery,
    ) -> Result<Vec<TrackRecord>, EnrichmentError> {
        let key = query.search_key();
        let attempts = self.policy.max_retries.max(1);
        let mut last_error = EnrichmentError::NoMatches;

        for attempt in 0..attempts {
            let handle = self.rotator.current_client();
            tracing::debug!(
                query = %key,
                attempt = attempt + 1,
                credential_index = handle.index,
                "Catalog search"
            );

            match fetch_album(&*handle, &key).await {
                Ok(Some((album, tracks))) => return Ok(to_track_records(query, &album, tracks)),
                Ok(None) => return Err(EnrichmentError::NoMatches),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        query = %key,
                        attempt = attempt + 1,
                        credential_index = handle.index,
                        "Catalog search failed: {}",
                        e
                    );
                    last_error = e;
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                    self.rotator.rotate_after_failure(&handle);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

/// Search then list tracks with a single client handle.
async fn fetch_album<C: CatalogSearchApi + ?Sized>(
    client: &C,
    key: &str,
) -> Result<Option<(AlbumMatch, Vec<AlbumTrack>)>, EnrichmentError> {
    let Some(album) = client.search_album(key).await? else {
        return Ok(None);
    };
    let tracks = client.album_tracks(&album.id).await?;
    Ok(Some((album, tracks)))
}

/// Map an album listing into records tagged with the originating query.
pub fn to_track_records(
    query: &CatalogQuery,
    album: &AlbumMatch,
    tracks: Vec<AlbumTrack>,
) -> Vec<TrackRecord> {
    tracks
        .into_iter()
        .filter(|t| !t.id.is_empty())
        .map(|t| TrackRecord {
            external_id: t.id,
            title: t.name,
            artist_names: t.artists.into_iter().collect(),
            album_name: album.name.clone(),
            release_date: album.release_date.clone(),
            popularity: 0,
            source_title: query.title.clone(),
            language: query.language.clone(),
            year: query.release_year,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::rotator::CredentialSet;
    use crate::enrichment::traits::mocks::{CatalogScript, MockCatalog};
    use proptest::prelude::*;

    fn album() -> AlbumMatch {
        AlbumMatch {
            id: "album-pushpa".to_string(),
            name: "Pushpa - The Rise".to_string(),
            release_date: "2021-12-17".to_string(),
        }
    }

    fn tracks() -> Vec<AlbumTrack> {
        vec![
            AlbumTrack {
                id: "trk-1".to_string(),
                name: "Srivalli".to_string(),
                artists: vec!["Sid Sriram".to_string()],
                preview_url: None,
            },
            AlbumTrack {
                id: "trk-2".to_string(),
                name: "Oo Antava".to_string(),
                artists: vec!["Indravathi Chauhan".to_string(), "Devi Sri Prasad".to_string()],
                preview_url: None,
            },
        ]
    }

    fn resolver(script: Arc<CatalogScript>, sets: usize, retries: u32) -> CatalogResolver<MockCatalog> {
        resolver_with(
            script,
            sets,
            RetryPolicy {
                max_retries: retries,
                base_delay: Duration::ZERO,
            },
        )
    }

    fn resolver_with(
        script: Arc<CatalogScript>,
        sets: usize,
        policy: RetryPolicy,
    ) -> CatalogResolver<MockCatalog> {
        let pool = (0..sets)
            .map(|i| CredentialSet {
                index: i,
                identity: format!("id-{i}"),
                secret: format!("secret-{i}"),
            })
            .collect();
        let rotator = CredentialRotator::new(pool, move |set| MockCatalog {
            index: set.index,
            script: Arc::clone(&script),
        })
        .unwrap();
        CatalogResolver::new(Arc::new(rotator), policy)
    }

    #[test]
    fn test_backoff_growth() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        };
        // Delays before attempts 2 and 3
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(40), policy.delay_for(32));
        assert!(policy.delay_for(40) > policy.delay_for(31));
    }

    #[tokio::test]
    async fn test_resolve_tags_records_with_query() {
        let script = Arc::new(CatalogScript::with_album(album(), tracks()));
        let resolver = resolver(script, 1, 3);
        let query = CatalogQuery::new("Pushpa", "telugu", 2021);

        let records = resolver.resolve(&query).await;

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.source_title, "Pushpa");
            assert_eq!(record.language, "telugu");
            assert_eq!(record.year, 2021);
            assert_eq!(record.album_name, "Pushpa - The Rise");
            assert_eq!(record.release_date, "2021-12-17");
            assert_eq!(record.popularity, 0);
        }
        assert_eq!(records[1].artist_names.len(), 2);
    }

    #[tokio::test]
    async fn test_rotation_coverage() {
        // 3 sets, first two attempts fail: the third uses credential index 2
        let script = Arc::new(CatalogScript::with_album(album(), tracks()).failing_first(2));
        let resolver = resolver(script.clone(), 3, 3);

        let records = resolver.resolve(&CatalogQuery::new("Pushpa", "telugu", 2021)).await;

        assert_eq!(records.len(), 2);
        assert_eq!(script.search_indices(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_yield_empty() {
        let script = Arc::new(
            CatalogScript::with_album(album(), tracks())
                .failing_first(10)
                .failing_with(EnrichmentError::Network("connection reset".into())),
        );
        let resolver = resolver(script.clone(), 2, 3);

        let records = resolver.resolve(&CatalogQuery::new("Pushpa", "telugu", 2021)).await;

        assert!(records.is_empty());
        assert_eq!(script.search_indices(), vec![0, 1, 0]);
        assert_eq!(script.track_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_wait_out_the_backoff() {
        let script = Arc::new(CatalogScript::with_album(album(), tracks()).failing_first(3));
        let resolver = resolver_with(
            script.clone(),
            3,
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_secs(5),
            },
        );
        let started = tokio::time::Instant::now();

        let records = resolver.resolve(&CatalogQuery::new("Pushpa", "telugu", 2021)).await;

        // 5s after the first failure, 10s after the second, nothing after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(16), "waited {:?}", elapsed);
        assert!(records.is_empty());
        assert_eq!(script.search_indices(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_verify_credentials_checks_every_set() {
        let script = Arc::new(CatalogScript::default());
        let resolver = resolver(script.clone(), 3, 3);

        resolver.verify_credentials().await.unwrap();

        assert_eq!(*script.credential_checks.lock(), vec![0, 1, 2]);
        assert_eq!(resolver.rotator().current_index(), 0);
    }

    #[tokio::test]
    async fn test_verify_credentials_names_rejected_set() {
        let script = Arc::new(CatalogScript::default().rejecting(1));
        let resolver = resolver(script.clone(), 3, 3);

        let result = resolver.verify_credentials().await;

        match result {
            Err(EnrichmentError::Unauthorized(msg)) => assert!(msg.contains("credential set 1")),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(script.search_indices().is_empty());
    }

    #[tokio::test]
    async fn test_no_album_is_not_retried() {
        let script = Arc::new(CatalogScript::default());
        let resolver = resolver(script.clone(), 3, 3);

        let result = resolver.try_resolve(&CatalogQuery::new("Unknown", "tamil", 1999)).await;

        assert!(matches!(result, Err(EnrichmentError::NoMatches)));
        assert_eq!(script.search_indices().len(), 1);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let script = Arc::new(
            CatalogScript::with_album(album(), tracks())
                .failing_first(5)
                .failing_with(EnrichmentError::Decode("unexpected".into())),
        );
        let resolver = resolver(script.clone(), 3, 3);

        let records = resolver.resolve(&CatalogQuery::new("Pushpa", "telugu", 2021)).await;

        assert!(records.is_empty());
        assert_eq!(script.search_indices().len(), 1);
    }

    #[test]
    fn test_tracks_without_id_are_dropped() {
        let mut listing = tracks();
        listing.push(AlbumTrack::default());
        let query = CatalogQuery::new("Pushpa", "telugu", 2021);
        assert_eq!(to_track_records(&query, &album(), listing).len(), 2);
    }

    proptest! {
        /// Each delay doubles the previous one
        #[test]
        fn backoff_is_geometric(base in 1u64..60, attempt in 0u32..10) {
            let policy = RetryPolicy { max_retries: 12, base_delay: Duration::from_secs(base) };
            prop_assert_eq!(policy.delay_for(attempt + 1), policy.delay_for(attempt) * 2);
        }
    }
}
