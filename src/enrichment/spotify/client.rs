//! Spotify HTTP client
//!
//! Handles communication with the Spotify Web API using the client-credentials
//! flow. See: https://developer.spotify.com/documentation/web-api
//!
//! One client is bound to one credential set. The access token is fetched
//! lazily and cached until shortly before it expires, so a rotated-in client
//! authenticates on its first request.
//!
//! ## Rate limiting
//! The API answers `429 Too Many Requests` (with a `Retry-After` header) when a
//! credential set exceeds its rolling quota. We surface that as
//! [`EnrichmentError::RateLimited`] and let the resolver rotate credentials.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{adapter, dto};
use crate::enrichment::domain::{AlbumMatch, AlbumTrack, EnrichmentError};
use crate::enrichment::rotator::CredentialSet;
use crate::enrichment::traits::CatalogSearchApi;
use crate::model::MediaLocator;

const ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";

/// Refresh this long before the token's stated expiry
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// Album listings are paged 50 at a time; soundtracks never get close to this
const MAX_TRACK_PAGES: usize = 10;

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Spotify Web API client bound to one credential set
pub struct SpotifyClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    base_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    /// Create a client for a credential set, sharing the given HTTP connection pool
    pub fn new(http_client: reqwest::Client, credentials: &CredentialSet) -> Self {
        Self::with_urls(http_client, credentials, ACCOUNTS_URL, API_URL)
    }

    /// Create a client against custom endpoints
    pub fn with_urls(
        http_client: reqwest::Client,
        credentials: &CredentialSet,
        token_url: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            client_id: credentials.identity.clone(),
            client_secret: credentials.secret.clone(),
            token_url: token_url.into(),
            base_url: base_url.into(),
            token: Mutex::new(None),
        }
    }

    /// Build the shared HTTP client used by every credential handle
    pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
    }

    /// Search for the best album match
    pub async fn search_album(&self, query: &str) -> Result<Option<AlbumMatch>, EnrichmentError> {
        let url = format!(
            "{}/search?q={}&type=album&limit=1",
            self.base_url,
            urlencoding::encode(query)
        );
        let response: dto::AlbumSearchResponse = self.get_json(&url).await?;
        Ok(adapter::to_album_match(response))
    }

    /// List an album's tracks, following pagination
    pub async fn album_tracks(&self, album_id: &str) -> Result<Vec<AlbumTrack>, EnrichmentError> {
        let mut url = format!(
            "{}/albums/{}/tracks?limit=50",
            self.base_url,
            urlencoding::encode(album_id)
        );
        let mut items = Vec::new();

        for _ in 0..MAX_TRACK_PAGES {
            let page: dto::AlbumTracksResponse = self.get_json(&url).await?;
            items.extend(page.items);
            match page.next {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }

        Ok(adapter::to_album_tracks(items))
    }

    /// Look up the preview clip for the first track matching (title, artist)
    pub async fn track_preview(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<MediaLocator>, EnrichmentError> {
        let query = format!("track:{} artist:{}", title, artist);
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            self.base_url,
            urlencoding::encode(&query)
        );
        let response: dto::TrackSearchResponse = self.get_json(&url).await?;
        Ok(adapter::to_preview_locator(response))
    }

    /// Authenticated GET, mapping HTTP failures onto the error taxonomy
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, EnrichmentError> {
        let token = self.access_token().await?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Token revoked or expired early: drop it so the next call re-authenticates
            self.token.lock().await.take();
            return Err(EnrichmentError::Unauthorized("access token rejected".to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?");
            tracing::debug!(retry_after, "Spotify rate limit hit");
            return Err(EnrichmentError::RateLimited);
        }

        if !status.is_success() {
            if let Ok(error) = response.json::<dto::ErrorResponse>().await {
                return Err(EnrichmentError::ApiError(format!(
                    "HTTP {}: {}",
                    error.error.status, error.error.message
                )));
            }
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }

    /// Cached access token, fetching a new one when missing or about to expire
    async fn access_token(&self) -> Result<String, EnrichmentError> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let fresh = self.request_token().await?;
        let value = fresh.access_token.clone();
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(TOKEN_SLACK);
        *slot = Some(AccessToken {
            value: fresh.access_token,
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn request_token(&self) -> Result<dto::TokenResponse, EnrichmentError> {
        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EnrichmentError::RateLimited);
        }
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EnrichmentError::Unauthorized(format!(
                "token request refused (HTTP {})",
                status
            )));
        }
        if !status.is_success() {
            return Err(EnrichmentError::Network(format!(
                "token request failed: HTTP {}",
                status
            )));
        }

        let token = response
            .json::<dto::TokenResponse>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(EnrichmentError::InvalidResponse("empty access token".to_string()));
        }
        Ok(token)
    }
}

#[async_trait]
impl CatalogSearchApi for SpotifyClient {
    async fn search_album(&self, query: &str) -> Result<Option<AlbumMatch>, EnrichmentError> {
        SpotifyClient::search_album(self, query).await
    }

    async fn album_tracks(&self, album_id: &str) -> Result<Vec<AlbumTrack>, EnrichmentError> {
        SpotifyClient::album_tracks(self, album_id).await
    }

    async fn track_preview(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<MediaLocator>, EnrichmentError> {
        SpotifyClient::track_preview(self, title, artist).await
    }

    async fn check_credentials(&self) -> Result<(), EnrichmentError> {
        self.access_token().await.map(|_| ())
    }
}
