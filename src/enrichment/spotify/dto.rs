//! Spotify Web API Data Transfer Objects
//!
//! These types match EXACTLY what the Spotify Web API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the spotify module - convert to domain types.
//!
//! API Reference: https://developer.spotify.com/documentation/web-api

use serde::{Deserialize, Serialize};

/// Client-credentials token response (`POST /api/token`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Generic paging object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// URL of the next page, if any
    pub next: Option<String>,
    pub total: Option<u32>,
}

/// `GET /v1/search?type=album`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumSearchResponse {
    pub albums: Paging<SimplifiedAlbum>,
}

/// `GET /v1/search?type=track`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackSearchResponse {
    pub tracks: Paging<SimplifiedTrack>,
}

/// `GET /v1/albums/{id}/tracks`
pub type AlbumTracksResponse = Paging<SimplifiedTrack>;

/// Album as it appears in search results
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimplifiedAlbum {
    pub id: String,
    pub name: String,
    /// "album", "single" or "compilation"
    pub album_type: Option<String>,
    /// YYYY, YYYY-MM or YYYY-MM-DD depending on precision
    pub release_date: Option<String>,
    pub release_date_precision: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<u32>,
}

/// Track as it appears in album listings and search results
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimplifiedTrack {
    /// Null for local files
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    /// 30 second MP3 preview, often null
    pub preview_url: Option<String>,
    pub track_number: Option<u32>,
    pub duration_ms: Option<u64>,
}

/// Artist credit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
    pub name: String,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_album_search() {
        let json = r#"{
            "albums": {
                "href": "https://api.spotify.com/v1/search?query=pushpa",
                "items": [{
                    "album_type": "album",
                    "id": "2Hjc5oT2ESpkJ2LJ8Bfd9v",
                    "name": "Pushpa - The Rise",
                    "release_date": "2021-12-17",
                    "release_date_precision": "day",
                    "total_tracks": 5,
                    "artists": [{"id": "x", "name": "Devi Sri Prasad"}]
                }],
                "limit": 1,
                "next": null,
                "offset": 0,
                "total": 12
            }
        }"#;

        let parsed: AlbumSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.albums.items.len(), 1);
        assert_eq!(parsed.albums.items[0].name, "Pushpa - The Rise");
        assert_eq!(parsed.albums.items[0].release_date.as_deref(), Some("2021-12-17"));
    }

    #[test]
    fn test_parse_track_with_null_id_and_preview() {
        let json = r#"{
            "items": [{
                "id": null,
                "name": "Local file",
                "artists": [],
                "preview_url": null,
                "track_number": 1,
                "duration_ms": 1000
            }],
            "next": null
        }"#;

        let parsed: AlbumTracksResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.items[0].id.is_none());
        assert!(parsed.items[0].preview_url.is_none());
    }

    #[test]
    fn test_parse_error_body() {
        let json = r#"{"error": {"status": 429, "message": "API rate limit exceeded"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.error.status, 429);
    }
}
