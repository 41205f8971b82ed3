//! Adapter layer: Convert Spotify DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! If the Spotify response format changes, only this file and dto.rs change.

use super::dto;
use crate::enrichment::domain::{AlbumMatch, AlbumTrack};
use crate::model::MediaLocator;

/// First album of a search response, if any
pub fn to_album_match(response: dto::AlbumSearchResponse) -> Option<AlbumMatch> {
    response.albums.items.into_iter().next().map(|album| AlbumMatch {
        id: album.id,
        name: album.name,
        release_date: album.release_date.unwrap_or_default(),
    })
}

/// Convert an album track listing, skipping tracks without a catalog ID
pub fn to_album_tracks(items: Vec<dto::SimplifiedTrack>) -> Vec<AlbumTrack> {
    items.into_iter().filter_map(to_album_track).collect()
}

fn to_album_track(track: dto::SimplifiedTrack) -> Option<AlbumTrack> {
    let id = track.id.filter(|id| !id.is_empty())?;
    Some(AlbumTrack {
        id,
        name: track.name,
        artists: track.artists.into_iter().map(|a| a.name).collect(),
        preview_url: track.preview_url,
    })
}

/// Preview clip of the first track hit, if the catalog has one
pub fn to_preview_locator(response: dto::TrackSearchResponse) -> Option<MediaLocator> {
    response
        .tracks
        .items
        .into_iter()
        .next()
        .and_then(|t| t.preview_url)
        .filter(|url| !url.is_empty())
        .map(MediaLocator::direct_audio)
}
