//! Spotify Web API integration
//!
//! The catalog search service: album search, album track listings and
//! preview-clip lookup, authenticated with the client-credentials flow.
//!
//! API docs: https://developer.spotify.com/documentation/web-api

mod adapter;
mod client;
pub mod dto;

pub use client::SpotifyClient;
