//! Catalog enrichment - resolves catalog queries into track records.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Internal types and the error taxonomy
//! - **Capability traits** (`traits.rs`) - Contracts for external services
//! - **API DTOs** (`spotify/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain models
//! - **Clients** - HTTP clients for external APIs
//! - **Rotator** - Credential pool with snapshot handles
//! - **Resolver** - Bounded retry with backoff and rotation
//!
//! # Usage
//!
//! ```ignore
//! let http = SpotifyClient::http_client()?;
//! let rotator = CredentialRotator::new(pool, move |set| SpotifyClient::new(http.clone(), set))?;
//! let resolver = CatalogResolver::new(Arc::new(rotator), RetryPolicy::default());
//!
//! let tracks = resolver.resolve(&CatalogQuery::new("Pushpa", "telugu", 2021)).await;
//! ```

pub mod domain;
pub mod resolver;
pub mod rotator;
pub mod spotify;
pub mod traits;

pub use domain::{AlbumMatch, AlbumTrack, EnrichmentError, Stage};
pub use resolver::{CatalogResolver, RetryPolicy};
pub use rotator::{ClientHandle, CredentialRotator, CredentialSet, RotatorError};
pub use spotify::SpotifyClient;
pub use traits::{CatalogSearchApi, MediaDownloader, MediaSearchStrategy};
