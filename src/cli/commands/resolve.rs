//! Catalog resolution for a single title.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::config::Config;
use crate::enrichment::{CatalogResolver, CredentialRotator, EnrichmentError, SpotifyClient};
use crate::model::CatalogQuery;

/// Resolve one (title, language, year) and list the tracks found
pub fn cmd_resolve(
    rt: &Runtime,
    config: &Config,
    title: &str,
    language: &str,
    year: i32,
) -> anyhow::Result<()> {
    config.validate()?;

    rt.block_on(async {
        let http = SpotifyClient::http_client()?;
        let rotator = CredentialRotator::new(config.credential_pool(), move |set| {
            SpotifyClient::new(http.clone(), set)
        })?;
        let resolver = CatalogResolver::new(Arc::new(rotator), config.retry_policy());

        let query = CatalogQuery::new(title, language.to_lowercase(), year);
        println!("Resolving: {}", query);
        println!();

        match resolver.try_resolve(&query).await {
            Ok(tracks) => {
                let Some(first) = tracks.first() else {
                    println!("Album found but it lists no tracks.");
                    return Ok(());
                };
                println!("✓ {} ({})", first.album_name, first.release_date);
                for track in &tracks {
                    println!("  {}  {} - {}", track.external_id, track.title, track.artists_joined());
                }
                println!();
                println!("{} tracks", tracks.len());
            }
            Err(EnrichmentError::NoMatches) => {
                println!("✗ No album match");
            }
            Err(e) => {
                println!("✗ Resolution failed: {}", e);
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
