//! Source locator - finds a playable media source for a track.
//!
//! Strategies are tried in order and the first hit wins:
//! 1. [`YtDlpSearch`] - yt-dlp's built-in search
//! 2. [`HeadlessBrowserSearch`] - results page scraped through a headless browser
//! 3. [`CatalogPreviewSearch`] - the catalog's own preview clip
//!
//! A strategy that errors is logged and treated like a miss. No retries happen
//! here; an item nobody can locate is skipped by the caller.

mod browser;
mod preview;
mod ytdlp;

pub use browser::HeadlessBrowserSearch;
pub use preview::CatalogPreviewSearch;
pub use ytdlp::YtDlpSearch;

use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::enrichment::{CatalogSearchApi, CredentialRotator, MediaSearchStrategy};
use crate::model::MediaLocator;

/// Ordered fallback chain of media search strategies
#[derive(Clone)]
pub struct SourceLocator {
    strategies: Vec<Arc<dyn MediaSearchStrategy>>,
}

impl SourceLocator {
    pub fn new(strategies: Vec<Arc<dyn MediaSearchStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard chain: yt-dlp search, headless browser, catalog preview
    pub fn standard<C>(tools: &ToolsConfig, rotator: Arc<CredentialRotator<C>>) -> Self
    where
        C: CatalogSearchApi + 'static,
    {
        let primary: Arc<dyn MediaSearchStrategy> = Arc::new(YtDlpSearch::new(
            tools.yt_dlp.clone(),
            tools.cookies_file.clone(),
        ));
        let mut strategies = vec![primary];

        match crate::tools::find_browser(tools.browser.as_deref()) {
            Some(browser) => strategies.push(Arc::new(HeadlessBrowserSearch::new(browser))),
            None => tracing::warn!("No headless browser found, browser search disabled"),
        }

        strategies.push(Arc::new(CatalogPreviewSearch::new(rotator)));
        Self::new(strategies)
    }

    /// Names of the strategies, in the order they are tried
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Find a media source for (title, artist), or `None` if every strategy misses
    pub async fn locate(&self, title: &str, artist: &str) -> Option<MediaLocator> {
        for strategy in &self.strategies {
            match strategy.find_media(title, artist).await {
                Ok(Some(locator)) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        title,
                        url = %locator,
                        "Media source found"
                    );
                    return Some(locator);
                }
                Ok(None) => {
                    tracing::debug!(strategy = strategy.name(), title, "No media source");
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), title, "Media search failed: {}", e);
                }
            }
        }

        tracing::info!(title, artist, "No media source from any strategy");
        None
    }
}
