//! Secondary media search through a headless browser.
//!
//! Loads the YouTube results page with `--dump-dom` and takes the first
//! `/watch?v=` link. The browser process is the "session": it is killed once
//! the DOM is read, on timeout, and (via `kill_on_drop`) if the future is
//! dropped mid-search.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::enrichment::{EnrichmentError, MediaSearchStrategy};
use crate::model::MediaLocator;

const RESULTS_URL: &str = "https://www.youtube.com/results?search_query=";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const VIDEO_ID_LEN: usize = 11;

pub struct HeadlessBrowserSearch {
    browser: PathBuf,
    timeout: Duration,
}

impl HeadlessBrowserSearch {
    pub fn new(browser: PathBuf) -> Self {
        Self {
            browser,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn dump_dom(&self, url: &str) -> Result<String, EnrichmentError> {
        let mut child = Command::new(&self.browser)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--mute-audio",
                "--dump-dom",
            ])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EnrichmentError::ToolMissing(self.browser.display().to_string())
                } else {
                    EnrichmentError::Network(format!("Failed to start browser: {}", e))
                }
            })?;

        let mut dom = String::new();
        let read = match child.stdout.take() {
            Some(mut stdout) => tokio::time::timeout(self.timeout, stdout.read_to_string(&mut dom))
                .await
                .map_err(|_| EnrichmentError::Network("browser timed out".to_string()))
                .and_then(|r| r.map_err(|e| EnrichmentError::Network(e.to_string()))),
            None => Err(EnrichmentError::Network("browser stdout unavailable".to_string())),
        };

        // Close the session on every path before returning
        if let Err(e) = child.kill().await {
            tracing::debug!("Browser already exited: {}", e);
        }

        read.map(|_| dom)
    }
}

#[async_trait]
impl MediaSearchStrategy for HeadlessBrowserSearch {
    fn name(&self) -> &str {
        "headless-browser"
    }

    async fn find_media(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<MediaLocator>, EnrichmentError> {
        let query = format!("{} {} audio", title, artist);
        let url = format!("{}{}", RESULTS_URL, urlencoding::encode(&query));
        let dom = self.dump_dom(&url).await?;

        Ok(first_video_id(&dom).map(|id| MediaLocator::page(format!("{}{}", WATCH_URL, id))))
    }
}

/// First well-formed video ID linked from a results page
fn first_video_id(dom: &str) -> Option<&str> {
    dom.match_indices("/watch?v=").find_map(|(pos, marker)| {
        let rest = &dom[pos + marker.len()..];
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
            .count();
        (len == VIDEO_ID_LEN).then(|| &rest[..len])
    })
}
