//! Media download and transcoding through external tools.
//!
//! - Page locators: `yt-dlp -f bestaudio/best` straight to the requested path
//! - Direct audio: streamed with reqwest
//! - Transcode: `ffmpeg -vn -acodec pcm_s16le -ar 22050 -ac 1`

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::ToolsConfig;
use crate::enrichment::{EnrichmentError, MediaDownloader};
use crate::model::{LocatorKind, MediaLocator};

/// Canonical PCM rate produced by the transcoder
pub const PCM_SAMPLE_RATE: u32 = 22_050;

pub struct ToolDownloader {
    yt_dlp: PathBuf,
    ffmpeg: PathBuf,
    cookies_file: Option<PathBuf>,
    http_client: reqwest::Client,
}

impl ToolDownloader {
    pub fn new(tools: &ToolsConfig, http_client: reqwest::Client) -> Self {
        Self {
            yt_dlp: tools.yt_dlp.clone(),
            ffmpeg: tools.ffmpeg.clone(),
            cookies_file: tools.cookies_file.clone(),
            http_client,
        }
    }

    async fn download_page(&self, url: &str, dest: &Path) -> Result<(), EnrichmentError> {
        let mut cmd = Command::new(&self.yt_dlp);
        cmd.args(["-f", "bestaudio/best", "--no-playlist", "--quiet", "--no-warnings"])
            .arg("--force-overwrites");
        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg("-o").arg(dest).arg(url);

        run_tool(cmd, &self.yt_dlp, EnrichmentError::Download).await?;

        if !dest.exists() {
            return Err(EnrichmentError::Download(format!(
                "yt-dlp finished without writing {}",
                dest.display()
            )));
        }
        Ok(())
    }

    async fn download_direct(&self, url: &str, dest: &Path) -> Result<(), EnrichmentError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Download(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| EnrichmentError::Download(format!("{}: {}", dest.display(), e)))?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| EnrichmentError::Download(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| EnrichmentError::Download(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| EnrichmentError::Download(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl MediaDownloader for ToolDownloader {
    async fn download(&self, locator: &MediaLocator, dest: &Path) -> Result<(), EnrichmentError> {
        match locator.kind {
            LocatorKind::Page => self.download_page(&locator.url, dest).await,
            LocatorKind::DirectAudio => self.download_direct(&locator.url, dest).await,
        }
    }

    async fn transcode(&self, source: &Path, dest: &Path) -> Result<(), EnrichmentError> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(source)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar"])
            .arg(PCM_SAMPLE_RATE.to_string())
            .args(["-ac", "1"])
            .arg(dest);

        run_tool(cmd, &self.ffmpeg, EnrichmentError::Transcode).await
    }
}

/// Run a tool to completion, mapping failures with `on_failure`.
async fn run_tool(
    mut cmd: Command,
    program: &Path,
    on_failure: fn(String) -> EnrichmentError,
) -> Result<(), EnrichmentError> {
    let output = cmd
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EnrichmentError::ToolMissing(program.display().to_string())
            } else {
                on_failure(format!("Failed to run {}: {}", program.display(), e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(on_failure(format!(
            "{} failed: {}",
            program.display(),
            stderr.trim()
        )));
    }
    Ok(())
}
