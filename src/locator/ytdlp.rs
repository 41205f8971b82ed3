//! Primary media search through yt-dlp's `ytsearch` extractor.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::enrichment::{EnrichmentError, MediaSearchStrategy};
use crate::model::MediaLocator;

pub struct YtDlpSearch {
    program: PathBuf,
    cookies_file: Option<PathBuf>,
}

impl YtDlpSearch {
    pub fn new(program: PathBuf, cookies_file: Option<PathBuf>) -> Self {
        Self {
            program,
            cookies_file,
        }
    }

    fn search_term(title: &str, artist: &str) -> String {
        format!("ytsearch1:{} {} official audio", title, artist)
    }
}

#[async_trait]
impl MediaSearchStrategy for YtDlpSearch {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn find_media(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<MediaLocator>, EnrichmentError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--flat-playlist")
            .arg("--no-warnings")
            .args(["--print", "url"]);
        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(Self::search_term(title, artist))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EnrichmentError::ToolMissing(self.program.display().to_string())
            } else {
                EnrichmentError::Network(format!("Failed to run yt-dlp: {}", e))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichmentError::Network(format!(
                "yt-dlp search failed: {}",
                stderr.trim()
            )));
        }

        Ok(parse_first_url(&String::from_utf8_lossy(&output.stdout)).map(MediaLocator::page))
    }
}

/// First `http(s)` line of yt-dlp's `--print url` output
fn parse_first_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("https://") || line.starts_with("http://"))
        .map(String::from)
}
