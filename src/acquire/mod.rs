//! Acquisition & decode - turns a media locator into an in-memory waveform.
//!
//! 1. Download the resource to `{scratch}/{name}/{name}.source`
//! 2. Transcode to mono PCM at `{scratch}/{name}/{name}.wav`
//! 3. Decode the PCM file on the blocking pool
//!
//! `{name}` is derived from the track's external ID alone, so concurrent
//! workers never share a directory. The per-track directory is owned by a
//! [`ScratchDir`] guard that removes it, together with any side files the
//! tools left behind (fragments, resume metadata), when `acquire` returns,
//! fails, panics or is cancelled.

mod decode;
mod downloader;

pub use decode::decode_file;
pub use downloader::{PCM_SAMPLE_RATE, ToolDownloader};

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::enrichment::{EnrichmentError, MediaDownloader};
use crate::model::{MediaLocator, Waveform};

/// Scratch file stem for an external ID.
///
/// IDs made only of `[A-Za-z0-9_-]` are used as-is; anything else is
/// hex-encoded behind an `x` prefix, which keeps the mapping injective.
pub fn scratch_name(external_id: &str) -> String {
    let plain = !external_id.is_empty()
        && external_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        && !external_id.starts_with('x');
    if plain {
        return external_id.to_string();
    }
    let mut name = String::with_capacity(1 + external_id.len() * 2);
    name.push('x');
    for b in external_id.bytes() {
        let _ = write!(name, "{:02x}", b);
    }
    name
}

/// Per-track scratch directory, removed with its contents when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Take ownership of `path`. It does not have to exist yet.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::trace!("Removed scratch directory {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove scratch directory {:?}: {}", self.path, e),
        }
    }
}

/// Scratch paths used for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchPaths {
    /// Directory holding every file for this track
    pub dir: PathBuf,
    /// Downloaded resource, whatever its container
    pub raw: PathBuf,
    /// yt-dlp's in-progress download
    pub partial: PathBuf,
    /// Canonical PCM file
    pub pcm: PathBuf,
}

/// Downloads, transcodes and decodes media into waveforms.
pub struct Acquirer {
    scratch_dir: PathBuf,
    downloader: Arc<dyn MediaDownloader>,
    target_rate: u32,
}

impl Acquirer {
    pub fn new(scratch_dir: impl Into<PathBuf>, downloader: Arc<dyn MediaDownloader>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            downloader,
            target_rate: PCM_SAMPLE_RATE,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn scratch_paths(&self, external_id: &str) -> ScratchPaths {
        let name = scratch_name(external_id);
        let dir = self.scratch_dir.join(&name);
        ScratchPaths {
            raw: dir.join(format!("{}.source", name)),
            partial: dir.join(format!("{}.source.part", name)),
            pcm: dir.join(format!("{}.wav", name)),
            dir,
        }
    }

    /// Fetch and decode the audio behind `locator`.
    ///
    /// No scratch file for `external_id` survives this call.
    pub async fn acquire(
        &self,
        external_id: &str,
        locator: &MediaLocator,
    ) -> Result<Waveform, EnrichmentError> {
        let ScratchPaths { dir, raw, pcm, .. } = self.scratch_paths(external_id);
        let scratch = ScratchDir::new(dir);
        tokio::fs::create_dir_all(scratch.path())
            .await
            .map_err(|e| EnrichmentError::Download(format!("{}: {}", scratch.path().display(), e)))?;

        tracing::debug!(external_id, url = %locator, "Downloading");
        self.downloader.download(locator, &raw).await?;

        tracing::debug!(external_id, "Transcoding");
        self.downloader.transcode(&raw, &pcm).await?;

        let target_rate = self.target_rate;
        let waveform = tokio::task::spawn_blocking(move || decode_file(&pcm, target_rate))
            .await
            .map_err(|e| EnrichmentError::Decode(format!("Decode task failed: {}", e)))??;

        drop(scratch);
        tracing::debug!(
            external_id,
            seconds = waveform.duration_secs(),
            "Decoded audio"
        );
        Ok(waveform)
    }
}
