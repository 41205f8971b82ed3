//! Test utilities and fixtures for soundtrack-enricher tests.
//!
//! This module provides common test helpers, mock factories, and
//! record-store utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_store, mock_enriched};
//!
//! #[test]
//! fn test_something() {
//!     let (store, _dir) = temp_store();
//!     store.persist(&mock_enriched("trk-1", "telugu", 2021)).unwrap();
//! }
//! ```

use std::path::Path;

use smallvec::smallvec;
use tempfile::TempDir;

use crate::model::{AudioFeatures, EnrichedRecord, TrackRecord};
use crate::store::RecordStore;

/// Creates a record store in a temporary directory.
///
/// Keep the TempDir alive for the duration of your test.
///
/// ```ignore
/// let (store, dir) = temp_store();
/// // dir.path().join("combined.csv") is the combined store
/// // dir.path().join("partitions") holds the partition files
/// ```
pub fn temp_store() -> (RecordStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let store = RecordStore::open(dir.path().join("combined.csv"), dir.path().join("partitions"))
        .expect("Failed to open test store");
    (store, dir)
}

/// Creates a mock TrackRecord with sensible defaults.
///
/// Customize with struct update syntax:
///
/// ```ignore
/// let custom = TrackRecord {
///     title: "Custom Title".to_string(),
///     ..mock_track("trk-1", "telugu", 2021)
/// };
/// ```
pub fn mock_track(id: &str, language: &str, year: i32) -> TrackRecord {
    TrackRecord {
        external_id: id.to_string(),
        title: format!("Track {}", id),
        artist_names: smallvec!["Test Artist".to_string()],
        album_name: "Test Album".to_string(),
        release_date: format!("{}-01-01", year),
        popularity: 0,
        source_title: "Test Movie".to_string(),
        language: language.to_string(),
        year,
    }
}

/// A descriptor vector with every value present.
pub fn mock_features() -> AudioFeatures {
    AudioFeatures::from_raw(120.0, 0.1, 0.45, 21.5, -250.0, 90.0, 0.04)
}

/// A mock track joined with [`mock_features`].
pub fn mock_enriched(id: &str, language: &str, year: i32) -> EnrichedRecord {
    EnrichedRecord::new(mock_track(id, language, year), mock_features())
}

/// A pure tone.
pub fn sine(freq: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Short decaying noise bursts at a fixed tempo.
pub fn click_track(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    let period = (60.0 / bpm * sample_rate as f32) as usize;
    let click_len = (sample_rate / 100) as usize;
    // Deterministic pseudo-noise so the test signal is broadband
    let mut state: u32 = 0x1234_5678;
    let mut noise = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state as f32 / u32::MAX as f32) * 2.0 - 1.0
    };
    (0..n)
        .map(|i| {
            let pos = i % period;
            if pos < click_len {
                noise() * (1.0 - pos as f32 / click_len as f32)
            } else {
                0.0
            }
        })
        .collect()
}

/// Writes interleaved f32 samples as a 16-bit PCM WAV file.
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()
}

/// Writes a mono sine-wave WAV file.
pub fn write_sine_wav(
    path: &Path,
    freq: f32,
    seconds: f32,
    sample_rate: u32,
) -> Result<(), hound::Error> {
    write_wav(path, &sine(freq, seconds, sample_rate), 1, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_track_defaults() {
        let track = mock_track("trk-1", "telugu", 2021);
        assert_eq!(track.external_id, "trk-1");
        assert_eq!(track.language, "telugu");
        assert_eq!(track.year, 2021);
    }

    #[test]
    fn test_sine_length() {
        assert_eq!(sine(440.0, 1.0, 22_050).len(), 22_050);
    }

    #[test]
    fn test_write_sine_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 440.0, 0.5, 22_050).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.len(), 11_025);
    }
}
