//! Core data models for the enrichment pipeline.
//!
//! Defines the entities that flow through the stages:
//! [`CatalogQuery`] → [`TrackRecord`] → [`MediaLocator`] → [`AudioFeatures`]
//! → [`EnrichedRecord`].
//!
//! All of these are plain values. Records are created once by the stage that
//! owns them and are moved (not shared) into the next stage.

use smallvec::SmallVec;

/// A (title, language, year) tuple identifying a work to enrich.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogQuery {
    /// Movie title as listed in the catalog file
    pub title: String,
    /// Lower-cased language tag (e.g. "telugu")
    pub language: String,
    /// Release year (always >= 1900 once it reaches the pipeline)
    pub release_year: i32,
}

impl CatalogQuery {
    pub fn new(title: impl Into<String>, language: impl Into<String>, release_year: i32) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            release_year,
        }
    }

    /// Free-text key sent to the catalog search service.
    pub fn search_key(&self) -> String {
        format!("{} {} {}", self.title, self.language, self.release_year)
    }
}

impl std::fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.title, self.language, self.release_year)
    }
}

/// Artist credits for a track, in credit order.
pub type ArtistNames = SmallVec<[String; 3]>;

/// Resolved metadata for one audio track of a query's matched album.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    /// Catalog track ID - stable and unique per track
    pub external_id: String,
    /// Track title
    pub title: String,
    /// Credited artists, in order
    pub artist_names: ArtistNames,
    /// Album the track was found on
    pub album_name: String,
    /// Album release date as reported by the catalog (YYYY, YYYY-MM or YYYY-MM-DD)
    pub release_date: String,
    /// Catalog popularity (album listings carry none, so usually 0)
    pub popularity: u32,
    /// Title of the catalog query this track was resolved from
    pub source_title: String,
    /// Language tag of the originating query
    pub language: String,
    /// Year of the originating query
    pub year: i32,
}

impl TrackRecord {
    /// Artist credits joined for display and persistence.
    pub fn artists_joined(&self) -> String {
        self.artist_names.join(", ")
    }

    /// The artist used for media searches (all credits, joined).
    pub fn search_artist(&self) -> String {
        self.artists_joined()
    }
}

/// How a [`MediaLocator`] should be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// A media page that needs an extractor (yt-dlp) to reach the audio stream
    Page,
    /// A URL that serves audio bytes directly (e.g. a preview clip)
    DirectAudio,
}

/// Opaque reference to a playable audio resource.
///
/// Short-lived: produced by the source locator and consumed once by acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocator {
    pub url: String,
    pub kind: LocatorKind,
}

impl MediaLocator {
    pub fn page(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: LocatorKind::Page,
        }
    }

    pub fn direct_audio(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: LocatorKind::DirectAudio,
        }
    }
}

impl std::fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// Decoded mono audio ready for analysis.
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// The fixed 7-value descriptor vector.
///
/// Each value is finite or absent; non-finite computations never make it in here.
/// `energy` and `speechiness` are MFCC coefficient means kept for compatibility
/// with existing stores; they are not validated perceptual measures.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioFeatures {
    /// Tempo estimate in BPM
    pub tempo: Option<f64>,
    /// Mean RMS amplitude
    pub loudness: Option<f64>,
    /// Mean chroma energy
    pub pitch_class: Option<f64>,
    /// Mean spectral contrast (dB)
    pub spectral_contrast: Option<f64>,
    /// Mean of MFCC coefficient 0
    pub energy: Option<f64>,
    /// Mean of MFCC coefficient 1
    pub speechiness: Option<f64>,
    /// Mean zero-crossing rate
    pub zero_cross_rate: Option<f64>,
}

impl AudioFeatures {
    /// Build from raw values, dropping any that are NaN or infinite.
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw(
        tempo: f64,
        loudness: f64,
        pitch_class: f64,
        spectral_contrast: f64,
        energy: f64,
        speechiness: f64,
        zero_cross_rate: f64,
    ) -> Self {
        Self {
            tempo: finite(tempo),
            loudness: finite(loudness),
            pitch_class: finite(pitch_class),
            spectral_contrast: finite(spectral_contrast),
            energy: finite(energy),
            speechiness: finite(speechiness),
            zero_cross_rate: finite(zero_cross_rate),
        }
    }

    /// Descriptors in persisted column order.
    pub fn values(&self) -> [Option<f64>; 7] {
        [
            self.tempo,
            self.loudness,
            self.pitch_class,
            self.spectral_contrast,
            self.energy,
            self.speechiness,
            self.zero_cross_rate,
        ]
    }

    /// True when every descriptor is absent.
    pub fn is_empty(&self) -> bool {
        self.values().iter().all(Option::is_none)
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// A track record joined with its descriptors. Written once, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub track: TrackRecord,
    pub features: AudioFeatures,
}

impl EnrichedRecord {
    pub fn new(track: TrackRecord, features: AudioFeatures) -> Self {
        Self { track, features }
    }

    pub fn external_id(&self) -> &str {
        &self.track.external_id
    }
}
