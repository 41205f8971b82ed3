//! Feature extractor - computes the 7-value descriptor vector of a waveform.
//!
//! | Field               | Recipe                                              |
//! |---------------------|-----------------------------------------------------|
//! | `tempo`             | onset-envelope autocorrelation with a 120 BPM prior |
//! | `loudness`          | mean frame RMS                                      |
//! | `pitch_class`       | mean max-normalised chroma                          |
//! | `spectral_contrast` | mean octave-band peak/valley difference (dB)        |
//! | `energy`            | mean of MFCC 0                                      |
//! | `speechiness`       | mean of MFCC 1                                      |
//! | `zero_cross_rate`   | mean frame zero-crossing rate                       |
//!
//! `energy` and `speechiness` are cepstral statistics carried under the column
//! names existing stores use. They are not perceptual energy or speech
//! detection scores.
//!
//! Extraction is CPU bound; the pipeline runs it on the blocking pool.

mod spectral;
mod tempo;
mod time_domain;

use crate::enrichment::EnrichmentError;
use crate::model::{AudioFeatures, Waveform};

use spectral::Stft;

/// Analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// FFT size (and frame length for the time-domain descriptors)
    pub n_fft: usize,
    /// Hop between frames
    pub hop: usize,
    /// Mel bands feeding the cepstrum and the onset envelope
    pub n_mels: usize,
    /// Cepstral coefficients computed
    pub n_mfcc: usize,
    /// Lower edge of the first spectral-contrast octave
    pub contrast_fmin: f64,
    /// Number of spectral-contrast octaves above `contrast_fmin`
    pub contrast_bands: usize,
    /// Fraction of each band averaged for peak/valley
    pub contrast_quantile: f64,
    /// Waveforms shorter than this (seconds) are rejected
    pub min_duration: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop: 512,
            n_mels: 128,
            n_mfcc: 20,
            contrast_fmin: 200.0,
            contrast_bands: 6,
            contrast_quantile: 0.02,
            min_duration: 0.5,
        }
    }
}

/// Computes [`AudioFeatures`] from decoded audio.
pub struct FeatureExtractor {
    config: ExtractorConfig,
    stft: Stft,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let stft = Stft::new(config.n_fft, config.hop);
        Self { config, stft }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Compute the descriptor vector.
    ///
    /// Fails for empty, zero-rate or too-short input. Individual descriptors
    /// that come out NaN or infinite are left absent.
    pub fn extract(&self, wave: &Waveform) -> Result<AudioFeatures, EnrichmentError> {
        if wave.sample_rate == 0 {
            return Err(EnrichmentError::Extraction(
                "sample rate must be positive".to_string(),
            ));
        }
        if wave.samples.is_empty() {
            return Err(EnrichmentError::Extraction("empty waveform".to_string()));
        }
        let duration = wave.duration_secs();
        if duration < self.config.min_duration {
            return Err(EnrichmentError::Extraction(format!(
                "{:.2}s of audio is shorter than the {:.2}s minimum",
                duration, self.config.min_duration
            )));
        }

        let cfg = &self.config;
        let sr = wave.sample_rate;

        let loudness = time_domain::rms_mean(&wave.samples, cfg.n_fft, cfg.hop);
        let zero_cross_rate = time_domain::zero_crossing_rate_mean(&wave.samples, cfg.n_fft, cfg.hop);

        let power = self.stft.power(&wave.samples)?;

        let mel_filters = spectral::mel_filterbank(sr, cfg.n_fft, cfg.n_mels);
        let log_mel = spectral::log_mel_spectrogram(&power, &mel_filters);
        let mfcc = spectral::mfcc_means(&log_mel, cfg.n_mfcc.max(2));

        let envelope = tempo::onset_envelope(&log_mel);
        let tempo = tempo::estimate_tempo(&envelope, sr, cfg.hop);

        let chroma_filters = spectral::chroma_filterbank(sr, cfg.n_fft);
        let pitch_class = spectral::chroma_mean(&power, &chroma_filters);

        let bands = spectral::contrast_bands(
            sr,
            cfg.n_fft,
            cfg.contrast_fmin,
            cfg.contrast_bands,
            cfg.contrast_quantile,
        );
        let spectral_contrast = spectral::contrast_mean(&power, &bands);

        let features = AudioFeatures::from_raw(
            tempo,
            loudness,
            pitch_class,
            spectral_contrast,
            mfcc[0],
            mfcc[1],
            zero_cross_rate,
        );

        tracing::trace!(?features, seconds = duration, "Extracted features");
        Ok(features)
    }
}
