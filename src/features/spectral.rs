//! Frequency-domain analysis: STFT, mel/MFCC, chroma and spectral contrast.
//!
//! Conventions match the usual MIR toolchain defaults so stored values stay
//! comparable: periodic Hann window, centred frames padded with zeros, Slaney
//! mel scale with Slaney area normalisation, power-to-dB with an 80 dB floor
//! below the peak, and an orthonormal DCT-II for the cepstrum.

use std::f64::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::enrichment::EnrichmentError;

/// Floor applied before taking logarithms
const AMIN: f64 = 1e-10;

/// Short-time Fourier transform producing power spectra.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        // Periodic Hann window
        let window = (0..n_fft)
            .map(|i| {
                let x = std::f32::consts::PI * 2.0 * i as f32 / n_fft as f32;
                0.5 * (1.0 - x.cos())
            })
            .collect();

        Self {
            n_fft,
            hop,
            fft,
            window,
        }
    }

    /// Number of frequency bins per frame.
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Power spectrogram, one `bins()`-long row per frame.
    pub fn power(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>, EnrichmentError> {
        let pad = (self.n_fft / 2) as isize;
        let frames = 1 + samples.len() / self.hop;

        let mut input = self.fft.make_input_vec();
        let mut output = self.fft.make_output_vec();
        let mut scratch = self.fft.make_scratch_vec();
        let mut spectrogram = Vec::with_capacity(frames);

        for frame in 0..frames {
            let start = (frame * self.hop) as isize - pad;
            for (i, slot) in input.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 {
                    samples.get(idx as usize).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                *slot = sample * self.window[i];
            }

            self.fft
                .process_with_scratch(&mut input, &mut output, &mut scratch)
                .map_err(|e| EnrichmentError::Extraction(format!("FFT failed: {}", e)))?;

            spectrogram.push(output.iter().map(|c| c.norm_sqr()).collect());
        }

        Ok(spectrogram)
    }
}

/// Convert power values to dB in place, flooring at `top_db` below the peak.
pub fn power_to_db(values: &mut [f64], top_db: f64) {
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
    }
    let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let floor = peak - top_db;
    for v in values.iter_mut() {
        if *v < floor {
            *v = floor;
        }
    }
}

// ============================================================================
// Mel scale and MFCC
// ============================================================================

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_logstep() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_logstep()
    } else {
        hz / MEL_F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_logstep() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        MEL_F_SP * mel
    }
}

/// One triangular filter, stored from its first non-zero bin.
#[derive(Debug, Clone)]
pub struct MelFilter {
    start: usize,
    weights: Vec<f32>,
}

impl MelFilter {
    fn apply(&self, power: &[f32]) -> f64 {
        self.weights
            .iter()
            .zip(&power[self.start..])
            .map(|(w, p)| (*w as f64) * (*p as f64))
            .sum()
    }
}

/// Slaney-normalised triangular mel filterbank spanning 0 Hz to Nyquist.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<MelFilter> {
    let sr = sample_rate as f64;
    let bins = n_fft / 2 + 1;
    let max_mel = hz_to_mel(sr / 2.0);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, centre, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let enorm = 2.0 / (hi - lo);
            let dense: Vec<f32> = (0..bins)
                .map(|k| {
                    let f = k as f64 * sr / n_fft as f64;
                    let lower = (f - lo) / (centre - lo);
                    let upper = (hi - f) / (hi - centre);
                    (lower.min(upper).max(0.0) * enorm) as f32
                })
                .collect();
            let start = dense.iter().position(|w| *w > 0.0).unwrap_or(bins);
            let end = dense.iter().rposition(|w| *w > 0.0).map_or(start, |i| i + 1);
            MelFilter {
                start,
                weights: dense[start..end].to_vec(),
            }
        })
        .collect()
}

/// Mel spectrogram in dB (frames x mels), floored 80 dB below its peak.
pub fn log_mel_spectrogram(power: &[Vec<f32>], filters: &[MelFilter]) -> Vec<Vec<f64>> {
    let mut flat: Vec<f64> = power
        .iter()
        .flat_map(|frame| filters.iter().map(move |f| f.apply(frame)))
        .collect();
    power_to_db(&mut flat, 80.0);
    flat.chunks(filters.len().max(1)).map(<[f64]>::to_vec).collect()
}

/// Orthonormal DCT-II basis, `n_out` rows of length `n_in`.
fn dct_basis(n_in: usize, n_out: usize) -> Vec<Vec<f64>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

/// Mean of each of the first `n_mfcc` cepstral coefficients over all frames.
pub fn mfcc_means(log_mel: &[Vec<f64>], n_mfcc: usize) -> Vec<f64> {
    let Some(first) = log_mel.first() else {
        return vec![f64::NAN; n_mfcc];
    };
    let basis = dct_basis(first.len(), n_mfcc);
    let mut sums = vec![0.0; n_mfcc];
    for frame in log_mel {
        for (sum, row) in sums.iter_mut().zip(&basis) {
            *sum += row.iter().zip(frame).map(|(b, x)| b * x).sum::<f64>();
        }
    }
    let frames = log_mel.len() as f64;
    sums.into_iter().map(|s| s / frames).collect()
}

// ============================================================================
// Chroma
// ============================================================================

const N_CHROMA: usize = 12;

/// Chroma filterbank (12 x bins), pitch class 0 = C.
///
/// Each FFT bin spreads over nearby pitch classes with a Gaussian, and bins
/// are weighted by a Gaussian over octaves centred on octave 5 (2 octaves wide).
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize) -> Vec<Vec<f32>> {
    let sr = sample_rate as f64;
    let n_chroma = N_CHROMA as f64;
    let a440_base = 440.0 / 16.0;

    // Fractional chroma bin for every FFT bin; DC borrows a value 1.5 octaves below bin 1
    let mut frqbins: Vec<f64> = (1..n_fft)
        .map(|k| n_chroma * (k as f64 * sr / n_fft as f64 / a440_base).log2())
        .collect();
    let dc = frqbins.first().copied().unwrap_or(0.0) - 1.5 * n_chroma;
    frqbins.insert(0, dc);

    let binwidth: Vec<f64> = frqbins
        .windows(2)
        .map(|w| (w[1] - w[0]).max(1.0))
        .chain(std::iter::once(1.0))
        .collect();

    let half = (n_chroma / 2.0).round();
    let mut weights = vec![vec![0.0f64; n_fft]; N_CHROMA];
    for (j, (&fb, &width)) in frqbins.iter().zip(&binwidth).enumerate() {
        for (c, row) in weights.iter_mut().enumerate() {
            let d = (fb - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            row[j] = (-0.5 * (2.0 * d / width).powi(2)).exp();
        }
        // Unit L2 norm across pitch classes
        let norm = weights.iter().map(|row| row[j] * row[j]).sum::<f64>().sqrt();
        let octave = (-0.5 * ((fb / n_chroma - 5.0) / 2.0).powi(2)).exp();
        for row in weights.iter_mut() {
            if norm > 0.0 {
                row[j] /= norm;
            }
            row[j] *= octave;
        }
    }

    // Rotate so that row 0 is C rather than A
    let bins = n_fft / 2 + 1;
    (0..N_CHROMA)
        .map(|c| {
            weights[(c + 3) % N_CHROMA][..bins]
                .iter()
                .map(|w| *w as f32)
                .collect()
        })
        .collect()
}

/// Per-frame chroma vector, normalised so its largest value is 1.
pub fn chroma_frame(power: &[f32], filters: &[Vec<f32>]) -> [f64; N_CHROMA] {
    let mut chroma = [0.0f64; N_CHROMA];
    for (value, filter) in chroma.iter_mut().zip(filters) {
        *value = filter
            .iter()
            .zip(power)
            .map(|(w, p)| (*w as f64) * (*p as f64))
            .sum();
    }
    let peak = chroma.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if peak > f64::from(f32::MIN_POSITIVE) {
        for v in chroma.iter_mut() {
            *v /= peak;
        }
    }
    chroma
}

/// Mean chroma energy over all pitch classes and frames.
pub fn chroma_mean(power: &[Vec<f32>], filters: &[Vec<f32>]) -> f64 {
    if power.is_empty() {
        return f64::NAN;
    }
    let total: f64 = power
        .iter()
        .map(|frame| chroma_frame(frame, filters).iter().sum::<f64>())
        .sum();
    total / (power.len() * N_CHROMA) as f64
}

// ============================================================================
// Spectral contrast
// ============================================================================

/// Bin range of one octave band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContrastBand {
    start: usize,
    end: usize,
    /// Number of bins averaged for the peak and the valley
    quantile_bins: usize,
}

/// Octave bands starting at `fmin`: `[0, fmin]`, then `n_bands` octaves, the
/// last one extended to Nyquist.
pub fn contrast_bands(
    sample_rate: u32,
    n_fft: usize,
    fmin: f64,
    n_bands: usize,
    quantile: f64,
) -> Vec<ContrastBand> {
    let bins = n_fft / 2 + 1;
    let freq = |k: usize| k as f64 * sample_rate as f64 / n_fft as f64;

    let mut edges = vec![0.0];
    edges.extend((0..=n_bands).map(|i| fmin * 2f64.powi(i as i32)));

    let mut bands = Vec::with_capacity(n_bands + 1);
    for k in 0..=n_bands {
        let (lo, hi) = (edges[k], edges[k + 1]);
        let Some(first) = (0..bins).find(|&b| freq(b) >= lo && freq(b) <= hi) else {
            continue;
        };
        let last = (0..bins)
            .rev()
            .find(|&b| freq(b) >= lo && freq(b) <= hi)
            .unwrap_or(first);

        let start = if k > 0 { first.saturating_sub(1) } else { first };
        let end = if k == n_bands { bins } else { last + 1 };
        let members = end - start;
        let quantile_bins = ((quantile * members as f64).round_ties_even() as usize).max(1);
        // Every band but the last drops its top bin
        let end = if k < n_bands { end - 1 } else { end };
        if end <= start {
            continue;
        }
        bands.push(ContrastBand {
            start,
            end,
            quantile_bins: quantile_bins.min(end - start),
        });
    }
    bands
}

/// Mean spectral contrast in dB over all bands and frames.
pub fn contrast_mean(power: &[Vec<f32>], bands: &[ContrastBand]) -> f64 {
    if power.is_empty() || bands.is_empty() {
        return f64::NAN;
    }

    let mut peaks = Vec::with_capacity(power.len() * bands.len());
    let mut valleys = Vec::with_capacity(power.len() * bands.len());
    let mut sorted = Vec::new();

    for frame in power {
        for band in bands {
            sorted.clear();
            sorted.extend(frame[band.start..band.end].iter().map(|p| (*p as f64).sqrt()));
            sorted.sort_by(f64::total_cmp);
            let q = band.quantile_bins;
            valleys.push(sorted[..q].iter().sum::<f64>() / q as f64);
            peaks.push(sorted[sorted.len() - q..].iter().sum::<f64>() / q as f64);
        }
    }

    power_to_db(&mut peaks, 80.0);
    power_to_db(&mut valleys, 80.0);
    let total: f64 = peaks.iter().zip(&valleys).map(|(p, v)| p - v).sum();
    total / peaks.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sine;

    const SR: u32 = 22_050;
    const N_FFT: usize = 2048;

    #[test]
    fn test_mel_scale_roundtrip() {
        for hz in [0.0, 200.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_stft_frame_count_and_peak_bin() {
        let stft = Stft::new(N_FFT, 512);
        let tone = sine(1000.0, 1.0, SR);
        let spec = stft.power(&tone).unwrap();

        assert_eq!(spec.len(), 1 + tone.len() / 512);
        assert_eq!(spec[0].len(), stft.bins());

        let mid = &spec[spec.len() / 2];
        let peak_bin = (0..mid.len())
            .max_by(|&a, &b| mid[a].total_cmp(&mid[b]))
            .unwrap();
        let expected = (1000.0 * N_FFT as f64 / SR as f64).round() as usize;
        assert!(peak_bin.abs_diff(expected) <= 1);
    }

    #[test]
    fn test_power_to_db_floors_at_top_db() {
        let mut values = vec![1.0, 1e-3, 0.0];
        power_to_db(&mut values, 80.0);
        assert!((values[0] - 0.0).abs() < 1e-9);
        assert!((values[1] + 30.0).abs() < 1e-9);
        assert!((values[2] + 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_mel_filterbank_shape() {
        let filters = mel_filterbank(SR, N_FFT, 128);
        assert_eq!(filters.len(), 128);
        assert!(filters.iter().all(|f| !f.weights.is_empty()));
        assert!(filters.iter().all(|f| f.start + f.weights.len() <= N_FFT / 2 + 1));
    }

    #[test]
    fn test_dct_of_constant_has_only_dc() {
        let log_mel = vec![vec![-100.0; 128]; 3];
        let means = mfcc_means(&log_mel, 20);
        assert!((means[0] - (-100.0 * 128f64.sqrt())).abs() < 1e-6);
        assert!(means[1..].iter().all(|c| c.abs() < 1e-6));
    }

    #[test]
    fn test_chroma_of_a440_peaks_at_a() {
        let stft = Stft::new(N_FFT, 512);
        let filters = chroma_filterbank(SR, N_FFT);
        let spec = stft.power(&sine(440.0, 1.0, SR)).unwrap();

        let chroma = chroma_frame(&spec[spec.len() / 2], &filters);
        let peak = (0..12).max_by(|&a, &b| chroma[a].total_cmp(&chroma[b])).unwrap();
        assert_eq!(peak, 9);
        assert!((chroma[9] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_contrast_bands_cover_spectrum() {
        let bands = contrast_bands(SR, N_FFT, 200.0, 6, 0.02);
        assert_eq!(bands.len(), 7);
        assert_eq!(bands[0].start, 0);
        assert_eq!(bands.last().unwrap().end, N_FFT / 2 + 1);
        assert!(bands.iter().all(|b| b.quantile_bins >= 1));
    }

    #[test]
    fn test_tone_has_more_contrast_than_silence() {
        let stft = Stft::new(N_FFT, 512);
        let bands = contrast_bands(SR, N_FFT, 200.0, 6, 0.02);

        let silence = stft.power(&vec![0.0; SR as usize]).unwrap();
        let tone = stft.power(&sine(440.0, 1.0, SR)).unwrap();

        let flat = contrast_mean(&silence, &bands);
        let peaky = contrast_mean(&tone, &bands);
        assert!(flat.abs() < 1e-9);
        assert!(peaky > flat);
    }
}
