//! Tempo estimation from an onset-strength envelope.
//!
//! The envelope is the positive first difference of the log-mel spectrogram,
//! averaged over mel bands. Its autocorrelation (up to 8 seconds of lag) is
//! weighted by a log-normal prior centred on 120 BPM with a one-octave
//! standard deviation, and the best-scoring lag becomes the tempo.

const START_BPM: f64 = 120.0;
const STD_OCTAVES: f64 = 1.0;
const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 320.0;
const MAX_LAG_SECS: f64 = 8.0;

/// Onset strength per frame (frame 0 is always 0).
pub fn onset_envelope(log_mel: &[Vec<f64>]) -> Vec<f64> {
    let mut envelope = Vec::with_capacity(log_mel.len());
    if log_mel.is_empty() {
        return envelope;
    }
    envelope.push(0.0);
    for pair in log_mel.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let bands = cur.len().max(1) as f64;
        let rise: f64 = cur.iter().zip(prev).map(|(c, p)| (c - p).max(0.0)).sum();
        envelope.push(rise / bands);
    }
    envelope
}

/// Estimated tempo in BPM, or 0 when the envelope has no periodic structure.
pub fn estimate_tempo(envelope: &[f64], sample_rate: u32, hop: usize) -> f64 {
    if envelope.len() < 3 || sample_rate == 0 || hop == 0 {
        return 0.0;
    }
    let frame_rate = sample_rate as f64 / hop as f64;

    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    let centred: Vec<f64> = envelope.iter().map(|v| v - mean).collect();
    let energy: f64 = centred.iter().map(|v| v * v).sum();
    if energy <= 1e-12 {
        return 0.0;
    }

    let lag_for = |bpm: f64| 60.0 * frame_rate / bpm;
    let min_lag = (lag_for(MAX_BPM).ceil() as usize).max(1);
    let max_lag = (lag_for(MIN_BPM).floor() as usize)
        .min((MAX_LAG_SECS * frame_rate).round() as usize)
        .min(centred.len() - 1);

    let mut best: Option<(f64, usize)> = None;
    for lag in min_lag..=max_lag {
        let ac: f64 = centred[..centred.len() - lag]
            .iter()
            .zip(&centred[lag..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / energy;
        if ac <= 0.0 {
            continue;
        }
        let bpm = 60.0 * frame_rate / lag as f64;
        let prior = (-0.5 * ((bpm / START_BPM).log2() / STD_OCTAVES).powi(2)).exp();
        let score = ac * prior;
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, lag));
        }
    }

    best.map_or(0.0, |(_, lag)| 60.0 * frame_rate / lag as f64)
}
