//! Frame-wise time-domain descriptors.
//!
//! Frames are centred: frame `i` covers samples `[i*hop - frame/2, i*hop + frame/2)`.

/// Values at or below this magnitude count as zero (and zero counts as positive).
const ZCR_THRESHOLD: f32 = 1e-10;

fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

/// Mean of the per-frame RMS amplitude (zero padded at both ends).
pub fn rms_mean(samples: &[f32], frame_len: usize, hop: usize) -> f64 {
    if samples.is_empty() || frame_len == 0 || hop == 0 {
        return f64::NAN;
    }
    let half = frame_len / 2;
    let frames = frame_count(samples.len(), hop);

    let total: f64 = (0..frames)
        .map(|f| {
            let centre = f * hop;
            let start = centre.saturating_sub(half);
            let end = (centre + frame_len - half).min(samples.len());
            let energy: f64 = samples[start.min(end)..end]
                .iter()
                .map(|&s| (s as f64) * (s as f64))
                .sum();
            (energy / frame_len as f64).sqrt()
        })
        .sum();

    total / frames as f64
}

/// Mean of the per-frame zero-crossing rate (edge padded at both ends).
pub fn zero_crossing_rate_mean(samples: &[f32], frame_len: usize, hop: usize) -> f64 {
    if samples.is_empty() || frame_len == 0 || hop == 0 {
        return f64::NAN;
    }
    let half = frame_len as isize / 2;
    let last = samples.len() as isize - 1;
    let positive = |idx: isize| {
        let s = samples[idx.clamp(0, last) as usize];
        s.abs() <= ZCR_THRESHOLD || s > 0.0
    };
    let frames = frame_count(samples.len(), hop);

    let total: f64 = (0..frames)
        .map(|f| {
            let start = (f * hop) as isize - half;
            let crossings = (start + 1..start + frame_len as isize)
                .filter(|&i| positive(i) != positive(i - 1))
                .count();
            crossings as f64 / frame_len as f64
        })
        .sum();

    total / frames as f64
}
