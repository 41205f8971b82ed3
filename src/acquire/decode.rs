//! Whole-file decoding to a mono waveform using symphonia.
//!
//! Every channel is averaged into one, and the result is resampled with
//! rubato when the file is not already at the analysis rate. Blocking: run it
//! on the blocking pool.

use std::fs::File;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::enrichment::EnrichmentError;
use crate::model::Waveform;

const RESAMPLE_CHUNK: usize = 1024;

/// Decode an audio file into mono samples at `target_rate`.
pub fn decode_file(path: &Path, target_rate: u32) -> Result<Waveform, EnrichmentError> {
    let file = File::open(path)
        .map_err(|e| EnrichmentError::Decode(format!("{}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| EnrichmentError::Decode(format!("Unsupported format: {}", e)))?;
    let mut reader = probed.format;

    // Find the first audio track
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EnrichmentError::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| EnrichmentError::Decode("Unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| EnrichmentError::Decode(e.to_string()))?;

    let mut mono = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break; // End of stream
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(EnrichmentError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => downmix_into(&decoded, &mut mono),
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("Skipping bad frame in {}: {}", path.display(), e);
            }
            Err(e) => return Err(EnrichmentError::Decode(e.to_string())),
        }
    }

    if mono.is_empty() {
        return Err(EnrichmentError::Decode(format!(
            "{}: no audio decoded",
            path.display()
        )));
    }

    let samples = if source_rate == target_rate {
        mono
    } else {
        tracing::debug!(from = source_rate, to = target_rate, "Resampling decoded audio");
        resample(&mono, source_rate, target_rate)?
    };

    Ok(Waveform {
        samples,
        sample_rate: target_rate,
    })
}

/// Average every channel of a decoded buffer into `out`.
fn downmix_into(buffer: &AudioBufferRef, out: &mut Vec<f32>) {
    match buffer {
        AudioBufferRef::F32(buf) => mix_planes(buf.planes().planes(), |s| s, out),
        AudioBufferRef::F64(buf) => mix_planes(buf.planes().planes(), |s| s as f32, out),
        AudioBufferRef::S16(buf) => mix_planes(buf.planes().planes(), |s| s as f32 / 32768.0, out),
        AudioBufferRef::S24(buf) => {
            mix_planes(buf.planes().planes(), |s| s.inner() as f32 / 8388608.0, out)
        }
        AudioBufferRef::S32(buf) => {
            mix_planes(buf.planes().planes(), |s| s as f32 / 2147483648.0, out)
        }
        AudioBufferRef::U8(buf) => {
            mix_planes(buf.planes().planes(), |s| (s as f32 - 128.0) / 128.0, out)
        }
        _ => {}
    }
}

fn mix_planes<S: Copy>(planes: &[&[S]], to_f32: impl Fn(S) -> f32, out: &mut Vec<f32>) {
    let Some(first) = planes.first() else {
        return;
    };
    let scale = 1.0 / planes.len() as f32;
    out.reserve(first.len());
    for frame in 0..first.len() {
        let sum: f32 = planes.iter().map(|plane| to_f32(plane[frame])).sum();
        out.push(sum * scale);
    }
}

/// Resample a whole mono signal.
fn resample(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>, EnrichmentError> {
    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
        .map_err(|e| EnrichmentError::Decode(format!("Resampler setup failed: {}", e)))?;

    let expected = (input.len() as f64 * to as f64 / from as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    // Zero-pad the tail so the filter delay is flushed too
    let padded_len = input.len() + RESAMPLE_CHUNK * 2;
    let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];
    let mut pos = 0;
    while pos < padded_len && output.len() < expected + delay {
        for (i, slot) in chunk.iter_mut().enumerate() {
            *slot = input.get(pos + i).copied().unwrap_or(0.0);
        }
        let resampled = resampler
            .process(&[&chunk[..]], None)
            .map_err(|e| EnrichmentError::Decode(format!("Resampling failed: {}", e)))?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
        pos += RESAMPLE_CHUNK;
    }

    Ok(output.into_iter().skip(delay).take(expected).collect())
}
