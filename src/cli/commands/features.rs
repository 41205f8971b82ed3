//! Descriptor extraction for a local file.

use std::path::Path;

use crate::acquire::{PCM_SAMPLE_RATE, decode_file};
use crate::features::FeatureExtractor;
use crate::store::COLUMNS;

/// Decode a local audio file and print its descriptor vector
pub fn cmd_features(path: &Path) -> anyhow::Result<()> {
    println!("Analysing: {:?}", path);

    let waveform = decode_file(path, PCM_SAMPLE_RATE)?;
    println!(
        "Decoded {:.1}s at {} Hz",
        waveform.duration_secs(),
        waveform.sample_rate
    );
    println!();

    let features = FeatureExtractor::default().extract(&waveform)?;

    // Descriptor columns, labelled with the store's column names
    let labels = &COLUMNS[6..13];
    for (label, value) in labels.iter().zip(features.values()) {
        match value {
            Some(v) => println!("  {:<17} {:.6}", label, v),
            None => println!("  {:<17} (absent)", label),
        }
    }
    Ok(())
}
