//! Record store summary.

use crate::config::Config;
use crate::store::RecordStore;

/// Show how many records are stored and how they are partitioned.
///
/// Read-only: a store that does not exist yet is reported as empty.
pub fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let combined = &config.storage.combined_store;
    let partition_dir = &config.storage.partition_dir;
    let status = RecordStore::inspect(combined, partition_dir)?;

    println!("Record Store");
    println!("============");
    println!("Combined store: {:?}", combined);
    if !combined.exists() {
        println!("                (not created yet)");
    }
    println!("Processed:      {}", status.processed);
    println!();

    if status.partitions.is_empty() {
        println!("No partition files in {:?}", partition_dir);
        return Ok(());
    }

    println!("Partitions ({:?}):", partition_dir);
    for (name, rows) in &status.partitions {
        println!("  {:<24} {:>6}", name, rows);
    }
    Ok(())
}
