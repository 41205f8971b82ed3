//! Soundtrack Enricher - audio descriptors for movie soundtracks.
//!
//! Reads per-language movie catalogs, resolves each title's soundtrack album
//! through a catalog search service, finds and downloads a playable source for
//! every track, computes a 7-value descriptor vector and appends the result to
//! a combined CSV store plus (language, year) partition files.

pub mod acquire;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod features;
pub mod locator;
pub mod model;
pub mod pipeline;
pub mod store;
#[cfg(test)]
pub mod test_utils;
pub mod tools;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("soundtrack_enricher=info".parse()?))
        .init();

    if !cli::run_command(&args)? {
        // No command specified
        cli::Cli::command().print_help()?;
    }
    Ok(())
}
