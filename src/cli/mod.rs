//! Command-line interface for soundtrack-enricher.
//!
//! This module provides CLI commands for running the enrichment pipeline,
//! checking individual stages by hand, and inspecting the record store.

mod commands;

pub use commands::{Cli, Commands, run_command};
