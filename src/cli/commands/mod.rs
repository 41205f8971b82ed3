//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `run`: the full enrichment pipeline over the configured catalogs
//! - `resolve`: catalog resolution for a single title
//! - `features`: descriptor extraction for a local audio file
//! - `tools`: external tool checks and config initialisation
//! - `status`: record store summary

mod features;
mod resolve;
mod run;
mod status;
mod tools;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::{self, Config};

pub use features::cmd_features;
pub use resolve::cmd_resolve;
pub use run::cmd_run;
pub use status::cmd_status;
pub use tools::{cmd_check_tools, cmd_init};

/// Soundtrack Enricher CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/soundtrack-enricher/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog credentials as id:secret,id:secret (overrides the config file)
    #[arg(long, global = true, env = "ENRICHER_CREDENTIALS", hide_env_values = true)]
    pub credentials: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Enrich every configured catalog
    Run {
        /// Worker pool width (overrides pipeline.concurrency)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Only process these languages (repeatable)
        #[arg(short, long)]
        language: Vec<String>,
    },
    /// Resolve one title to its soundtrack tracks
    Resolve {
        /// Movie title
        title: String,
        /// Language tag
        #[arg(short, long)]
        language: String,
        /// Release year
        #[arg(short, long)]
        year: i32,
    },
    /// Print the descriptor vector of a local audio file
    Features {
        /// Path to the audio file
        path: PathBuf,
    },
    /// Check that yt-dlp, ffmpeg and a headless browser are available
    CheckTools,
    /// Show processed-record and partition counts
    Status,
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was specified
/// (meaning usage should be shown).
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &cli.command else {
        return Ok(false);
    };

    match command {
        Commands::Init { force } => {
            cmd_init(cli.config.as_deref(), *force)?;
        }
        Commands::Features { path } => {
            cmd_features(path)?;
        }
        Commands::CheckTools => {
            cmd_check_tools(&load_config(cli)?)?;
        }
        Commands::Status => {
            cmd_status(&load_config(cli)?)?;
        }
        Commands::Resolve {
            title,
            language,
            year,
        } => {
            let rt = Runtime::new()?;
            cmd_resolve(&rt, &load_config(cli)?, title, language, *year)?;
        }
        Commands::Run {
            concurrency,
            language,
        } => {
            let rt = Runtime::new()?;
            let mut config = load_config(cli)?;
            if let Some(n) = concurrency {
                config.pipeline.concurrency = *n;
            }
            cmd_run(&rt, &config, language)?;
        }
    }
    Ok(true)
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Load the config file and apply command-line overrides
pub(crate) fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = config::load(cli.config.as_deref())?;
    if let Some(spec) = &cli.credentials {
        config.credentials = config::parse_credentials(spec)?;
    }
    Ok(config)
}
