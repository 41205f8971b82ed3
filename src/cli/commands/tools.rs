//! External tool checks and config initialisation.

use std::path::Path;

use crate::config::{self, Config};
use crate::tools;

/// Check that the external tools and credentials are in place
pub fn cmd_check_tools(config: &Config) -> anyhow::Result<()> {
    println!("Checking pipeline tools...\n");

    for status in tools::check_tools(&config.tools) {
        match (&status.version, &status.path) {
            (Some(version), _) => println!("✓ {}: {}", status.name, version),
            (None, Some(path)) => println!("✗ {}: NOT FOUND ({:?})", status.name, path),
            (None, None) => println!("✗ {}: NOT FOUND", status.name),
        }
    }

    println!();
    println!("Catalog credentials:");
    match config.validate() {
        Ok(()) => println!("✓ {} credential set(s)", config.credentials.len()),
        Err(e) => {
            println!("✗ {}", e);
        }
    }

    Ok(())
}

/// Write a default config file to `path` (or the default location)
pub fn cmd_init(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config::config_path().ok_or(config::ConfigError::NoConfigDir)?,
    };

    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }

    config::save(&Config::default(), &path)?;
    println!("Wrote default config to {:?}", path);
    println!("Add [[credentials]] entries before running the pipeline.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        cmd_init(Some(&path), false).unwrap();
        assert!(path.exists());
        assert!(cmd_init(Some(&path), false).is_err());
        assert!(cmd_init(Some(&path), true).is_ok());
    }
}
