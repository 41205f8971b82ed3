//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory unless `--config`
//! points somewhere else:
//! - Windows: %APPDATA%\soundtrack-enricher\config.toml
//! - macOS: ~/Library/Application Support/soundtrack-enricher/config.toml
//! - Linux: ~/.config/soundtrack-enricher/config.toml
//!
//! Every section falls back to defaults, so an empty file (or none at all)
//! yields a usable configuration apart from the credential pool, which has
//! to come from `[[credentials]]` entries or `ENRICHER_CREDENTIALS`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::enrichment::{CredentialSet, RetryPolicy};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ordered catalog API credential pool
    pub credentials: Vec<CredentialConfig>,

    /// Worker pool and retry settings
    pub pipeline: PipelineConfig,

    /// Where records and scratch audio live
    pub storage: StorageConfig,

    /// External tool locations
    pub tools: ToolsConfig,

    /// Catalog input files
    pub catalog: CatalogConfig,
}

/// One catalog API credential set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Worker pool and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of tracks processed at once
    pub concurrency: usize,

    /// Total catalog search attempts per query
    pub max_retries: u32,

    /// Backoff after the first failed attempt, in seconds
    pub base_delay_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            base_delay_secs: 5,
        }
    }
}

/// Record store and scratch locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Combined record store (source of truth for processed IDs)
    pub combined_store: PathBuf,

    /// Directory holding the `{language}_{year}.csv` partition files
    pub partition_dir: PathBuf,

    /// Scratch directory for downloaded and transcoded audio
    pub scratch_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            combined_store: PathBuf::from("song_features_combined.csv"),
            partition_dir: PathBuf::from("songs_by_year"),
            scratch_dir: PathBuf::from("audio_files"),
        }
    }
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// yt-dlp executable
    pub yt_dlp: PathBuf,

    /// ffmpeg executable
    pub ffmpeg: PathBuf,

    /// Headless Chrome/Chromium (searched for when unset)
    pub browser: Option<PathBuf>,

    /// Netscape cookie jar passed to yt-dlp
    pub cookies_file: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: PathBuf::from("yt-dlp"),
            ffmpeg: PathBuf::from("ffmpeg"),
            browser: None,
            cookies_file: None,
        }
    }
}

/// Catalog input files, keyed by language
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub files: BTreeMap<String, PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let files = ["telugu", "hindi", "kannada", "tamil"]
            .into_iter()
            .map(|lang| {
                (
                    lang.to_string(),
                    PathBuf::from(format!("movies_by_language/{}_movies.csv", lang)),
                )
            })
            .collect();
        Self { files }
    }
}

impl Config {
    /// Check the settings that must hold before any processing starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credentials.is_empty() {
            return Err(ConfigError::NoCredentials);
        }
        if let Some(pos) = self
            .credentials
            .iter()
            .position(|c| c.client_id.trim().is_empty() || c.client_secret.trim().is_empty())
        {
            return Err(ConfigError::InvalidCredential(format!(
                "credential set {} has an empty client_id or client_secret",
                pos
            )));
        }
        if self.pipeline.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.pipeline.max_retries == 0 {
            return Err(ConfigError::InvalidRetries);
        }
        Ok(())
    }

    /// The credential pool in configured order
    pub fn credential_pool(&self) -> Vec<CredentialSet> {
        self.credentials
            .iter()
            .enumerate()
            .map(|(index, c)| CredentialSet {
                index,
                identity: c.client_id.clone(),
                secret: c.client_secret.clone(),
            })
            .collect()
    }

    /// Retry policy for the catalog resolver
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.pipeline.max_retries,
            base_delay: Duration::from_secs(self.pipeline.base_delay_secs),
        }
    }
}

/// Parse `id:secret,id:secret` as supplied through `ENRICHER_CREDENTIALS`
pub fn parse_credentials(spec: &str) -> Result<Vec<CredentialConfig>, ConfigError> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(i, entry)| {
            let (id, secret) = entry.split_once(':').ok_or_else(|| {
                ConfigError::InvalidCredential(format!("entry {} is not in id:secret form", i))
            })?;
            Ok(CredentialConfig {
                client_id: id.trim().to_string(),
                client_secret: secret.trim().to_string(),
            })
        })
        .collect()
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("soundtrack-enricher"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration
///
/// An explicit path must exist. The default location falls back to defaults
/// when there is no file; a file that exists but can't be read or parsed is
/// always an error.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            path.to_path_buf()
        }
        None => {
            let Some(path) = config_path() else {
                tracing::warn!("Could not determine config directory, using defaults");
                return Ok(Config::default());
            };
            if !path.exists() {
                tracing::info!("No config file found at {:?}, using defaults", path);
                return Ok(Config::default());
            }
            path
        }
    };

    let contents =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
    let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.clone(), e))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Save configuration to `path`
///
/// Creates the parent directory if it doesn't exist.
pub fn save(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("No catalog credentials configured (add [[credentials]] or set ENRICHER_CREDENTIALS)")]
    NoCredentials,

    #[error("Invalid credentials: {0}")]
    InvalidCredential(String),

    #[error("pipeline.concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("pipeline.max_retries must be at least 1")]
    InvalidRetries,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> Config {
        Config {
            credentials: vec![CredentialConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_serializes() {
        let config = with_credentials();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[[credentials]]"));
        assert!(toml.contains("[pipeline]"));
        assert!(toml.contains("[storage]"));
        assert!(toml.contains("[tools]"));
        assert!(toml.contains("[catalog.files]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = with_credentials();
        config.pipeline.concurrency = 8;
        config.tools.cookies_file = Some(PathBuf::from("/tmp/cookies.txt"));

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed.credentials, config.credentials);
        assert_eq!(parsed.pipeline.concurrency, 8);
        assert_eq!(parsed.tools.cookies_file, Some(PathBuf::from("/tmp/cookies.txt")));
        assert_eq!(parsed.catalog.files.len(), 4);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[[credentials]]
client_id = "a"
client_secret = "b"

[pipeline]
concurrency = 2
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.credentials.len(), 1);
        assert_eq!(config.pipeline.concurrency, 2);

        // Other fields use defaults
        assert_eq!(config.pipeline.max_retries, 3);
        assert_eq!(config.pipeline.base_delay_secs, 5);
        assert_eq!(
            config.storage.combined_store,
            PathBuf::from("song_features_combined.csv")
        );
        assert_eq!(
            config.catalog.files.get("telugu"),
            Some(&PathBuf::from("movies_by_language/telugu_movies.csv"))
        );
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoCredentials)));
        assert!(with_credentials().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = with_credentials();
        config.pipeline.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConcurrency)));
    }

    #[test]
    fn test_validate_rejects_blank_secret() {
        let mut config = with_credentials();
        config.credentials[0].client_secret = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCredential(_))));
    }

    #[test]
    fn test_parse_credentials() {
        let parsed = parse_credentials("a:1, b:2,").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].client_id, "b");
        assert_eq!(parsed[1].client_secret, "2");

        assert!(parse_credentials("no-secret").is_err());
    }

    #[test]
    fn test_credential_pool_indices() {
        let mut config = with_credentials();
        config.credentials.push(CredentialConfig {
            client_id: "second".to_string(),
            client_secret: "s".to_string(),
        });
        let pool = config.credential_pool();
        assert_eq!(pool[1].index, 1);
        assert_eq!(pool[1].identity, "second");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = with_credentials().retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = with_credentials();

        save(&config, &path).unwrap();
        let loaded = load(Some(&path)).unwrap();

        assert_eq!(loaded.credentials, config.credentials);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline\nconcurrency = ").unwrap();
        assert!(matches!(load(Some(&path)), Err(ConfigError::Parse(_, _))));
    }
}
