//! Configuration loading and path resolution
//!
//! Missing configuration is never fatal: absent files or keys fall back to
//! compiled defaults with a warning.
//!
//! Resolution priority for both the config file and the database path:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file / platform config directory
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "NEWSLENS_CONFIG";
/// Environment variable naming the SQLite database file
pub const DATABASE_ENV_VAR: &str = "NEWSLENS_DATABASE";
/// Environment variable overriding the classifier API token
pub const CLASSIFIER_TOKEN_ENV_VAR: &str = "NEWSLENS_CLASSIFIER_TOKEN";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// SQLite database file
    pub database_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub classifier: ClassifierConfig,
    pub sync: SyncConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter directive ("info", "newslens_trust=debug", ...)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// External text classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Zero-shot classification endpoint
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one
    pub api_token: Option<String>,
    /// Input longer than this many characters is truncated
    pub max_text_chars: usize,
    /// Fixed delay before the single retry on a transient failure
    pub retry_delay_ms: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models/facebook/bart-large-mnli"
                .to_string(),
            api_token: None,
            max_text_chars: 3000,
            retry_delay_ms: 2000,
            timeout_secs: 30,
        }
    }
}

/// Optimistic sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// EventBus channel capacity
    pub event_capacity: usize,
    /// Buffered snapshots per collection subscription
    pub snapshot_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_capacity: 100,
            snapshot_capacity: 16,
        }
    }
}

impl TomlConfig {
    /// Load configuration following the resolution priority
    ///
    /// A missing file yields defaults. A file that exists but fails to parse
    /// is an error, so typos are not silently ignored.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading config file");
                read_toml_config(&path)?
            }
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                TomlConfig::default()
            }
            None => {
                debug!("No config file location available, using defaults");
                TomlConfig::default()
            }
        };

        if let Ok(token) = std::env::var(CLASSIFIER_TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                config.classifier.api_token = Some(token);
            }
        }

        Ok(config)
    }

    /// Database path: CLI argument > env var > TOML key > platform default
    pub fn resolve_database_path(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        default_database_path()
    }
}

/// Locate the config file without reading it
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("newslens").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
}

/// Write a config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut temp_name = target.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, target)?;
    Ok(())
}

/// Get OS-dependent default database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("newslens").join("newslens.db"))
        .unwrap_or_else(|| PathBuf::from("./newslens_data/newslens.db"))
}
