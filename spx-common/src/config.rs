//! Configuration loading and database path resolution
//!
//! Resolution priority for the database path:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `SPX_DATABASE`
//! 3. TOML config file (`database_path`)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed TOML file never stops a tool: it logs a warning
//! and continues with defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the database path
pub const DATABASE_ENV_VAR: &str = "SPX_DATABASE";

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV_VAR: &str = "SPX_CONFIG";

/// Configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Ingestion settings
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Domain used when synthesizing emails for newly created salespeople
    #[serde(default = "default_email_domain")]
    pub email_domain: String,

    /// Maximum number of row errors kept in the import log
    #[serde(default = "default_error_log_limit")]
    pub error_log_limit: usize,

    /// Log progress every N successful rows
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            email_domain: default_email_domain(),
            error_log_limit: default_error_log_limit(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_email_domain() -> String {
    "example.com".to_string()
}

fn default_error_log_limit() -> usize {
    100
}

fn default_progress_interval() -> usize {
    10
}

impl TomlConfig {
    /// Parse a config file, failing on unreadable or malformed content
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration, falling back to defaults on any problem.
    ///
    /// An explicit path (argument or `SPX_CONFIG`) is tried first, then the
    /// platform config locations.
    pub fn load(explicit: Option<&Path>) -> Self {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let candidates = match explicit {
            Some(path) => vec![path],
            None => default_config_paths(),
        };

        for path in candidates {
            if !path.exists() {
                debug!("Config file not present: {}", path.display());
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                }
            }
        }

        Self::default()
    }
}

/// Resolve the database path following the documented priority order
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Some(path) = std::env::var_os(DATABASE_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.database_path {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_database_path()
}

/// Platform config file locations, most specific first
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("spx").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/spx/config.toml"));
    }
    paths
}

/// Get OS-dependent default database path
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("spx"))
        .unwrap_or_else(|| PathBuf::from("./spx_data"))
        .join("spx.db")
}
