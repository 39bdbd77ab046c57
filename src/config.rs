use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::source::SourceKind;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default reconciliation interval in milliseconds (24 hours)
pub const DEFAULT_REFRESH_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// Timeout for fetch operations in milliseconds (30 seconds)
pub const FETCH_TIMEOUT_MS: i64 = 30_000;

/// Delay between starting each vendor fetch (10ms)
pub const FETCH_STAGGER_DELAY_MS: u64 = 10;

/// Age after which a cycle claim left by a crashed process is taken over (30 minutes)
pub const CYCLE_LOCK_TIMEOUT_MS: i64 = 30 * 60 * 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Application configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub schedule: ScheduleConfig,
    pub fetch: FetchConfig,
    pub sources: SourcesConfig,
}

impl AppConfig {
    /// Load configuration from `path`, using defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Scheduler-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Reconciliation interval in milliseconds
    pub refresh_interval: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    /// Per-request timeout in milliseconds
    pub timeout: i64,
    /// Skip TLS certificate verification (some vendor docs sites need it)
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: FETCH_TIMEOUT_MS,
            accept_invalid_certs: false,
        }
    }
}

/// Source-specific configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    pub kaspersky: SourceConfig,
    #[serde(rename = "usergateNgfw7")]
    pub usergate_ngfw_7: SourceConfig,
    #[serde(rename = "usergateMc7")]
    pub usergate_mc_7: SourceConfig,
    #[serde(rename = "usergateNgfw6")]
    pub usergate_ngfw_6: SourceConfig,
    #[serde(rename = "usergateMc6")]
    pub usergate_mc_6: SourceConfig,
    #[serde(rename = "securityCode")]
    pub security_code: SourceConfig,
}

impl SourcesConfig {
    pub fn get(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::Kaspersky => &self.kaspersky,
            SourceKind::UserGateNgfw7 => &self.usergate_ngfw_7,
            SourceKind::UserGateManagementCenter7 => &self.usergate_mc_7,
            SourceKind::UserGateNgfw6 => &self.usergate_ngfw_6,
            SourceKind::UserGateManagementCenter6 => &self.usergate_mc_6,
            SourceKind::SecurityCode => &self.security_code,
        }
    }
}

/// Individual source configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Overrides the vendor page URL
    pub url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
        }
    }
}

/// Returns the path to the data directory for release-watch.
/// Uses $XDG_DATA_HOME/release-watch if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/release-watch,
/// or ./release-watch if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("release-watch.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("release-watch.log")
}

/// Returns the path to the optional JSON config file.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("release-watch")
}
