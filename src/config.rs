//! Process-wide configuration.
//!
//! Built once at startup from, lowest precedence first: built-in defaults, an
//! optional JSON file, `GENUX_*` environment variables and caller overrides.
//! Nothing reads configuration from a global afterwards; the resolved
//! [`Config`] is handed to [`crate::Genux::builder`].
//!
//! Environment variables:
//! - `GENUX_API_ENDPOINT` - Direct generation endpoint
//! - `GENUX_API_KEY` - API key for the direct endpoint
//! - `GENUX_PROXY_ENDPOINT` - Proxy endpoint (takes precedence over direct)
//! - `GENUX_STORAGE_BACKEND` - `local` or `cloud`
//! - `GENUX_REMOTE_ENDPOINT` - Base URL of the remote feature collection
//! - `GENUX_TARGET_CONTAINER` - Selector for markup features (e.g. `#app`)
//! - `GENUX_DEBOUNCE_MS` - Debounce delay for interactive submissions
//! - `GENUX_DB_PATH` - Location of the local feature database

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default direct generation endpoint.
pub const DEFAULT_API_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

/// Default debounce delay for interactive submissions, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown storage backend: {0} (expected 'local' or 'cloud')")]
    UnknownBackend(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Could not determine data directory")]
    NoDataDir,
}

/// Where features are persisted when no storage adapter is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Cloud,
}

impl StorageBackend {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub api_endpoint: String,
    pub api_key: Option<String>,
    pub proxy_endpoint: Option<String>,
    pub storage_backend: StorageBackend,
    /// Base URL of the remote collection used by the `cloud` backend.
    pub remote_endpoint: Option<String>,
    /// Selector for the element markup features are appended to.
    /// `None` means the document body.
    pub target_container: Option<String>,
    /// Debounce delay in milliseconds.
    pub debounce_delay: u64,
    /// Local database file. `None` resolves to the platform data directory.
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: None,
            proxy_endpoint: None,
            storage_backend: StorageBackend::Local,
            remote_endpoint: None,
            target_container: None,
            debounce_delay: DEFAULT_DEBOUNCE_MS,
            db_path: None,
        }
    }
}

/// Caller-supplied overrides. Every field is optional; `None` keeps the
/// current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub proxy_endpoint: Option<String>,
    pub storage_backend: Option<StorageBackend>,
    pub remote_endpoint: Option<String>,
    pub target_container: Option<String>,
    pub debounce_delay: Option<u64>,
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Read a JSON config file. Keys that are not recognized are ignored and
    /// missing keys keep their defaults.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Apply `GENUX_*` environment variables on top of `self`.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_backend = var("GENUX_STORAGE_BACKEND")
            .map(|s| StorageBackend::from_str(&s))
            .transpose()?;
        let debounce_delay = var("GENUX_DEBOUNCE_MS")
            .map(|s| {
                s.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    name: "GENUX_DEBOUNCE_MS",
                    value: s,
                })
            })
            .transpose()?;

        Ok(self.merge(ConfigOverrides {
            api_endpoint: var("GENUX_API_ENDPOINT"),
            api_key: var("GENUX_API_KEY"),
            proxy_endpoint: var("GENUX_PROXY_ENDPOINT"),
            storage_backend,
            remote_endpoint: var("GENUX_REMOTE_ENDPOINT"),
            target_container: var("GENUX_TARGET_CONTAINER"),
            debounce_delay,
            db_path: var("GENUX_DB_PATH").map(PathBuf::from),
        }))
    }

    /// Merge caller overrides into this configuration.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.api_endpoint {
            self.api_endpoint = v;
        }
        if overrides.api_key.is_some() {
            self.api_key = overrides.api_key;
        }
        if overrides.proxy_endpoint.is_some() {
            self.proxy_endpoint = overrides.proxy_endpoint;
        }
        if let Some(v) = overrides.storage_backend {
            self.storage_backend = v;
        }
        if overrides.remote_endpoint.is_some() {
            self.remote_endpoint = overrides.remote_endpoint;
        }
        if overrides.target_container.is_some() {
            self.target_container = overrides.target_container;
        }
        if let Some(v) = overrides.debounce_delay {
            self.debounce_delay = v;
        }
        if overrides.db_path.is_some() {
            self.db_path = overrides.db_path;
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_delay)
    }

    /// Resolve the local database location.
    pub fn resolved_db_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "genux").ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join("genux.db"))
    }
}
