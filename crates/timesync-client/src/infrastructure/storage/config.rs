//! TOML-based configuration for the client.
//!
//! ```toml
//! [client]
//! log_level = "info"
//! cache_path = "/var/lib/timesync/cache.txt"   # default: next to client.toml
//! request_timeout_ms = 2000                     # default: connect_timeout_ms
//! shutdown_grace_ms = 5000
//!
//! [network]
//! discovery_port = 12345
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use timesync_core::{platform_config_dir, ConfigValidationError, NetworkConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigValidationError),

    #[error("request_timeout_ms must be greater than 0")]
    ZeroRequestTimeout,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ClientAppConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Settings that only the client reads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Where the last-used server address is remembered.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Bound on one `TIME` round trip. Falls back to the connect timeout.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            cache_path: None,
            request_timeout_ms: None,
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ClientSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl ClientAppConfig {
    /// Rejects values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for bad network parameters and
    /// [`ConfigError::ZeroRequestTimeout`] for a zero request timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        if self.client.request_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        self.client
            .request_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.network.connect_timeout())
    }

    /// The configured cache path, or `cache.txt` in the platform config dir.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformConfigDir`] when no path is configured
    /// and the platform directory is unknown.
    pub fn resolved_cache_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.client.cache_path {
            Some(path) => Ok(path.clone()),
            None => platform_config_dir()
                .map(|dir| dir.join("cache.txt"))
                .ok_or(ConfigError::NoPlatformConfigDir),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("client.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from `path`, or defaults when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ClientAppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientAppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
