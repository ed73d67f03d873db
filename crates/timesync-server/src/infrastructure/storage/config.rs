//! TOML-based configuration for the server.
//!
//! The file lives at `<platform config dir>/server.toml` unless `--config`
//! names another path. A missing file means "all defaults".
//!
//! ```toml
//! [server]
//! log_level = "info"
//! interfaces = ["192.168.1.20"]   # empty = every usable interface
//! port_attempts = 32
//! shutdown_grace_ms = 5000
//!
//! [network]
//! discovery_port = 12345
//! multicast_group = "239.0.0.222"
//! ```
//!
//! Both tables and every field are optional.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use timesync_core::{platform_config_dir, ConfigValidationError, NetworkConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
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

    #[error("port_attempts must be greater than 0")]
    ZeroPortAttempts,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration stored on disk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ServerAppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Settings that only the server reads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Interface addresses to advertise. Empty means enumerate.
    #[serde(default)]
    pub interfaces: Vec<Ipv4Addr>,
    /// Random ports tried per interface before giving up on it.
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u32,
    /// How long shutdown waits for loops to finish.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_port_attempts() -> u32 {
    32
}
fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            interfaces: Vec::new(),
            port_attempts: default_port_attempts(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ServerSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl ServerAppConfig {
    /// Rejects values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for bad network parameters and
    /// [`ConfigError::ZeroPortAttempts`] when no port would ever be tried.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        if self.server.port_attempts == 0 {
            return Err(ConfigError::ZeroPortAttempts);
        }
        Ok(())
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
        .map(|dir| dir.join("server.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from `path`, or defaults when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ServerAppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerAppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
