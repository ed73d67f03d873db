//! Network parameters shared by the server and the client.
//!
//! Both binaries embed this struct as the `[network]` table of their TOML
//! file, so the two sides agree on the discovery group and port without extra
//! wiring:
//!
//! ```toml
//! [network]
//! discovery_port = 12345
//! multicast_group = "239.0.0.222"
//! discovery_interval_ms = 10000
//! ```
//!
//! Every field has a serde default, so a partial (or empty) table is valid.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::period::{PeriodBounds, MAX_PERIOD_MS, MIN_PERIOD_MS};

/// A configuration value that cannot work at runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("multicast_group {0} is not an IPv4 multicast address")]
    NotMulticast(Ipv4Addr),

    #[error("discovery_port must not be 0")]
    ZeroDiscoveryPort,

    #[error("{field} must be greater than 0")]
    ZeroDuration { field: &'static str },

    #[error("polling period bounds are inverted: min {min}ms > max {max}ms")]
    InvertedPeriodBounds { min: u64, max: u64 },

    #[error("min_period_ms must be greater than 0")]
    ZeroMinPeriod,

    #[error("listen port range is inverted: {min} > {max}")]
    InvertedPortRange { min: u16, max: u16 },

    #[error("min_listen_port must not be 0")]
    ZeroListenPort,
}

/// Discovery, connection, and polling parameters.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// UDP port of the discovery multicast group.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// IPv4 multicast group used for `DISCOVER` / `OFFER`.
    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,
    /// Hop limit for outgoing multicast. `1` keeps traffic on the local subnet.
    #[serde(default = "default_multicast_ttl")]
    pub multicast_ttl: u32,
    /// Whether this host receives its own multicast (needed when the server
    /// and client share a machine).
    #[serde(default = "default_true")]
    pub multicast_loop: bool,
    /// Delay between two `DISCOVER` broadcasts while unbound.
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
    /// Upper bound on a single offer receive before the bound flag is re-read.
    #[serde(default = "default_discovery_receive_timeout_ms")]
    pub discovery_receive_timeout_ms: u64,
    /// Upper bound on establishing the TCP connection to a chosen server.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How often the selector re-checks the registry while unbound.
    #[serde(default = "default_selection_poll_interval_ms")]
    pub selection_poll_interval_ms: u64,
    #[serde(default = "default_min_period_ms")]
    pub min_period_ms: u64,
    #[serde(default = "default_max_period_ms")]
    pub max_period_ms: u64,
    /// Lowest TCP port the server may pick for an interface.
    #[serde(default = "default_min_listen_port")]
    pub min_listen_port: u16,
    #[serde(default = "default_max_listen_port")]
    pub max_listen_port: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_discovery_port() -> u16 {
    12345
}
fn default_multicast_group() -> Ipv4Addr {
    Ipv4Addr::new(239, 0, 0, 222)
}
fn default_multicast_ttl() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_discovery_interval_ms() -> u64 {
    10_000
}
fn default_discovery_receive_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_selection_poll_interval_ms() -> u64 {
    1_000
}
fn default_min_period_ms() -> u64 {
    MIN_PERIOD_MS
}
fn default_max_period_ms() -> u64 {
    MAX_PERIOD_MS
}
fn default_min_listen_port() -> u16 {
    1025
}
fn default_max_listen_port() -> u16 {
    65535
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            multicast_group: default_multicast_group(),
            multicast_ttl: default_multicast_ttl(),
            multicast_loop: default_true(),
            discovery_interval_ms: default_discovery_interval_ms(),
            discovery_receive_timeout_ms: default_discovery_receive_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            selection_poll_interval_ms: default_selection_poll_interval_ms(),
            min_period_ms: default_min_period_ms(),
            max_period_ms: default_max_period_ms(),
            min_listen_port: default_min_listen_port(),
            max_listen_port: default_max_listen_port(),
        }
    }
}

impl NetworkConfig {
    /// Where `DISCOVER` and `OFFER` datagrams are sent.
    pub fn discovery_target(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.multicast_group, self.discovery_port))
    }

    pub fn period_bounds(&self) -> PeriodBounds {
        PeriodBounds::new(self.min_period_ms, self.max_period_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn discovery_receive_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_receive_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn selection_poll_interval(&self) -> Duration {
        Duration::from_millis(self.selection_poll_interval_ms)
    }

    /// Checks the values that would otherwise fail deep inside a loop.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigValidationError`] found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.multicast_group.is_multicast() {
            return Err(ConfigValidationError::NotMulticast(self.multicast_group));
        }
        if self.discovery_port == 0 {
            return Err(ConfigValidationError::ZeroDiscoveryPort);
        }
        for (field, value) in [
            ("discovery_interval_ms", self.discovery_interval_ms),
            ("discovery_receive_timeout_ms", self.discovery_receive_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("selection_poll_interval_ms", self.selection_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::ZeroDuration { field });
            }
        }
        if self.min_period_ms == 0 {
            return Err(ConfigValidationError::ZeroMinPeriod);
        }
        if self.min_period_ms > self.max_period_ms {
            return Err(ConfigValidationError::InvertedPeriodBounds {
                min: self.min_period_ms,
                max: self.max_period_ms,
            });
        }
        if self.min_listen_port == 0 {
            return Err(ConfigValidationError::ZeroListenPort);
        }
        if self.min_listen_port > self.max_listen_port {
            return Err(ConfigValidationError::InvertedPortRange {
                min: self.min_listen_port,
                max: self.max_listen_port,
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
