//! TimeSync server entry point.
//!
//! Advertises a clock-reference service on every usable local interface and
//! answers `TIME` requests until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! timesync-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML config file [default: platform config dir]
//!   --discovery-port <PORT>     UDP discovery port
//!   --multicast-group <ADDR>    IPv4 multicast group
//!   --interface <ADDR>          Advertise only these addresses (repeatable)
//!   --log-level <LEVEL>         Used when RUST_LOG is unset
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config (file, then CLI overrides)
//!  └─ EndpointAdvertiser::start_all()
//!       ├─ DiscoveryResponder  (one task per interface)
//!       └─ run_acceptor        (one task per interface, one task per session)
//!  └─ Ctrl-C → cancel token → await tasks (bounded by shutdown_grace_ms)
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use timesync_server::application::advertise::EndpointAdvertiser;
use timesync_server::infrastructure::network::interfaces::{
    configured_interfaces, local_interfaces,
};
use timesync_server::infrastructure::storage::config::{
    config_file_path, load_config_from, ServerAppConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// TimeSync clock-reference server.
#[derive(Debug, Parser)]
#[command(
    name = "timesync-server",
    about = "Advertises a LAN clock-reference service over multicast",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "TIMESYNC_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// UDP port of the discovery multicast group.
    #[arg(long, env = "TIMESYNC_DISCOVERY_PORT")]
    discovery_port: Option<u16>,

    /// IPv4 multicast group used for discovery.
    #[arg(long, env = "TIMESYNC_MULTICAST_GROUP")]
    multicast_group: Option<Ipv4Addr>,

    /// Interface address to advertise. May be given more than once.
    #[arg(long = "interface")]
    interfaces: Vec<Ipv4Addr>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, env = "TIMESYNC_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file and applies CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged configuration is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerAppConfig> {
        let path = match self.config {
            Some(path) => path,
            None => config_file_path().context("no --config given and no platform config dir")?,
        };
        let mut config = load_config_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;

        if let Some(port) = self.discovery_port {
            config.network.discovery_port = port;
        }
        if let Some(group) = self.multicast_group {
            config.network.multicast_group = group;
        }
        if !self.interfaces.is_empty() {
            config.server.interfaces = self.interfaces;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("TimeSync server starting");

    let interfaces = if config.server.interfaces.is_empty() {
        local_interfaces().context("failed to enumerate interfaces")?
    } else {
        configured_interfaces(&config.server.interfaces)
    };

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    let advertiser = EndpointAdvertiser::new(config.network.clone(), config.server.port_attempts);
    advertiser
        .start_all(&interfaces, &mut tasks, &cancel)
        .await
        .context("server has nothing to advertise")?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    info!("TimeSync server ready. Press Ctrl-C to exit.");
    cancel.cancelled().await;

    let grace = config.server.shutdown_grace();
    let drained = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("tasks still running after {grace:?}; aborting them");
        tasks.shutdown().await;
    }

    info!("TimeSync server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_temp_config(args: &[&str]) -> (tempfile::TempDir, Cli) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        let path_str = path.to_str().unwrap().to_string();
        let mut full = vec!["timesync-server", "--config", path_str.as_str()];
        full.extend_from_slice(args);
        let cli = Cli::parse_from(full);
        (dir, cli)
    }

    #[test]
    fn test_cli_without_interface_flags_has_empty_allow_list() {
        let cli = Cli::parse_from(["timesync-server"]);
        assert!(cli.interfaces.is_empty());
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        // Arrange
        let (_dir, cli) = cli_with_temp_config(&[]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.network.discovery_port, 12345);
        assert_eq!(config.server.log_level, "info");
    }

    #[test]
    fn test_cli_overrides_file_values() {
        // Arrange
        let (dir, _) = cli_with_temp_config(&[]);
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "[network]\ndiscovery_port = 4000\n").unwrap();
        let cli = Cli::parse_from([
            "timesync-server",
            "--config",
            path.to_str().unwrap(),
            "--discovery-port",
            "5000",
            "--multicast-group",
            "239.1.1.1",
            "--interface",
            "10.0.0.5",
            "--interface",
            "10.0.0.6",
            "--log-level",
            "debug",
        ]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.network.discovery_port, 5000);
        assert_eq!(config.network.multicast_group, Ipv4Addr::new(239, 1, 1, 1));
        assert_eq!(
            config.server.interfaces,
            vec![Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 6)]
        );
        assert_eq!(config.server.log_level, "debug");
    }

    #[test]
    fn test_non_multicast_group_is_rejected() {
        let (_dir, cli) = cli_with_temp_config(&["--multicast-group", "10.0.0.1"]);
        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_unparseable_config_file_is_an_error() {
        let (dir, _) = cli_with_temp_config(&[]);
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "[[[ nope").unwrap();
        let cli = Cli::parse_from(["timesync-server", "--config", path.to_str().unwrap()]);
        assert!(cli.into_server_config().is_err());
    }
}
