//! TimeSync client entry point.
//!
//! Discovers time servers on the LAN, lets the operator pick one and a
//! polling period, and then logs the estimated server time and clock offset
//! every period until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! timesync-client [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML config file [default: platform config dir]
//!   --discovery-port <PORT>     UDP discovery port
//!   --multicast-group <ADDR>    IPv4 multicast group
//!   --cache <PATH>              Last-used server address file
//!   --log-level <LEVEL>         Used when RUST_LOG is unset
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config (file, then CLI overrides)
//!  └─ spawn
//!       ├─ DiscoveryBroadcaster   DISCOVER every interval while unbound
//!       ├─ OfferListener          OFFER → ServerRegistry while unbound
//!       ├─ Selector               registry → operator → connect → bind
//!       └─ Synchronizer           TIME every period while bound
//!  └─ Ctrl-C → cancel token → unbind → await tasks (bounded by shutdown_grace_ms)
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use timesync_client::application::registry::ServerRegistry;
use timesync_client::application::select_server::{Selector, SelectorSettings};
use timesync_client::application::session::BoundSession;
use timesync_client::application::synchronize_clock::Synchronizer;
use timesync_client::infrastructure::console::{ConsoleOperator, TracingReporter};
use timesync_client::infrastructure::network::discovery::{
    bind_discovery_socket, DiscoveryBroadcaster, OfferListener,
};
use timesync_client::infrastructure::storage::cache::FileAddressCache;
use timesync_client::infrastructure::storage::config::{
    config_file_path, load_config_from, ClientAppConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// TimeSync client.
#[derive(Debug, Parser)]
#[command(
    name = "timesync-client",
    about = "Finds LAN time servers and tracks the clock offset to one",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "TIMESYNC_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// UDP port of the discovery multicast group.
    #[arg(long, env = "TIMESYNC_DISCOVERY_PORT")]
    discovery_port: Option<u16>,

    /// IPv4 multicast group used for discovery.
    #[arg(long, env = "TIMESYNC_MULTICAST_GROUP")]
    multicast_group: Option<Ipv4Addr>,

    /// File remembering the last server chosen.
    #[arg(long, env = "TIMESYNC_CACHE")]
    cache: Option<PathBuf>,

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
    fn into_client_config(self) -> anyhow::Result<ClientAppConfig> {
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
        if let Some(cache) = self.cache {
            config.client.cache_path = Some(cache);
        }
        if let Some(level) = self.log_level {
            config.client.log_level = level;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_client_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    info!("TimeSync client starting");

    let registry = Arc::new(ServerRegistry::new());
    let session = Arc::new(BoundSession::new());
    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    // ── Discovery ─────────────────────────────────────────────────────────────
    let socket = Arc::new(
        bind_discovery_socket(&config.network).context("failed to join the discovery group")?,
    );
    let broadcaster = DiscoveryBroadcaster::new(
        socket.clone(),
        config.network.discovery_target(),
        config.network.discovery_interval(),
    );
    let listener = OfferListener::new(socket, config.network.discovery_receive_timeout());
    {
        let session = session.clone();
        let token = cancel.clone();
        tasks.spawn(async move {
            broadcaster.run(session, token).await;
        });
    }
    {
        let registry = registry.clone();
        let session = session.clone();
        let token = cancel.clone();
        tasks.spawn(async move {
            listener.run(registry, session, token).await;
        });
    }

    // ── Selection and synchronization ─────────────────────────────────────────
    let cache_path = config
        .resolved_cache_path()
        .context("no --cache given and no platform config dir")?;
    let operator = ConsoleOperator::spawn_stdin().context("failed to start the stdin reader")?;
    let selector = Selector::new(
        registry.clone(),
        session.clone(),
        Arc::new(operator),
        Arc::new(FileAddressCache::new(cache_path)),
        SelectorSettings::from(&config.network),
    );
    let synchronizer = Synchronizer::new(
        session.clone(),
        registry,
        Arc::new(TracingReporter),
        config.request_timeout(),
    );
    {
        let token = cancel.clone();
        tasks.spawn(async move { selector.run(token).await });
    }
    {
        let token = cancel.clone();
        tasks.spawn(async move { synchronizer.run(token).await });
    }

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

    info!("TimeSync client ready. Press Ctrl-C to exit.");
    cancel.cancelled().await;

    let grace = config.client.shutdown_grace();
    let drained = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("tasks still running after {grace:?}; aborting them");
        tasks.shutdown().await;
    }
    session.unbind().await;

    info!("TimeSync client stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
