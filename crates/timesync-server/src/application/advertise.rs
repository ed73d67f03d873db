//! Endpoint advertiser: one discovery responder and one time service per
//! usable interface, sharing a randomly chosen TCP port.
//!
//! # Startup sequence per interface
//!
//! 1. Pick random ports from `[min_listen_port, max_listen_port]` until a TCP
//!    listener binds on `(interface, port)`.
//! 2. Join the discovery group on the interface. This is where an interface
//!    that is down or not multicast-capable fails.
//! 3. Spawn the responder (advertising `(interface, port)`) and the acceptor.
//!
//! Interfaces are independent: a failure in any step is logged and affects
//! only that interface's pair.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use rand::Rng;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use timesync_core::{
    bind_multicast, Classify, Endpoint, FailureKind, MulticastOptions, NetworkConfig,
    ProtocolError, SocketError,
};

use crate::infrastructure::network::acceptor::run_acceptor;
use crate::infrastructure::network::discovery::DiscoveryResponder;
use crate::infrastructure::network::interfaces::NetInterface;

/// Error starting one interface's responder/acceptor pair.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Every randomly chosen port was taken.
    #[error("no free TCP port on {interface} after {attempts} attempts")]
    PortExhausted {
        interface: Ipv4Addr,
        attempts: u32,
        #[source]
        last: Option<std::io::Error>,
    },

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No interface could be started at all.
    #[error("no usable network interface could be advertised")]
    NothingAdvertised,
}

impl Classify for ServerError {
    fn kind(&self) -> FailureKind {
        FailureKind::Fatal
    }
}

/// Starts responder/acceptor pairs.
#[derive(Debug, Clone)]
pub struct EndpointAdvertiser {
    network: NetworkConfig,
    port_attempts: u32,
}

impl EndpointAdvertiser {
    pub fn new(network: NetworkConfig, port_attempts: u32) -> Self {
        Self {
            network,
            port_attempts,
        }
    }

    /// Starts one pair per interface and returns the endpoints now advertised.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NothingAdvertised`] when every interface failed.
    pub async fn start_all(
        &self,
        interfaces: &[NetInterface],
        tasks: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Endpoint>, ServerError> {
        let mut advertised = Vec::with_capacity(interfaces.len());
        for iface in interfaces {
            match self.start_interface(iface.address, tasks, cancel).await {
                Ok(endpoint) => {
                    info!("listening on {endpoint} ({})", iface.name);
                    advertised.push(endpoint);
                }
                Err(e) => error!("interface {} ({}) not advertised: {e}", iface.name, iface.address),
            }
        }
        if advertised.is_empty() {
            return Err(ServerError::NothingAdvertised);
        }
        Ok(advertised)
    }

    /// Starts the pair for one interface.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::PortExhausted`] if no port binds, or
    /// [`ServerError::Socket`] if the multicast join fails.
    pub async fn start_interface(
        &self,
        address: Ipv4Addr,
        tasks: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> Result<Endpoint, ServerError> {
        let listener = allocate_listener(
            address,
            self.network.min_listen_port,
            self.network.max_listen_port,
            self.port_attempts,
        )
        .await?;
        let port = listener
            .local_addr()
            .map(|a| a.port())
            .map_err(|e| ServerError::PortExhausted {
                interface: address,
                attempts: self.port_attempts,
                last: Some(e),
            })?;

        let socket = bind_multicast(MulticastOptions {
            group: self.network.multicast_group,
            port: self.network.discovery_port,
            interface: address,
            ttl: self.network.multicast_ttl,
            loopback: self.network.multicast_loop,
        })?;

        let endpoint = Endpoint::new(IpAddr::V4(address), port);
        let responder = DiscoveryResponder::new(socket, endpoint, self.network.discovery_target())?;

        let token = cancel.clone();
        tasks.spawn(async move {
            responder.run(token).await;
        });
        tasks.spawn(run_acceptor(listener, cancel.clone()));

        Ok(endpoint)
    }
}

/// Binds a TCP listener on a random port of `[min_port, max_port]`.
///
/// # Errors
///
/// Returns [`ServerError::PortExhausted`] after `attempts` failed binds. An
/// error other than "address in use" ends the search early, since retrying
/// another port cannot fix it.
pub async fn allocate_listener(
    address: Ipv4Addr,
    min_port: u16,
    max_port: u16,
    attempts: u32,
) -> Result<TcpListener, ServerError> {
    let mut last = None;
    for _ in 0..attempts {
        let port = rand::thread_rng().gen_range(min_port..=max_port);
        let addr = SocketAddr::V4(SocketAddrV4::new(address, port));
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                warn!("port {port} on {address} is taken, trying another");
                last = Some(e);
            }
            Err(e) => {
                last = Some(e);
                break;
            }
        }
    }
    Err(ServerError::PortExhausted {
        interface: address,
        attempts,
        last,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
