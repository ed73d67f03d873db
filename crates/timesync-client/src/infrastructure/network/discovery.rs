//! Client side of multicast discovery.
//!
//! Two loops share one socket joined to the discovery group:
//!
//! - [`DiscoveryBroadcaster`] sends `DISCOVER` every discovery interval.
//! - [`OfferListener`] collects `OFFER` datagrams into the [`ServerRegistry`].
//!
//! Both go quiet while a session is bound and resume the moment it ends.
//! The listener also hears the client's own `DISCOVER` (multicast loopback)
//! and every other client's; those are skipped.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use timesync_core::protocol::messages::MAX_DATAGRAM_SIZE;
use timesync_core::{
    bind_multicast, classify_io_during_shutdown, decode_discovery, encode_discover, DiscoveryMessage,
    FailureKind, MulticastOptions, NetworkConfig, SocketError,
};

use crate::application::registry::ServerRegistry;
use crate::application::session::BoundSession;

/// Joins the discovery group on the primary IPv4 interface.
///
/// Falls back to letting the OS pick the interface when no primary address
/// can be determined.
///
/// # Errors
///
/// Returns [`SocketError`] if the socket cannot be bound or the join fails.
pub fn bind_discovery_socket(network: &NetworkConfig) -> Result<UdpSocket, SocketError> {
    let interface = match local_ip_address::local_ip() {
        Ok(IpAddr::V4(address)) => address,
        Ok(other) => {
            debug!("primary address {other} is not IPv4; using the default interface");
            Ipv4Addr::UNSPECIFIED
        }
        Err(e) => {
            debug!("no primary interface ({e}); using the default interface");
            Ipv4Addr::UNSPECIFIED
        }
    };

    bind_multicast(MulticastOptions {
        group: network.multicast_group,
        port: network.discovery_port,
        interface,
        ttl: network.multicast_ttl,
        loopback: network.multicast_loop,
    })
}

// ── Broadcaster ───────────────────────────────────────────────────────────────

/// Periodically asks the group which servers exist.
#[derive(Debug)]
pub struct DiscoveryBroadcaster {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    interval: Duration,
}

impl DiscoveryBroadcaster {
    pub fn new(socket: Arc<UdpSocket>, target: SocketAddr, interval: Duration) -> Self {
        Self {
            socket,
            target,
            interval,
        }
    }

    /// Runs until `cancel` fires. Returns the number of requests sent.
    pub async fn run(self, session: Arc<BoundSession>, cancel: CancellationToken) -> u64 {
        let request = encode_discover();
        let mut sent = 0u64;
        info!("discovering servers via {}", self.target);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if session.is_bound() {
                if !session.wait_until(false, &cancel).await {
                    break;
                }
                continue;
            }

            match self.socket.send_to(&request, self.target).await {
                Ok(_) => {
                    sent += 1;
                    debug!("sent DISCOVER to {}", self.target);
                }
                Err(e) => warn!("failed to send DISCOVER to {}: {e}", self.target),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!("discovery broadcaster stopped after {sent} requests");
        sent
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Collects offers into the registry while unbound.
#[derive(Debug)]
pub struct OfferListener {
    socket: Arc<UdpSocket>,
    receive_timeout: Duration,
}

impl OfferListener {
    pub fn new(socket: Arc<UdpSocket>, receive_timeout: Duration) -> Self {
        Self {
            socket,
            receive_timeout,
        }
    }

    /// Runs until `cancel` fires or the socket fails.
    ///
    /// Returns the number of endpoints upserted.
    pub async fn run(
        self,
        registry: Arc<ServerRegistry>,
        session: Arc<BoundSession>,
        cancel: CancellationToken,
    ) -> u64 {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut accepted = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if session.is_bound() {
                if !session.wait_until(false, &cancel).await {
                    break;
                }
                continue;
            }

            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = tokio::time::timeout(self.receive_timeout, self.socket.recv_from(&mut buf)) => r,
            };

            let (len, src) = match received {
                // Timed out: loop round to re-check the bound flag.
                Err(_) => continue,
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => match classify_io_during_shutdown(&e, cancel.is_cancelled()) {
                    FailureKind::Disposed => break,
                    kind if kind.is_recoverable() => {
                        warn!("offer listener receive failed: {e}");
                        continue;
                    }
                    _ => {
                        warn!("offer listener stopped: {e}");
                        break;
                    }
                },
            };

            if session.is_bound() {
                continue;
            }

            match decode_discovery(&buf[..len]) {
                Ok(DiscoveryMessage::Discover) => {}
                Ok(DiscoveryMessage::Offer(endpoints)) => {
                    for endpoint in endpoints {
                        if registry.upsert(endpoint) != Some(endpoint.port) {
                            info!("discovered server {endpoint}");
                        }
                        accepted += 1;
                    }
                }
                Err(e) => debug!("dropping datagram from {src}: {e}"),
            }
        }

        debug!("offer listener stopped after {accepted} offers");
        accepted
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
