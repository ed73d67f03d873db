//! Multicast socket construction.
//!
//! `tokio::net::UdpSocket::bind` cannot set `SO_REUSEADDR` before binding, and
//! every responder on a host plus any local client must share the discovery
//! port. The socket is therefore built with `socket2`, configured, and then
//! handed to tokio.
//!
//! # Steps
//!
//! 1. Create an IPv4 UDP socket and enable address (and, on Unix, port) reuse.
//! 2. Bind the discovery port. On Unix the bind address is the group itself so
//!    the socket only sees group traffic; elsewhere it is `0.0.0.0`.
//! 3. Join the group on the chosen interface, pin outgoing multicast to that
//!    interface, and apply TTL / loopback.
//! 4. Switch to non-blocking mode and convert to a tokio socket.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::domain::failure::{Classify, FailureKind};

/// Failure to create or configure a discovery socket.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("failed to create UDP socket: {0}")]
    Create(#[source] std::io::Error),

    #[error("failed to set socket option {option}: {source}")]
    SetOption {
        option: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind discovery socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to join multicast group {group} on interface {interface}: {source}")]
    JoinGroup {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register socket with the async runtime: {0}")]
    Register(#[source] std::io::Error),
}

impl Classify for SocketError {
    fn kind(&self) -> FailureKind {
        FailureKind::Fatal
    }
}

/// Parameters for [`bind_multicast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastOptions {
    pub group: Ipv4Addr,
    pub port: u16,
    /// Local interface address. `UNSPECIFIED` lets the OS choose.
    pub interface: Ipv4Addr,
    pub ttl: u32,
    pub loopback: bool,
}

/// Builds a tokio `UdpSocket` joined to `opts.group` on `opts.interface`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns a [`SocketError`] naming the step that failed. All variants
/// classify as [`FailureKind::Fatal`].
pub fn bind_multicast(opts: MulticastOptions) -> Result<UdpSocket, SocketError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(SocketError::Create)?;

    socket
        .set_reuse_address(true)
        .map_err(|source| SocketError::SetOption {
            option: "SO_REUSEADDR",
            source,
        })?;

    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket
        .set_reuse_port(true)
        .map_err(|source| SocketError::SetOption {
            option: "SO_REUSEPORT",
            source,
        })?;

    let addr = SocketAddr::V4(SocketAddrV4::new(bind_ip(opts.group), opts.port));
    socket
        .bind(&SockAddr::from(addr))
        .map_err(|source| SocketError::Bind { addr, source })?;

    socket
        .join_multicast_v4(&opts.group, &opts.interface)
        .map_err(|source| SocketError::JoinGroup {
            group: opts.group,
            interface: opts.interface,
            source,
        })?;

    if !opts.interface.is_unspecified() {
        socket
            .set_multicast_if_v4(&opts.interface)
            .map_err(|source| SocketError::SetOption {
                option: "IP_MULTICAST_IF",
                source,
            })?;
    }
    socket
        .set_multicast_ttl_v4(opts.ttl)
        .map_err(|source| SocketError::SetOption {
            option: "IP_MULTICAST_TTL",
            source,
        })?;
    socket
        .set_multicast_loop_v4(opts.loopback)
        .map_err(|source| SocketError::SetOption {
            option: "IP_MULTICAST_LOOP",
            source,
        })?;
    socket
        .set_nonblocking(true)
        .map_err(|source| SocketError::SetOption {
            option: "O_NONBLOCK",
            source,
        })?;

    let std_socket: std::net::UdpSocket = socket.into();
    let udp = UdpSocket::from_std(std_socket).map_err(SocketError::Register)?;

    debug!(
        "joined multicast {}:{} on interface {}",
        opts.group, opts.port, opts.interface
    );
    Ok(udp)
}

/// Address passed to `bind(2)` for a multicast receiver.
fn bind_ip(group: Ipv4Addr) -> Ipv4Addr {
    if cfg!(unix) {
        group
    } else {
        Ipv4Addr::UNSPECIFIED
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_errors_are_fatal() {
        let e = SocketError::Create(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(e.kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_bind_ip_depends_on_platform() {
        let group = Ipv4Addr::new(239, 0, 0, 222);
        if cfg!(unix) {
            assert_eq!(bind_ip(group), group);
        } else {
            assert_eq!(bind_ip(group), Ipv4Addr::UNSPECIFIED);
        }
    }

    #[test]
    fn test_join_error_names_group_and_interface() {
        let e = SocketError::JoinGroup {
            group: Ipv4Addr::new(239, 0, 0, 222),
            interface: Ipv4Addr::new(10, 0, 0, 5),
            source: std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no such device"),
        };
        let text = e.to_string();
        assert!(text.contains("239.0.0.222"));
        assert!(text.contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_two_sockets_can_share_the_discovery_port() {
        // Multicast may be unavailable in sandboxed CI; skip rather than fail.
        let opts = MulticastOptions {
            group: Ipv4Addr::new(239, 0, 0, 222),
            port: 0,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            loopback: true,
        };
        let first = match bind_multicast(opts) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("skipping: multicast unavailable: {e}");
                return;
            }
        };
        let port = first.local_addr().unwrap().port();

        let second = bind_multicast(MulticastOptions { port, ..opts });

        assert!(second.is_ok(), "address reuse must allow a second bind");
    }
}
