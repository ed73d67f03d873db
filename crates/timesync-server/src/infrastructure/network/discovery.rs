//! Multicast discovery responder.
//!
//! One responder runs per advertised interface. It waits for `DISCOVER`
//! datagrams on the discovery group and answers each with an `OFFER` carrying
//! this interface's address and the TCP port of its acceptor:
//!
//! ```text
//! client ──DISCOVER──► 239.0.0.222:12345 ──► responder (eth0, 192.168.1.20)
//! client ◄──OFFER{"address":"192.168.1.20","port":40001}── 239.0.0.222:12345
//! ```
//!
//! # Why reply to the group? (for beginners)
//!
//! A client on a multi-homed host cannot always be reached by a unicast reply
//! to the datagram's source address. Every client listens on the group, so
//! sending the offer there always reaches it. Clients that did not ask simply
//! learn about the server a little earlier.
//!
//! # Shutdown
//!
//! The loop races every receive against a [`CancellationToken`]. When the
//! token fires, the pending receive future is dropped, the loop returns, and
//! the socket is closed as the responder goes out of scope.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use timesync_core::protocol::messages::MAX_DATAGRAM_SIZE;
use timesync_core::{
    classify_io_during_shutdown, encode_offer, is_discover_request, Endpoint, FailureKind,
    ProtocolError,
};

/// Answers `DISCOVER` datagrams for one advertised endpoint.
#[derive(Debug)]
pub struct DiscoveryResponder {
    socket: UdpSocket,
    endpoint: Endpoint,
    reply_to: SocketAddr,
    offer: Vec<u8>,
}

impl DiscoveryResponder {
    /// Prepares a responder on an already-bound socket.
    ///
    /// `reply_to` is normally the multicast group and discovery port.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Serialize`] if the offer cannot be encoded.
    pub fn new(
        socket: UdpSocket,
        endpoint: Endpoint,
        reply_to: SocketAddr,
    ) -> Result<Self, ProtocolError> {
        let offer = encode_offer(&endpoint)?;
        Ok(Self {
            socket,
            endpoint,
            reply_to,
            offer,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Runs until `cancel` fires or a receive fails fatally.
    ///
    /// Returns the number of offers sent.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut offers_sent = 0u64;

        info!(
            "discovery responder for {} replying to {}",
            self.endpoint, self.reply_to
        );

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.socket.recv_from(&mut buf) => r,
            };

            let (len, src) = match received {
                Ok(pair) => pair,
                Err(e) => match classify_io_during_shutdown(&e, cancel.is_cancelled()) {
                    FailureKind::Disposed => {
                        debug!("discovery responder for {} closed: {e}", self.endpoint);
                        break;
                    }
                    kind if kind.is_recoverable() => {
                        warn!("discovery responder for {} receive failed: {e}", self.endpoint);
                        continue;
                    }
                    _ => {
                        warn!("discovery responder for {} stopped: {e}", self.endpoint);
                        break;
                    }
                },
            };

            if !is_discover_request(&buf[..len]) {
                debug!("ignoring {len}-byte datagram from {src}");
                continue;
            }

            match self.socket.send_to(&self.offer, self.reply_to).await {
                Ok(_) => {
                    offers_sent += 1;
                    debug!("offered {} to {} (asked by {src})", self.endpoint, self.reply_to);
                }
                Err(e) => warn!("failed to send offer for {}: {e}", self.endpoint),
            }
        }

        info!(
            "discovery responder for {} stopped after {offers_sent} offers",
            self.endpoint
        );
        offers_sent
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use timesync_core::decode_offer;

    async fn loopback_socket() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.expect("bind loopback")
    }

    #[tokio::test]
    async fn test_new_precomputes_offer_bytes() {
        // Arrange
        let socket = loopback_socket().await;
        let endpoint = Endpoint::new("10.0.0.5".parse().unwrap(), 5000);

        // Act
        let responder =
            DiscoveryResponder::new(socket, endpoint, "127.0.0.1:9".parse().unwrap()).unwrap();

        // Assert
        assert_eq!(decode_offer(&responder.offer).unwrap(), vec![endpoint]);
        assert_eq!(responder.endpoint(), endpoint);
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_responder() {
        // Arrange
        let socket = loopback_socket().await;
        let endpoint = Endpoint::new("127.0.0.1".parse().unwrap(), 5000);
        let responder =
            DiscoveryResponder::new(socket, endpoint, "127.0.0.1:9".parse().unwrap()).unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(responder.run(cancel.clone()));

        // Act
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;

        // Assert
        assert_eq!(result.expect("must stop promptly").unwrap(), 0);
    }
}
