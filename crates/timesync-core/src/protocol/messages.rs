//! Keywords and message types for the discovery and time-sync protocols.
//!
//! # Discovery (UDP multicast)
//!
//! ```text
//! client ── "DISCOVER" ──────────────────────────────► group:port
//! server ── "OFFER{\"address\":\"10.0.0.5\",\"port\":5000}" ──► group:port
//! ```
//!
//! Keywords are matched case-insensitively after trimming surrounding
//! whitespace. The offer body is JSON: one endpoint object or an array of them.
//!
//! # Time sync (TCP)
//!
//! ```text
//! client ── "TIME\n" ──────────► server
//! client ◄─ "1700000000000\n" ── server
//! ```
//!
//! TCP is a byte stream, so every message is terminated by `\n`.

use crate::domain::endpoint::Endpoint;

/// Discovery request sent by clients.
pub const DISCOVER_KEYWORD: &str = "DISCOVER";

/// Prefix of a server's endpoint advertisement.
pub const OFFER_KEYWORD: &str = "OFFER";

/// Time request sent over the bound connection.
pub const TIME_KEYWORD: &str = "TIME";

/// Terminator for every message on the time-sync connection.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Largest discovery datagram either side reads.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Longest line accepted on the time-sync connection.
///
/// A millisecond timestamp needs 13 digits today; anything much longer is a
/// misbehaving peer.
pub const MAX_LINE_LEN: usize = 64;

/// A decoded discovery datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMessage {
    /// `DISCOVER` – a client asking which servers are reachable.
    Discover,
    /// `OFFER…` – one or more endpoints a server is listening on.
    Offer(Vec<Endpoint>),
}
