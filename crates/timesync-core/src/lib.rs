//! # timesync-core
//!
//! Shared library for TimeSync containing the discovery and time-sync wire
//! protocol, the domain types both sides agree on, the shared network
//! configuration schema, and the multicast socket builder.
//!
//! This crate is used by both the server and client applications. It never
//! spawns tasks and holds no global state.
//!
//! # Architecture overview (for beginners)
//!
//! TimeSync lets a client find clock-reference servers on the LAN and keep a
//! running estimate of how far its own clock is from the server's:
//!
//! - **`protocol`** – What goes on the wire. Discovery uses tiny ASCII UDP
//!   datagrams (`DISCOVER`, `OFFER{json}`); time sync uses newline-delimited
//!   ASCII over TCP (`TIME` / `1700000000000`).
//!
//! - **`domain`** – Pure value types: [`Endpoint`], the validated
//!   [`PollingPeriod`], the [`OffsetSample`] estimator, the shared
//!   [`NetworkConfig`], and the [`FailureKind`] error taxonomy.
//!
//! - **`net`** – Builds a tokio `UdpSocket` that has joined the discovery
//!   multicast group on a given interface.
//!
//! - **`paths`** – The per-platform directory holding config and cache files.

pub mod domain;
pub mod net;
pub mod paths;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `timesync_core::Endpoint` instead of `timesync_core::domain::endpoint::Endpoint`.
pub use domain::config::{ConfigValidationError, NetworkConfig};
pub use domain::endpoint::Endpoint;
pub use domain::failure::{classify_io, classify_io_during_shutdown, Classify, FailureKind};
pub use domain::offset::{unix_time_ms, OffsetSample, SyncEstimate};
pub use domain::period::{PeriodBounds, PeriodError, PollingPeriod};
pub use protocol::codec::{
    decode_discovery, decode_offer, decode_time_reply, encode_discover, encode_offer,
    encode_time_reply, encode_time_request, is_discover_request, is_time_request, ProtocolError,
};
pub use net::{bind_multicast, MulticastOptions, SocketError};
pub use paths::platform_config_dir;
pub use protocol::framing::read_line_bounded;
pub use protocol::messages::DiscoveryMessage;
