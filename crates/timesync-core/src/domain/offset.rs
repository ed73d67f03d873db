//! Round-trip clock-offset estimation.
//!
//! The client records `t1` just before sending `TIME` and `t2` just after the
//! reply arrives. The server stamped its reply with `server` somewhere in
//! between. Assuming the request and reply legs take equally long, the server
//! read its clock at the midpoint of the round trip:
//!
//! ```text
//! delta                = server + (t2 - t1) / 2 - t2
//! estimated_server_now = t2 + delta            (= server + (t2 - t1) / 2)
//! ```
//!
//! # Accuracy
//!
//! This is Cristian's algorithm. It is exact only for symmetric paths. The
//! only hard guarantee is that the server read its clock inside `[t1, t2]`,
//! so the true offset lies within `delta ± round_trip / 2`.
//! [`OffsetSample::error_bound_ms`] exposes that bound, rounded up to cover
//! the truncating division.

use std::time::{SystemTime, UNIX_EPOCH};

/// One completed `TIME` exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSample {
    /// Server clock in Unix milliseconds, as reported in the reply.
    pub server_ms: i64,
    /// Client clock immediately before sending the request.
    pub t1_ms: i64,
    /// Client clock immediately after receiving the reply.
    pub t2_ms: i64,
}

/// The values reported for each successful sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEstimate {
    pub estimated_server_now_ms: i64,
    pub delta_ms: i64,
    pub round_trip_ms: i64,
    pub error_bound_ms: i64,
}

impl OffsetSample {
    pub fn new(server_ms: i64, t1_ms: i64, t2_ms: i64) -> Self {
        Self {
            server_ms,
            t1_ms,
            t2_ms,
        }
    }

    /// Client-observed round trip. Never negative: a clock step backwards
    /// between `t1` and `t2` is treated as a zero-length trip.
    pub fn round_trip_ms(&self) -> i64 {
        self.t2_ms.saturating_sub(self.t1_ms).max(0)
    }

    /// Offset to add to the client clock to obtain the server clock.
    pub fn delta_ms(&self) -> i64 {
        self.server_ms
            .saturating_add(self.round_trip_ms() / 2)
            .saturating_sub(self.t2_ms)
    }

    /// The server clock at the instant `t2`.
    pub fn estimated_server_now_ms(&self) -> i64 {
        self.t2_ms.saturating_add(self.delta_ms())
    }

    /// Worst-case distance between `delta_ms` and the true offset.
    pub fn error_bound_ms(&self) -> i64 {
        let rtt = self.round_trip_ms();
        rtt / 2 + rtt % 2
    }

    pub fn estimate(&self) -> SyncEstimate {
        SyncEstimate {
            estimated_server_now_ms: self.estimated_server_now_ms(),
            delta_ms: self.delta_ms(),
            round_trip_ms: self.round_trip_ms(),
            error_bound_ms: self.error_bound_ms(),
        }
    }
}

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
pub fn unix_time_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
