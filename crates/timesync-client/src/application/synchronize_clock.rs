//! SynchronizeClockUseCase: periodically estimates the bound server's clock.
//!
//! One cycle while bound:
//!
//! 1. Send `TIME` and time the round trip ([`TimeConnection::query`]).
//! 2. Report the estimate, or the error.
//! 3. Sleep the session's polling period.
//!
//! A reply that is not an integer keeps the session; the next cycle simply
//! tries again. Any socket-level failure (including a reply timeout) ends the
//! session and clears the registry, so the client rediscovers from scratch.
//!
//! [`TimeConnection::query`]: crate::infrastructure::network::connection::TimeConnection::query

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use timesync_core::{Classify, Endpoint, FailureKind, PollingPeriod, SyncEstimate};

use crate::application::registry::ServerRegistry;
use crate::application::session::BoundSession;

/// Sink for synchronization results.
///
/// The console implementation logs through `tracing`; tests record calls.
pub trait SyncReporter: Send + Sync {
    fn report_sync(&self, server: Endpoint, estimate: &SyncEstimate);

    fn report_error(&self, context: &str, error: &dyn Error);
}

/// What one [`Synchronizer::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No session to query.
    Unbound,
    /// An estimate was reported.
    Synced { period: PollingPeriod },
    /// The reply was unreadable; the session was kept.
    Malformed { period: PollingPeriod },
    /// The connection failed and the session was dropped.
    Disconnected { server: Endpoint },
}

/// Queries the bound server once per polling period.
pub struct Synchronizer {
    session: Arc<BoundSession>,
    registry: Arc<ServerRegistry>,
    reporter: Arc<dyn SyncReporter>,
    request_timeout: Duration,
}

impl Synchronizer {
    pub fn new(
        session: Arc<BoundSession>,
        registry: Arc<ServerRegistry>,
        reporter: Arc<dyn SyncReporter>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            session,
            registry,
            reporter,
            request_timeout,
        }
    }

    /// Runs one `TIME` exchange against the bound server, if any.
    pub async fn step(&self) -> SyncOutcome {
        let mut guard = self.session.lock().await;
        let Some(binding) = guard.binding() else {
            return SyncOutcome::Unbound;
        };
        let server = binding.endpoint();
        let period = binding.period;

        match binding.connection.query(self.request_timeout).await {
            Ok(sample) => {
                let estimate = sample.estimate();
                debug!(
                    "{server}: rtt {}ms, error bound ±{}ms",
                    estimate.round_trip_ms, estimate.error_bound_ms
                );
                self.reporter.report_sync(server, &estimate);
                SyncOutcome::Synced { period }
            }
            Err(e) if e.kind() == FailureKind::Malformed => {
                self.reporter.report_error("time reply", &e);
                SyncOutcome::Malformed { period }
            }
            Err(e) => {
                self.reporter.report_error("time request", &e);
                guard.unbind();
                self.registry.clear();
                SyncOutcome::Disconnected { server }
            }
        }
    }

    /// Runs cycles until `cancel` fires.
    ///
    /// While unbound the loop parks on the session's bound flag instead of
    /// polling.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                o = self.step() => o,
            };

            let pause = match outcome {
                SyncOutcome::Synced { period } | SyncOutcome::Malformed { period } => {
                    period.as_duration()
                }
                SyncOutcome::Unbound | SyncOutcome::Disconnected { .. } => {
                    if !self.session.wait_until(true, &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        debug!("synchronizer stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
