//! SelectServerUseCase: moves the client from Unbound to Bound.
//!
//! # State machine
//!
//! ```text
//!            registry empty / bound
//!   ┌──────────────────────────────┐
//!   ▼                              │
//! Unbound ──choice──► connect ──ok──► save cache ──► period ──► Bound
//!   ▲                   │
//!   └──── remove addr ◄─┘ (timeout, refused, I/O)
//! ```
//!
//! Bound → Unbound is driven by the synchronizer; this loop only waits for it.
//!
//! # Architecture
//!
//! The use case depends only on the [`Operator`] and [`AddressCache`] traits
//! plus the shared registry and session. The console and file implementations
//! live in `infrastructure`, so every transition is testable with scripted
//! input and a mock cache.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use timesync_core::{Endpoint, NetworkConfig, PeriodBounds, PollingPeriod};

use crate::application::registry::ServerRegistry;
use crate::application::session::{Binding, BoundSession};
use crate::infrastructure::network::connection::{ClientError, TimeConnection};

// ── Seams ─────────────────────────────────────────────────────────────────────

/// Error type for the last-used address cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error accessing address cache at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("address cache at {path} holds {content:?}, not an IP address")]
    Parse { path: PathBuf, content: String },
}

/// Remembers the address of the last server the client bound to.
#[cfg_attr(test, mockall::automock)]
pub trait AddressCache: Send + Sync {
    /// Replaces the cached address.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the cache cannot be written.
    fn save(&self, address: IpAddr) -> Result<(), CacheError>;

    /// Returns the cached address, or `None` if nothing was cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the cache exists but cannot be read.
    fn load(&self) -> Result<Option<IpAddr>, CacheError>;
}

/// Error type for operator interaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperatorError {
    /// The input stream ended; no further choices can be made.
    #[error("operator input closed")]
    InputClosed,
}

/// The person (or script) choosing a server and a polling period.
///
/// Implementations re-prompt on invalid input and only return validated
/// values.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Presents `servers` (numbered from 1) and returns the chosen 0-based
    /// index. `default` is the index picked by empty input, if any.
    async fn choose_server(
        &self,
        servers: &[Endpoint],
        default: Option<usize>,
    ) -> Result<usize, OperatorError>;

    /// Asks for the polling period for `server`.
    async fn choose_period(
        &self,
        server: Endpoint,
        bounds: PeriodBounds,
    ) -> Result<PollingPeriod, OperatorError>;
}

// ── Choice parsing ────────────────────────────────────────────────────────────

/// Rejected menu input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChoiceError {
    #[error("a choice is required")]
    Empty,

    #[error("{0:?} is not a number")]
    NotANumber(String),

    #[error("choice {value} is outside 1..={count}")]
    OutOfRange { value: i64, count: usize },
}

/// Parses a 1-based menu choice into a 0-based index.
///
/// Empty input selects `default` when one is given.
///
/// # Errors
///
/// - [`ChoiceError::Empty`] for empty input without a default.
/// - [`ChoiceError::NotANumber`] for non-integer input.
/// - [`ChoiceError::OutOfRange`] for integers outside `1..=count`.
///
/// # Examples
///
/// ```rust
/// use timesync_client::application::select_server::{parse_choice, ChoiceError};
///
/// assert_eq!(parse_choice("2", 3, None), Ok(1));
/// assert_eq!(parse_choice("", 3, Some(2)), Ok(2));
/// assert_eq!(parse_choice("", 3, None), Err(ChoiceError::Empty));
/// ```
pub fn parse_choice(input: &str, count: usize, default: Option<usize>) -> Result<usize, ChoiceError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return default.filter(|d| *d < count).ok_or(ChoiceError::Empty);
    }
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ChoiceError::NotANumber(trimmed.to_string()))?;
    if value < 1 || value as u64 > count as u64 {
        return Err(ChoiceError::OutOfRange { value, count });
    }
    Ok(value as usize - 1)
}

// ── Use case ──────────────────────────────────────────────────────────────────

/// Timing and bounds the selector works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorSettings {
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub period_bounds: PeriodBounds,
}

impl From<&NetworkConfig> for SelectorSettings {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            connect_timeout: network.connect_timeout(),
            poll_interval: network.selection_poll_interval(),
            period_bounds: network.period_bounds(),
        }
    }
}

/// Result of one selection attempt.
#[derive(Debug)]
pub enum SelectorOutcome {
    /// Nothing to do: already bound, or no servers known.
    Idle,
    /// Connected and bound.
    ServerSelected {
        endpoint: Endpoint,
        period: PollingPeriod,
    },
    /// Connecting failed; the address was removed from the registry.
    SelectionFailed {
        endpoint: Endpoint,
        error: ClientError,
    },
}

/// Drives the Unbound → Bound transition.
pub struct Selector {
    registry: Arc<ServerRegistry>,
    session: Arc<BoundSession>,
    operator: Arc<dyn Operator>,
    cache: Arc<dyn AddressCache>,
    settings: SelectorSettings,
}

impl Selector {
    pub fn new(
        registry: Arc<ServerRegistry>,
        session: Arc<BoundSession>,
        operator: Arc<dyn Operator>,
        cache: Arc<dyn AddressCache>,
        settings: SelectorSettings,
    ) -> Self {
        Self {
            registry,
            session,
            operator,
            cache,
            settings,
        }
    }

    /// Makes one selection attempt.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError`] when the operator can no longer answer.
    pub async fn step(&self) -> Result<SelectorOutcome, OperatorError> {
        if self.session.is_bound() {
            return Ok(SelectorOutcome::Idle);
        }
        let servers = self.registry.snapshot();
        if servers.is_empty() {
            return Ok(SelectorOutcome::Idle);
        }

        let default = self.cached_choice(&servers);
        let index = self.operator.choose_server(&servers, default).await?;
        let Some(chosen) = servers.get(index).copied() else {
            warn!("operator chose entry {index} of {}; ignoring", servers.len());
            return Ok(SelectorOutcome::Idle);
        };
        // Offers may have moved the port while the operator was deciding.
        let endpoint = self.registry.get(chosen.address).unwrap_or(chosen);

        info!("connecting to {endpoint}");
        let connection = match TimeConnection::connect(endpoint, self.settings.connect_timeout).await
        {
            Ok(connection) => connection,
            Err(error) => {
                self.registry.remove(endpoint.address);
                warn!("{error}; removed {} from the server list", endpoint.address);
                return Ok(SelectorOutcome::SelectionFailed { endpoint, error });
            }
        };

        if let Err(e) = self.cache.save(endpoint.address) {
            warn!("could not remember {}: {e}", endpoint.address);
        }

        let period = self
            .operator
            .choose_period(endpoint, self.settings.period_bounds)
            .await?;
        self.session.bind(Binding::new(connection, period)).await;

        Ok(SelectorOutcome::ServerSelected { endpoint, period })
    }

    /// Runs selection attempts until `cancel` fires or operator input ends.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if self.session.is_bound() {
                if !self.session.wait_until(false, &cancel).await {
                    break;
                }
                continue;
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.step() => r,
            };
            match outcome {
                Ok(SelectorOutcome::ServerSelected { .. }) => continue,
                Ok(SelectorOutcome::Idle) | Ok(SelectorOutcome::SelectionFailed { .. }) => {}
                Err(e) => {
                    warn!("server selection stopped: {e}");
                    break;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        debug!("selector stopped");
    }

    fn cached_choice(&self, servers: &[Endpoint]) -> Option<usize> {
        match self.cache.load() {
            Ok(Some(address)) => servers.iter().position(|e| e.address == address),
            Ok(None) => None,
            Err(e) => {
                warn!("ignoring address cache: {e}");
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
