//! Terminal adapters: the interactive [`Operator`] and the `tracing`-backed
//! [`SyncReporter`].
//!
//! # Reading stdin without blocking the runtime (for beginners)
//!
//! `std::io::stdin().read_line` blocks its thread. A dedicated thread reads
//! lines and forwards them over an unbounded channel; the async side awaits
//! the channel, so cancellation and other tasks keep running while the
//! operator thinks. When stdin reaches EOF the thread exits, the channel
//! closes, and every further prompt returns [`OperatorError::InputClosed`].

pub mod mock;

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::thread;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use timesync_core::{Endpoint, PeriodBounds, PollingPeriod, SyncEstimate};

use crate::application::select_server::{parse_choice, Operator, OperatorError};
use crate::application::synchronize_clock::SyncReporter;

// ── Operator ──────────────────────────────────────────────────────────────────

/// Prompts on stdout and reads answers line by line.
pub struct ConsoleOperator {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl ConsoleOperator {
    /// Starts the stdin reader thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn_stdin() -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("timesync-stdin".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self::from_lines(rx))
    }

    /// Uses an existing line source instead of stdin.
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
        }
    }

    async fn next_line(&self) -> Result<String, OperatorError> {
        self.lines
            .lock()
            .await
            .recv()
            .await
            .ok_or(OperatorError::InputClosed)
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = io::stdout().flush();
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn choose_server(
        &self,
        servers: &[Endpoint],
        default: Option<usize>,
    ) -> Result<usize, OperatorError> {
        loop {
            println!("Available time servers:");
            for (i, server) in servers.iter().enumerate() {
                let marker = if Some(i) == default { "  (last used)" } else { "" };
                println!("  {}) {server}{marker}", i + 1);
            }
            match default {
                Some(d) => prompt(&format!("Choose a server [{}]: ", d + 1)),
                None => prompt("Choose a server: "),
            }

            let line = self.next_line().await?;
            match parse_choice(&line, servers.len(), default) {
                Ok(index) => return Ok(index),
                Err(e) => println!("{e}"),
            }
        }
    }

    async fn choose_period(
        &self,
        server: Endpoint,
        bounds: PeriodBounds,
    ) -> Result<PollingPeriod, OperatorError> {
        loop {
            prompt(&format!(
                "Polling period for {server} in ms ({}-{}): ",
                bounds.min_ms, bounds.max_ms
            ));
            let line = self.next_line().await?;
            match PollingPeriod::parse(&line, bounds) {
                Ok(period) => return Ok(period),
                Err(e) => println!("{e}"),
            }
        }
    }
}

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Renders Unix milliseconds as RFC 3339 UTC with millisecond precision.
///
/// Values outside chrono's range fall back to the raw number.
pub fn format_unix_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("{ms}ms"))
}

/// One-line summary of an estimate.
pub fn format_estimate(estimate: &SyncEstimate) -> String {
    format!(
        "server time {} (offset {:+}ms, rtt {}ms, ±{}ms)",
        format_unix_ms(estimate.estimated_server_now_ms),
        estimate.delta_ms,
        estimate.round_trip_ms,
        estimate.error_bound_ms
    )
}

/// Logs every report through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl SyncReporter for TracingReporter {
    fn report_sync(&self, server: Endpoint, estimate: &SyncEstimate) {
        info!("{server}: {}", format_estimate(estimate));
    }

    fn report_error(&self, context: &str, error: &dyn Error) {
        warn!("{context}: {error}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn servers() -> Vec<Endpoint> {
        vec![
            Endpoint::new("10.0.0.1".parse().unwrap(), 5000),
            Endpoint::new("10.0.0.2".parse().unwrap(), 5001),
        ]
    }

    fn operator_with(lines: &[&str]) -> ConsoleOperator {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        ConsoleOperator::from_lines(rx)
    }

    #[tokio::test]
    async fn test_choose_server_reprompts_until_valid() {
        // Arrange: empty without default, out of range, text, then a valid pick.
        let operator = operator_with(&["", "3", "first", "2"]);

        // Act
        let index = operator.choose_server(&servers(), None).await;

        // Assert
        assert_eq!(index, Ok(1));
    }

    #[tokio::test]
    async fn test_choose_server_accepts_default_on_empty_line() {
        let operator = operator_with(&[""]);
        assert_eq!(operator.choose_server(&servers(), Some(0)).await, Ok(0));
    }

    #[tokio::test]
    async fn test_choose_period_rejects_out_of_bounds() {
        let operator = operator_with(&["9", "1001", "abc", "1000"]);

        let period = operator
            .choose_period(servers()[0], PeriodBounds::default())
            .await
            .unwrap();

        assert_eq!(period.as_millis(), 1000);
    }

    #[tokio::test]
    async fn test_closed_input_is_reported() {
        let operator = operator_with(&["nope"]);
        assert_eq!(
            operator.choose_server(&servers(), None).await,
            Err(OperatorError::InputClosed)
        );
    }

    #[test]
    fn test_format_unix_ms_is_rfc3339_millis() {
        assert_eq!(format_unix_ms(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
        assert_eq!(format_unix_ms(0), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_format_estimate_signs_offset() {
        let estimate = SyncEstimate {
            estimated_server_now_ms: 0,
            delta_ms: -42,
            round_trip_ms: 8,
            error_bound_ms: 4,
        };
        let text = format_estimate(&estimate);
        assert!(text.contains("offset -42ms"), "{text}");
        assert!(text.contains("±4ms"), "{text}");
    }
}
