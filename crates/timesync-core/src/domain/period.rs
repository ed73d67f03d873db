//! The polling period of a bound session.
//!
//! The operator picks how often the client asks the bound server for its
//! time. The value is a whole number of milliseconds inside inclusive bounds
//! (10 and 1000 by default); anything else is rejected so the caller can
//! re-prompt.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lower bound, in milliseconds.
pub const MIN_PERIOD_MS: u64 = 10;

/// Default upper bound, in milliseconds.
pub const MAX_PERIOD_MS: u64 = 1000;

/// Error returned when a polling period is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    /// The input is not an integer.
    #[error("polling period must be a whole number of milliseconds, got {0:?}")]
    NotANumber(String),
    /// The value falls outside the configured bounds.
    #[error("polling period {value}ms is outside [{min}, {max}]ms")]
    OutOfRange { value: i64, min: u64, max: u64 },
}

/// Inclusive bounds for [`PollingPeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBounds {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl PeriodBounds {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn contains(&self, value_ms: i64) -> bool {
        value_ms >= 0 && (self.min_ms..=self.max_ms).contains(&(value_ms as u64))
    }
}

impl Default for PeriodBounds {
    fn default() -> Self {
        Self::new(MIN_PERIOD_MS, MAX_PERIOD_MS)
    }
}

/// A validated polling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollingPeriod(u64);

impl PollingPeriod {
    /// Validates `value_ms` against the default bounds.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::OutOfRange`] outside `[10, 1000]`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use timesync_core::PollingPeriod;
    ///
    /// assert!(PollingPeriod::new(10).is_ok());
    /// assert!(PollingPeriod::new(1000).is_ok());
    /// assert!(PollingPeriod::new(9).is_err());
    /// assert!(PollingPeriod::new(1001).is_err());
    /// ```
    pub fn new(value_ms: i64) -> Result<Self, PeriodError> {
        Self::within(value_ms, PeriodBounds::default())
    }

    /// Validates `value_ms` against `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::OutOfRange`] when `bounds` does not contain the value.
    pub fn within(value_ms: i64, bounds: PeriodBounds) -> Result<Self, PeriodError> {
        if bounds.contains(value_ms) {
            Ok(Self(value_ms as u64))
        } else {
            Err(PeriodError::OutOfRange {
                value: value_ms,
                min: bounds.min_ms,
                max: bounds.max_ms,
            })
        }
    }

    /// Parses operator input, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::NotANumber`] for non-integer input and
    /// [`PeriodError::OutOfRange`] for integers outside `bounds`.
    pub fn parse(input: &str, bounds: PeriodBounds) -> Result<Self, PeriodError> {
        let trimmed = input.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| PeriodError::NotANumber(trimmed.to_string()))?;
        Self::within(value, bounds)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}
