//! Scripted operator and recording reporter for tests.
//!
//! Lets tests drive the selector and observe the synchronizer without a
//! terminal.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use timesync_core::{Endpoint, PeriodBounds, PollingPeriod, SyncEstimate};

use crate::application::select_server::{Operator, OperatorError};
use crate::application::synchronize_clock::SyncReporter;

/// An [`Operator`] that answers from queued values.
///
/// `choose_server` pops the next queued index; with an empty queue it accepts
/// the offered default, and without one it reports closed input.
/// `choose_period` pops the next queued period or reports closed input.
pub struct ScriptedOperator {
    choices: Mutex<VecDeque<usize>>,
    periods: Mutex<VecDeque<PollingPeriod>>,
    defaults_seen: Arc<Mutex<Vec<Option<usize>>>>,
}

impl ScriptedOperator {
    pub fn new(
        choices: impl IntoIterator<Item = usize>,
        periods: impl IntoIterator<Item = PollingPeriod>,
    ) -> Self {
        Self {
            choices: Mutex::new(choices.into_iter().collect()),
            periods: Mutex::new(periods.into_iter().collect()),
            defaults_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The `default` argument of every `choose_server` call so far.
    pub fn defaults_seen(&self) -> Arc<Mutex<Vec<Option<usize>>>> {
        self.defaults_seen.clone()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn choose_server(
        &self,
        _servers: &[Endpoint],
        default: Option<usize>,
    ) -> Result<usize, OperatorError> {
        self.defaults_seen
            .lock()
            .expect("lock poisoned")
            .push(default);
        self.choices
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .or(default)
            .ok_or(OperatorError::InputClosed)
    }

    async fn choose_period(
        &self,
        _server: Endpoint,
        _bounds: PeriodBounds,
    ) -> Result<PollingPeriod, OperatorError> {
        self.periods
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or(OperatorError::InputClosed)
    }
}

/// A [`SyncReporter`] that keeps every report.
#[derive(Default)]
pub struct RecordingReporter {
    syncs: Mutex<Vec<(Endpoint, SyncEstimate)>>,
    errors: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn syncs(&self) -> Vec<(Endpoint, SyncEstimate)> {
        self.syncs.lock().expect("lock poisoned").clone()
    }

    /// `(context, message)` pairs.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().expect("lock poisoned").clone()
    }
}

impl SyncReporter for RecordingReporter {
    fn report_sync(&self, server: Endpoint, estimate: &SyncEstimate) {
        self.syncs
            .lock()
            .expect("lock poisoned")
            .push((server, *estimate));
    }

    fn report_error(&self, context: &str, error: &dyn Error) {
        self.errors
            .lock()
            .expect("lock poisoned")
            .push((context.to_string(), error.to_string()));
    }
}
