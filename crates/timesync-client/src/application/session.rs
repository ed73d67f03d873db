//! The bound session: at most one connection to a chosen server, plus the
//! polling period the operator picked for it.
//!
//! # Two views of one state (for beginners)
//!
//! The connection itself lives behind a `tokio::sync::Mutex` because the
//! synchronizer holds it across an `.await` while a `TIME` round trip is in
//! flight. The discovery loops only need to know *whether* a session exists,
//! and they must not queue behind that mutex, so a `watch` channel mirrors the
//! bound flag. Every transition updates both while the mutex is held, so the
//! flag never disagrees with the slot for longer than one method call.

use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::info;

use timesync_core::{Endpoint, PollingPeriod};

use crate::infrastructure::network::connection::TimeConnection;

/// A live connection and its polling period.
#[derive(Debug)]
pub struct Binding {
    pub connection: TimeConnection,
    pub period: PollingPeriod,
}

impl Binding {
    pub fn new(connection: TimeConnection, period: PollingPeriod) -> Self {
        Self { connection, period }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.connection.endpoint()
    }
}

/// Holder of the single [`Binding`].
#[derive(Debug)]
pub struct BoundSession {
    slot: Mutex<Option<Binding>>,
    bound: watch::Sender<bool>,
}

impl Default for BoundSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundSession {
    pub fn new() -> Self {
        let (bound, _) = watch::channel(false);
        Self {
            slot: Mutex::new(None),
            bound,
        }
    }

    /// Installs `binding`, replacing (and closing) any previous one.
    pub async fn bind(&self, binding: Binding) {
        let mut slot = self.slot.lock().await;
        info!(
            "bound to {} polling every {}ms",
            binding.endpoint(),
            binding.period.as_millis()
        );
        *slot = Some(binding);
        self.bound.send_replace(true);
    }

    /// Drops the current binding, closing its connection.
    ///
    /// Returns the endpoint that was bound, if any.
    pub async fn unbind(&self) -> Option<Endpoint> {
        let mut slot = self.slot.lock().await;
        Self::unbind_locked(&self.bound, &mut slot)
    }

    /// Locks the slot for a caller that needs the connection.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            slot: self.slot.lock().await,
            bound: &self.bound,
        }
    }

    pub fn is_bound(&self) -> bool {
        *self.bound.borrow()
    }

    /// Waits until the bound flag equals `bound`.
    ///
    /// Returns `false` if `cancel` fired first.
    pub async fn wait_until(&self, bound: bool, cancel: &CancellationToken) -> bool {
        let mut rx = self.bound.subscribe();
        tokio::select! {
            _ = cancel.cancelled() => false,
            r = rx.wait_for(|v| *v == bound) => r.is_ok(),
        }
    }

    fn unbind_locked(bound: &watch::Sender<bool>, slot: &mut Option<Binding>) -> Option<Endpoint> {
        let endpoint = slot.take().map(|b| b.endpoint());
        bound.send_replace(false);
        if let Some(endpoint) = endpoint {
            info!("unbound from {endpoint}");
        }
        endpoint
    }
}

/// Exclusive access to the session slot.
pub struct SessionGuard<'a> {
    slot: MutexGuard<'a, Option<Binding>>,
    bound: &'a watch::Sender<bool>,
}

impl SessionGuard<'_> {
    pub fn binding(&mut self) -> Option<&mut Binding> {
        self.slot.as_mut()
    }

    /// Drops the binding while the lock is already held.
    pub fn unbind(&mut self) -> Option<Endpoint> {
        BoundSession::unbind_locked(self.bound, &mut self.slot)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn connection() -> (TcpListener, TimeConnection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = Endpoint::from(listener.local_addr().unwrap());
        let conn = TimeConnection::connect(endpoint, Duration::from_secs(2))
            .await
            .unwrap();
        (listener, conn)
    }

    #[tokio::test]
    async fn test_new_session_is_unbound() {
        let session = BoundSession::new();
        assert!(!session.is_bound());
        assert!(session.lock().await.binding().is_none());
    }

    #[tokio::test]
    async fn test_bind_then_unbind_flips_flag() {
        // Arrange
        let session = BoundSession::new();
        let (_listener, conn) = connection().await;
        let endpoint = conn.endpoint();

        // Act
        session
            .bind(Binding::new(conn, PollingPeriod::new(100).unwrap()))
            .await;
        let bound = session.is_bound();
        let released = session.unbind().await;

        // Assert
        assert!(bound);
        assert_eq!(released, Some(endpoint));
        assert!(!session.is_bound());
    }

    #[tokio::test]
    async fn test_guard_unbind_clears_slot() {
        let session = BoundSession::new();
        let (_listener, conn) = connection().await;
        session
            .bind(Binding::new(conn, PollingPeriod::new(10).unwrap()))
            .await;

        {
            let mut guard = session.lock().await;
            assert!(guard.binding().is_some());
            assert!(guard.unbind().is_some());
        }

        assert!(!session.is_bound());
        assert!(session.lock().await.binding().is_none());
    }

    #[tokio::test]
    async fn test_wait_until_wakes_on_bind() {
        // Arrange
        let session = std::sync::Arc::new(BoundSession::new());
        let cancel = CancellationToken::new();
        let waiter = {
            let session = session.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { session.wait_until(true, &cancel).await })
        };
        let (_listener, conn) = connection().await;

        // Act
        session
            .bind(Binding::new(conn, PollingPeriod::new(10).unwrap()))
            .await;

        // Assert
        let woke = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter must wake")
            .unwrap();
        assert!(woke);
    }

    #[tokio::test]
    async fn test_wait_until_returns_false_on_cancel() {
        let session = BoundSession::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!session.wait_until(true, &cancel).await);
    }

    #[tokio::test]
    async fn test_wait_until_current_state_returns_immediately() {
        let session = BoundSession::new();
        let cancel = CancellationToken::new();
        assert!(session.wait_until(false, &cancel).await);
    }
}
