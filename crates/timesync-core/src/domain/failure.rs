//! The closed error taxonomy shared by every loop.
//!
//! Module errors stay specific (`ProtocolError`, `SocketError`, …) but each
//! one maps to exactly one [`FailureKind`], and loops decide what to do by
//! switching on the kind:
//!
//! | Kind        | Example                              | Handling                          |
//! |-------------|--------------------------------------|-----------------------------------|
//! | `Transient` | timeout, refused, reset              | log one line, fall back, continue |
//! | `Malformed` | bad JSON offer, non-numeric time     | drop the exchange, continue       |
//! | `Disposed`  | socket closed by shutdown            | stop quietly                      |
//! | `Fatal`     | cannot bind a port or join a group   | stop the affected component       |

use std::io;

/// Coarse category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Malformed,
    Disposed,
    Fatal,
}

impl FailureKind {
    /// Whether the component that hit this failure should keep running.
    pub fn is_recoverable(self) -> bool {
        matches!(self, FailureKind::Transient | FailureKind::Malformed)
    }
}

/// Implemented by every error type that crosses a component boundary.
pub trait Classify {
    fn kind(&self) -> FailureKind;
}

impl Classify for io::Error {
    fn kind(&self) -> FailureKind {
        classify_io(self)
    }
}

/// Maps an I/O error from an established socket to a [`FailureKind`].
///
/// Bind-time errors are wrapped by the caller as fatal; this function only
/// sees errors from sockets that already exist.
pub fn classify_io(e: &io::Error) -> FailureKind {
    match e.kind() {
        io::ErrorKind::InvalidData => FailureKind::Malformed,
        io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied => FailureKind::Fatal,
        _ => FailureKind::Transient,
    }
}

/// Like [`classify_io`], but for a loop that may already be shutting down.
///
/// A socket error observed after shutdown began is [`FailureKind::Disposed`]
/// whatever its OS kind, so the loop stops without logging it as a fault.
pub fn classify_io_during_shutdown(e: &io::Error, shutting_down: bool) -> FailureKind {
    if shutting_down {
        FailureKind::Disposed
    } else {
        classify_io(e)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_after_shutdown_are_disposed() {
        // Arrange
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let in_use = io::Error::new(io::ErrorKind::AddrInUse, "in use");

        // Act / Assert
        assert_eq!(classify_io_during_shutdown(&reset, true), FailureKind::Disposed);
        assert_eq!(classify_io_during_shutdown(&in_use, true), FailureKind::Disposed);
    }

    #[test]
    fn test_errors_before_shutdown_keep_their_kind() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(classify_io_during_shutdown(&reset, false), FailureKind::Transient);
    }

    #[test]
    fn test_connection_errors_are_transient() {
        for kind in [
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
            io::ErrorKind::TimedOut,
        ] {
            let e = io::Error::new(kind, "net");
            assert_eq!(classify_io(&e), FailureKind::Transient, "{kind:?}");
        }
    }

    #[test]
    fn test_invalid_data_is_malformed() {
        let e = io::Error::new(io::ErrorKind::InvalidData, "not utf-8");
        assert_eq!(Classify::kind(&e), FailureKind::Malformed);
    }

    #[test]
    fn test_addr_in_use_is_fatal() {
        let e = io::Error::new(io::ErrorKind::AddrInUse, "in use");
        assert_eq!(classify_io(&e), FailureKind::Fatal);
    }

    #[test]
    fn test_only_transient_and_malformed_are_recoverable() {
        assert!(FailureKind::Transient.is_recoverable());
        assert!(FailureKind::Malformed.is_recoverable());
        assert!(!FailureKind::Disposed.is_recoverable());
        assert!(!FailureKind::Fatal.is_recoverable());
    }
}
