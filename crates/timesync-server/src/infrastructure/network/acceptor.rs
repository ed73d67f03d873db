//! TCP connection acceptor and `TIME` session handler.
//!
//! The acceptor owns one listener per advertised interface. Every accepted
//! connection gets its own Tokio task so a slow or idle client never blocks
//! the others. There is no connection limit.
//!
//! # Session protocol
//!
//! ```text
//! client: TIME\n
//! server: 1700000000123\n
//! client: time\n
//! server: 1700000000140\n
//! client: HELLO\n          (anything but TIME)
//! server: <closes the connection>
//! ```
//!
//! A session also ends on EOF or any socket error. None of these affect other
//! sessions or the acceptor itself.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use timesync_core::protocol::messages::MAX_LINE_LEN;
use timesync_core::{
    classify_io_during_shutdown, encode_time_reply, is_time_request, read_line_bounded,
    unix_time_ms, FailureKind,
};

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Accepts connections on `listener` until `cancel` fires.
///
/// On cancellation every open session observes the same token, closes its
/// socket, and is awaited before this function returns.
pub async fn run_acceptor(listener: TcpListener, cancel: CancellationToken) {
    let local = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!("time service listening on TCP {local}");

    let mut sessions = JoinSet::new();

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            r = listener.accept() => r,
        };

        match accepted {
            Ok((stream, peer)) => {
                let token = cancel.clone();
                sessions.spawn(async move {
                    handle_session(stream, peer, token).await;
                });
            }
            Err(e) => match classify_io_during_shutdown(&e, cancel.is_cancelled()) {
                FailureKind::Disposed => break,
                kind if kind.is_recoverable() => warn!("accept error on {local}: {e}"),
                _ => {
                    warn!("time service on {local} stopped: {e}");
                    break;
                }
            },
        }

        // Reap finished sessions so the set does not grow without bound.
        while sessions.try_join_next().is_some() {}
    }

    drop(listener);
    while sessions.join_next().await.is_some() {}
    info!("time service on {local} stopped");
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Logs the outcome of [`serve_time_session`].
async fn handle_session(stream: TcpStream, peer: SocketAddr, cancel: CancellationToken) {
    info!("client {peer} connected");
    match serve_time_session(stream, peer, cancel).await {
        Ok(served) => info!("client {peer} closed after {served} time requests"),
        Err(e) => info!("client {peer} closed: {e}"),
    }
}

/// Answers `TIME` requests on `stream` until the client sends anything else,
/// disconnects, or `cancel` fires.
///
/// Returns the number of requests served.
///
/// # Errors
///
/// Returns the socket error that ended the session, including
/// [`io::ErrorKind::InvalidData`] for non-UTF-8 or over-long requests.
pub async fn serve_time_session(
    stream: TcpStream,
    peer: SocketAddr,
    cancel: CancellationToken,
) -> io::Result<u64> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut served = 0u64;

    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            r = read_line_bounded(&mut reader, MAX_LINE_LEN) => r?,
        };

        let Some(request) = request else { break };
        if !is_time_request(&request) {
            debug!("client {peer} sent {:?}; closing", request.trim());
            break;
        }

        let now = unix_time_ms();
        write_half.write_all(&encode_time_reply(now)).await?;
        served += 1;
        debug!("sent time {now} to {peer}");
    }

    // Best effort: the peer may already be gone.
    let _ = write_half.shutdown().await;
    Ok(served)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    async fn start() -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_acceptor(listener, cancel.clone()));
        (addr, cancel, handle)
    }

    #[tokio::test]
    async fn test_time_request_gets_current_unix_millis() {
        // Arrange
        let (addr, cancel, _h) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let before = unix_time_ms();

        // Act
        stream.write_all(b"TIME\n").await.unwrap();
        let mut reader = BufReader::new(&mut stream);
        let line = read_line_bounded(&mut reader, 64).await.unwrap().unwrap();
        let after = unix_time_ms();

        // Assert
        let server_ms: i64 = line.trim().parse().unwrap();
        assert!(line.ends_with('\n'));
        assert!((before..=after).contains(&server_ms));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unknown_request_closes_session() {
        // Arrange
        let (addr, cancel, _h) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        // Act
        stream.write_all(b"HELLO\n").await.unwrap();
        let mut buf = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf))
            .await
            .expect("server must close");

        // Assert
        assert_eq!(read.unwrap_or(0), 0);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_cancel_stops_acceptor_and_open_sessions() {
        // Arrange
        let (addr, cancel, handle) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"TIME\n").await.unwrap();
        let mut first = [0u8; 1];
        stream.read_exact(&mut first).await.unwrap();

        // Act
        cancel.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(2), handle).await;

        // Assert
        assert!(joined.is_ok(), "acceptor must return after cancellation");
        let mut rest = Vec::new();
        let closed =
            tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut rest)).await;
        assert!(closed.is_ok(), "open session must be closed");
        assert!(TcpStream::connect(addr).await.is_err(), "listener must be closed");
    }
}
