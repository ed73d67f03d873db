//! Integration tests for the server's TIME service and discovery responder.
//!
//! Everything runs on loopback so no multicast routing is needed: the
//! responder is given a plain UDP socket and a unicast reply target, and the
//! acceptor a listener on `127.0.0.1`.
//!
//! ```text
//! test client ──DISCOVER──► responder ──OFFER──► test client
//! test client ──TIME\n────► acceptor  ──ms\n───► test client
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

use timesync_core::{decode_offer, read_line_bounded, unix_time_ms, Endpoint};
use timesync_server::infrastructure::network::acceptor::run_acceptor;
use timesync_server::infrastructure::network::discovery::DiscoveryResponder;

const STEP: Duration = Duration::from_secs(2);

async fn start_acceptor() -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_acceptor(listener, cancel.clone()));
    (addr, cancel, handle)
}

async fn read_reply(reader: &mut BufReader<TcpStream>) -> Option<String> {
    tokio::time::timeout(STEP, read_line_bounded(reader, 64))
        .await
        .expect("reply within timeout")
        .expect("readable")
}

// ── TIME service ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_serves_repeated_time_requests_in_any_case() {
    // Arrange
    let (addr, cancel, _h) = start_acceptor().await;
    let mut reader = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut previous = 0i64;

    // Act / Assert
    for request in ["TIME\n", "time\n", "  TiMe \r\n"] {
        reader.get_mut().write_all(request.as_bytes()).await.unwrap();
        let reply = read_reply(&mut reader).await.expect("a reply line");
        let ms: i64 = reply.trim().parse().expect("decimal millis");
        assert!(ms >= previous, "server clock must not go backwards");
        previous = ms;
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_final_request_without_newline_is_served_on_half_close() {
    // Arrange
    let (addr, cancel, _h) = start_acceptor().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Act
    stream.write_all(b"TIME").await.unwrap();
    stream.shutdown().await.unwrap();
    let mut buf = String::new();
    tokio::time::timeout(STEP, stream.read_to_string(&mut buf))
        .await
        .expect("server must close after serving")
        .unwrap();

    // Assert
    let ms: i64 = buf.trim().parse().expect("one reply");
    assert!((ms - unix_time_ms()).abs() < 5_000);
    cancel.cancel();
}

#[tokio::test]
async fn test_bad_request_closes_only_that_session() {
    // Arrange
    let (addr, cancel, _h) = start_acceptor().await;
    let mut good = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut bad = TcpStream::connect(addr).await.unwrap();

    // Act
    bad.write_all(b"DATE\n").await.unwrap();
    let mut rest = Vec::new();
    let closed = tokio::time::timeout(STEP, bad.read_to_end(&mut rest)).await;
    good.get_mut().write_all(b"TIME\n").await.unwrap();
    let reply = read_reply(&mut good).await;

    // Assert
    assert!(closed.is_ok(), "bad session must be closed by the server");
    assert!(rest.is_empty(), "no reply to a non-TIME request");
    assert!(reply.is_some(), "good session must keep working");
    cancel.cancel();
}

#[tokio::test]
async fn test_many_concurrent_sessions_are_served() {
    let (addr, cancel, _h) = start_acceptor().await;

    let mut clients = Vec::new();
    for _ in 0..16 {
        clients.push(tokio::spawn(async move {
            let mut reader = BufReader::new(TcpStream::connect(addr).await.unwrap());
            reader.get_mut().write_all(b"TIME\n").await.unwrap();
            read_reply(&mut reader).await.is_some()
        }));
    }

    for client in clients {
        assert!(client.await.unwrap());
    }
    cancel.cancel();
}

#[tokio::test]
async fn test_shutdown_closes_idle_sessions_promptly() {
    // Arrange: one connected client that never sends anything.
    let (addr, cancel, handle) = start_acceptor().await;
    let mut idle = TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Act
    cancel.cancel();

    // Assert
    tokio::time::timeout(STEP, handle)
        .await
        .expect("acceptor must finish")
        .unwrap();
    let mut buf = Vec::new();
    let read = tokio::time::timeout(STEP, idle.read_to_end(&mut buf)).await;
    assert!(read.is_ok(), "idle session must observe the close");
}

// ── Discovery responder ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_responder_answers_discover_and_ignores_noise() {
    // Arrange
    let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server_socket.local_addr().unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let advertised = Endpoint::new("127.0.0.1".parse().unwrap(), 40_001);
    let responder =
        DiscoveryResponder::new(server_socket, advertised, client.local_addr().unwrap()).unwrap();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(responder.run(cancel.clone()));
    let mut buf = [0u8; 1024];

    // Act: noise first, then a lowercase request.
    client.send_to(b"HELLO", server_addr).await.unwrap();
    client.send_to(b"discover", server_addr).await.unwrap();
    let (len, _) = tokio::time::timeout(STEP, client.recv_from(&mut buf))
        .await
        .expect("offer within timeout")
        .unwrap();

    // Assert
    assert_eq!(decode_offer(&buf[..len]).unwrap(), vec![advertised]);

    cancel.cancel();
    let sent = tokio::time::timeout(STEP, task).await.unwrap().unwrap();
    assert_eq!(sent, 1, "noise must not produce an offer");
}
