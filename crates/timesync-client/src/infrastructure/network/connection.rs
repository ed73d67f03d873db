//! TCP connection to the bound server.
//!
//! One [`TimeConnection`] exists per bound session. Each [`query`] is one
//! complete round trip:
//!
//! ```text
//! t1 = now
//! send  "TIME\n"
//! recv  "<server ms>\n"
//! t2 = now
//! ```
//!
//! The connection keeps a buffered reader across queries because a reply may
//! arrive split across several TCP segments.
//!
//! [`query`]: TimeConnection::query

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use timesync_core::protocol::messages::MAX_LINE_LEN;
use timesync_core::{
    classify_io, decode_time_reply, encode_time_request, read_line_bounded, unix_time_ms,
    Classify, Endpoint, FailureKind, OffsetSample, ProtocolError,
};

/// Errors talking to a time server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connecting to {endpoint} timed out after {after:?}")]
    ConnectTimeout { endpoint: Endpoint, after: Duration },

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("no reply from {endpoint} within {after:?}")]
    RequestTimeout { endpoint: Endpoint, after: Duration },

    #[error("connection to {endpoint} failed: {source}")]
    Io {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("{endpoint} closed the connection")]
    Closed { endpoint: Endpoint },

    #[error("bad reply from {endpoint}: {source}")]
    Malformed {
        endpoint: Endpoint,
        #[source]
        source: ProtocolError,
    },
}

impl Classify for ClientError {
    fn kind(&self) -> FailureKind {
        match self {
            ClientError::Malformed { .. } => FailureKind::Malformed,
            ClientError::Io { source, .. } | ClientError::Connect { source, .. } => {
                classify_io(source)
            }
            _ => FailureKind::Transient,
        }
    }
}

/// An open connection to a time server.
#[derive(Debug)]
pub struct TimeConnection {
    endpoint: Endpoint,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TimeConnection {
    /// Connects to `endpoint`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`ClientError::ConnectTimeout`] on expiry, [`ClientError::Connect`] for
    /// refusal and any other I/O failure.
    pub async fn connect(endpoint: Endpoint, timeout: Duration) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint.socket_addr()))
            .await
            .map_err(|_| ClientError::ConnectTimeout {
                endpoint,
                after: timeout,
            })?
            .map_err(|source| ClientError::Connect { endpoint, source })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY for {endpoint}: {e}");
        }

        let (read_half, writer) = stream.into_split();
        Ok(Self {
            endpoint,
            reader: BufReader::new(read_half),
            writer,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Performs one `TIME` round trip bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Malformed`] if the reply is not an integer, including
    ///   replies that are not UTF-8 or are too long. The stream stays usable.
    /// - [`ClientError::RequestTimeout`], [`ClientError::Io`], or
    ///   [`ClientError::Closed`] for failures after which the stream is not
    ///   usable.
    pub async fn query(&mut self, timeout: Duration) -> Result<OffsetSample, ClientError> {
        let endpoint = self.endpoint;
        let t1 = unix_time_ms();

        let reply = tokio::time::timeout(timeout, self.round_trip())
            .await
            .map_err(|_| ClientError::RequestTimeout {
                endpoint,
                after: timeout,
            })??;

        let t2 = unix_time_ms();
        let server_ms = decode_time_reply(&reply)
            .map_err(|source| ClientError::Malformed { endpoint, source })?;

        Ok(OffsetSample::new(server_ms, t1, t2))
    }

    async fn round_trip(&mut self) -> Result<String, ClientError> {
        let endpoint = self.endpoint;
        self.writer
            .write_all(&encode_time_request())
            .await
            .map_err(|source| ClientError::Io { endpoint, source })?;

        match read_line_bounded(&mut self.reader, MAX_LINE_LEN).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(ClientError::Closed { endpoint }),
            // The bad line has been consumed; the stream is still aligned.
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Err(ClientError::Malformed {
                endpoint,
                source: ProtocolError::MalformedTime(e.to_string()),
            }),
            Err(source) => Err(ClientError::Io { endpoint, source }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
