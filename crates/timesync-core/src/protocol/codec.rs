//! ASCII codec for the discovery and time-sync protocols.
//!
//! Wire formats:
//! ```text
//! discovery request : DISCOVER
//! discovery reply   : OFFER<json endpoint | json endpoint array>
//! time request      : TIME\n
//! time reply        : <decimal unix milliseconds>\n
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::domain::endpoint::Endpoint;
use crate::domain::failure::{Classify, FailureKind};
use crate::protocol::messages::{
    DiscoveryMessage, DISCOVER_KEYWORD, LINE_TERMINATOR, OFFER_KEYWORD, TIME_KEYWORD,
};

/// Errors that can occur while decoding or encoding protocol messages.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The payload contains bytes outside the ASCII range.
    #[error("payload is not ASCII")]
    NotAscii,

    /// The payload does not start with any known keyword.
    #[error("unrecognized message: {0:?}")]
    UnknownKeyword(String),

    /// The text after `OFFER` is not a valid endpoint or endpoint list.
    #[error("malformed offer body: {0}")]
    MalformedOffer(String),

    /// The offer decoded to an empty endpoint list.
    #[error("offer carries no endpoints")]
    EmptyOffer,

    /// The time reply is not an integer millisecond timestamp.
    #[error("time reply is not an integer millisecond timestamp: {0:?}")]
    MalformedTime(String),

    /// An endpoint could not be serialized.
    #[error("failed to serialize endpoint: {0}")]
    Serialize(String),
}

impl Classify for ProtocolError {
    fn kind(&self) -> FailureKind {
        FailureKind::Malformed
    }
}

/// Offer bodies come in two shapes; both decode to a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OfferBody {
    One(Endpoint),
    Many(Vec<Endpoint>),
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Returns the bytes of a `DISCOVER` datagram.
pub fn encode_discover() -> Vec<u8> {
    DISCOVER_KEYWORD.as_bytes().to_vec()
}

/// Returns `true` when `payload`, trimmed, equals `DISCOVER` ignoring case.
pub fn is_discover_request(payload: &[u8]) -> bool {
    std::str::from_utf8(payload)
        .map(|text| text.trim().eq_ignore_ascii_case(DISCOVER_KEYWORD))
        .unwrap_or(false)
}

/// Encodes an `OFFER` datagram advertising `endpoint`.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if the endpoint cannot be rendered as
/// JSON.
///
/// # Examples
///
/// ```rust
/// use timesync_core::{decode_offer, encode_offer, Endpoint};
///
/// let endpoint = Endpoint::new("10.0.0.5".parse().unwrap(), 5000);
/// let bytes = encode_offer(&endpoint).unwrap();
/// assert!(bytes.starts_with(b"OFFER{"));
/// assert_eq!(decode_offer(&bytes).unwrap(), vec![endpoint]);
/// ```
pub fn encode_offer(endpoint: &Endpoint) -> Result<Vec<u8>, ProtocolError> {
    let json =
        serde_json::to_string(endpoint).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    Ok(format!("{OFFER_KEYWORD}{json}").into_bytes())
}

/// Decodes the endpoints carried by an `OFFER` datagram.
///
/// The keyword match is case-insensitive and leading whitespace is ignored.
///
/// # Errors
///
/// - [`ProtocolError::NotAscii`] for non-ASCII payloads.
/// - [`ProtocolError::UnknownKeyword`] if the payload is not an offer.
/// - [`ProtocolError::MalformedOffer`] if the JSON body does not parse.
/// - [`ProtocolError::EmptyOffer`] for an empty endpoint array.
pub fn decode_offer(payload: &[u8]) -> Result<Vec<Endpoint>, ProtocolError> {
    let text = ascii_text(payload)?;
    let body = strip_keyword(text.trim_start(), OFFER_KEYWORD)
        .ok_or_else(|| ProtocolError::UnknownKeyword(preview(text)))?;

    let endpoints = match serde_json::from_str::<OfferBody>(body.trim()) {
        Ok(OfferBody::One(endpoint)) => vec![endpoint],
        Ok(OfferBody::Many(endpoints)) => endpoints,
        Err(e) => return Err(ProtocolError::MalformedOffer(e.to_string())),
    };

    if endpoints.is_empty() {
        return Err(ProtocolError::EmptyOffer);
    }
    Ok(endpoints)
}

/// Decodes any discovery datagram.
///
/// # Errors
///
/// Returns the same errors as [`decode_offer`] for offer payloads, and
/// [`ProtocolError::UnknownKeyword`] for anything that is neither a request
/// nor an offer.
pub fn decode_discovery(payload: &[u8]) -> Result<DiscoveryMessage, ProtocolError> {
    if is_discover_request(payload) {
        return Ok(DiscoveryMessage::Discover);
    }
    decode_offer(payload).map(DiscoveryMessage::Offer)
}

// ── Time sync ─────────────────────────────────────────────────────────────────

/// Returns the bytes of a newline-terminated `TIME` request.
pub fn encode_time_request() -> Vec<u8> {
    let mut bytes = TIME_KEYWORD.as_bytes().to_vec();
    bytes.push(LINE_TERMINATOR);
    bytes
}

/// Returns `true` when `line`, trimmed, equals `TIME` ignoring case.
pub fn is_time_request(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(TIME_KEYWORD)
}

/// Encodes a time reply carrying `unix_ms`.
pub fn encode_time_reply(unix_ms: i64) -> Vec<u8> {
    let mut bytes = unix_ms.to_string().into_bytes();
    bytes.push(LINE_TERMINATOR);
    bytes
}

/// Parses a time reply into Unix milliseconds.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedTime`] if the trimmed text is not an
/// integer.
pub fn decode_time_reply(line: &str) -> Result<i64, ProtocolError> {
    let trimmed = line.trim();
    trimmed
        .parse::<i64>()
        .map_err(|_| ProtocolError::MalformedTime(preview(trimmed)))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn ascii_text(payload: &[u8]) -> Result<&str, ProtocolError> {
    if !payload.is_ascii() {
        return Err(ProtocolError::NotAscii);
    }
    std::str::from_utf8(payload).map_err(|_| ProtocolError::NotAscii)
}

/// Strips `keyword` from the front of `text` ignoring ASCII case.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        Some(&text[keyword.len()..])
    } else {
        None
    }
}

/// Shortens untrusted text before it lands in an error message.
fn preview(text: &str) -> String {
    const LIMIT: usize = 32;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        format!("{}…", text.chars().take(LIMIT).collect::<String>())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
