//! Protocol module containing keywords, message types, the ASCII codec, and
//! the newline framing used on the TCP stream.

pub mod codec;
pub mod framing;
pub mod messages;

pub use codec::{decode_discovery, decode_offer, decode_time_reply, ProtocolError};
pub use framing::read_line_bounded;
pub use messages::*;
