//! Client network adapters.
//!
//! - [`discovery`] – the `DISCOVER` broadcaster and the `OFFER` listener.
//! - [`connection`] – the TCP connection to the bound server.

pub mod connection;
pub mod discovery;
