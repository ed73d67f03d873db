//! Network services run once per advertised interface.
//!
//! - [`discovery`] – answers `DISCOVER` datagrams with an `OFFER`.
//! - [`acceptor`] – accepts TCP connections and serves `TIME` requests.
//! - [`interfaces`] – finds the local addresses worth advertising.

pub mod acceptor;
pub mod discovery;
pub mod interfaces;
