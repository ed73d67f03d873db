//! Application layer for the client.
//!
//! ```text
//! OfferListener ──upsert──► ServerRegistry ──snapshot──► Selector
//!                                                          │ bind
//!                                                          ▼
//!                           Synchronizer ◄──query──── BoundSession
//! ```
//!
//! - [`registry`] – servers discovered so far, one port per address.
//! - [`session`] – the single bound connection and its polling period.
//! - [`select_server`] – the Unbound → Bound use case and its seams
//!   ([`select_server::Operator`], [`select_server::AddressCache`]).
//! - [`synchronize_clock`] – the periodic offset estimation use case.

pub mod registry;
pub mod select_server;
pub mod session;
pub mod synchronize_clock;
