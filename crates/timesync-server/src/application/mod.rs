//! Application layer for the server.
//!
//! [`advertise`] turns the list of usable interfaces into running
//! responder/acceptor pairs, one shared port per interface.

pub mod advertise;
