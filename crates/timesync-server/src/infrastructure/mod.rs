//! Infrastructure layer for the server: sockets and on-disk configuration.

pub mod network;
pub mod storage;
