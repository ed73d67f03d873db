//! Infrastructure layer for the client: sockets, files, and the console.

pub mod console;
pub mod network;
pub mod storage;
