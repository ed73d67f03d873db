//! Persistent storage for the server (TOML configuration).

pub mod config;
