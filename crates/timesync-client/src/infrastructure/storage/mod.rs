//! On-disk state: the TOML config and the last-used address cache.

pub mod cache;
pub mod config;
