//! The client's registry of discovered servers.
//!
//! Keyed by address: a server that re-advertises with a new port replaces its
//! previous entry, so the registry never offers two ports for one host.
//!
//! # Sharing (for beginners)
//!
//! The offer listener writes and the selector reads from different tasks, so
//! the map sits behind a `std::sync::RwLock` inside an `Arc`. Every method
//! holds the lock only for one map operation and never across an `.await`,
//! which is why a synchronous lock is fine here.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use timesync_core::Endpoint;

/// Discovered servers, one port per address.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: RwLock<HashMap<IpAddr, u16>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `endpoint.address`.
    ///
    /// Returns the previous port when the address was already known.
    pub fn upsert(&self, endpoint: Endpoint) -> Option<u16> {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint.address, endpoint.port)
    }

    /// Removes `address`. Returns `true` if it was present.
    pub fn remove(&self, address: IpAddr) -> bool {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&address)
            .is_some()
    }

    pub fn clear(&self) {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn get(&self, address: IpAddr) -> Option<Endpoint> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address)
            .map(|port| Endpoint::new(address, *port))
    }

    pub fn contains(&self, address: IpAddr) -> bool {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&address)
    }

    /// Returns every entry, sorted by address so menu numbering is stable.
    pub fn snapshot(&self) -> Vec<Endpoint> {
        let mut list: Vec<Endpoint> = self
            .servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(address, port)| Endpoint::new(*address, *port))
            .collect();
        list.sort();
        list
    }

    pub fn len(&self) -> usize {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
