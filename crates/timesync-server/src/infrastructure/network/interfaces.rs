//! Local interface enumeration.
//!
//! The server advertises one endpoint per usable interface. "Usable" here is
//! the part that can be decided from the address alone: IPv4, not loopback,
//! not unspecified, not link-local. Whether the interface is up and
//! multicast-capable is checked by actually joining the group when the
//! responder starts (see `application::advertise`).

use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;
use tracing::warn;

/// Enumeration of local interfaces failed.
#[derive(Debug, Error)]
#[error("failed to list network interfaces: {0}")]
pub struct InterfaceError(String);

/// A named local IPv4 address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub address: Ipv4Addr,
}

impl NetInterface {
    pub fn new(name: impl Into<String>, address: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// Lists the usable IPv4 interfaces of this host.
///
/// # Errors
///
/// Returns [`InterfaceError`] if the OS interface table cannot be read.
pub fn local_interfaces() -> Result<Vec<NetInterface>, InterfaceError> {
    let all = local_ip_address::list_afinet_netifas().map_err(|e| InterfaceError(e.to_string()))?;
    Ok(usable_interfaces(all))
}

/// Turns a configured allow-list into interfaces, skipping enumeration.
///
/// Loopback and link-local addresses are kept: naming one is an explicit
/// request. Unspecified and multicast addresses cannot be advertised and are
/// dropped with a warning.
pub fn configured_interfaces(addresses: &[Ipv4Addr]) -> Vec<NetInterface> {
    let mut out: Vec<NetInterface> = Vec::new();
    for &address in addresses {
        if address.is_unspecified() || address.is_multicast() {
            warn!("configured interface {address} cannot be advertised; skipping it");
            continue;
        }
        if out.iter().any(|i| i.address == address) {
            continue;
        }
        out.push(NetInterface::new("configured", address));
    }
    out
}

/// Keeps IPv4, non-loopback, non-unspecified, non-link-local addresses, first
/// occurrence wins on duplicates.
pub fn usable_interfaces<I>(candidates: I) -> Vec<NetInterface>
where
    I: IntoIterator<Item = (String, IpAddr)>,
{
    let mut out: Vec<NetInterface> = Vec::new();
    for (name, ip) in candidates {
        let IpAddr::V4(v4) = ip else { continue };
        if v4.is_loopback() || v4.is_unspecified() || v4.is_link_local() || v4.is_multicast() {
            continue;
        }
        if out.iter().any(|i| i.address == v4) {
            continue;
        }
        out.push(NetInterface::new(name, v4));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(name: &str, ip: &str) -> (String, IpAddr) {
        (name.to_string(), ip.parse().unwrap())
    }

    #[test]
    fn test_filter_keeps_routable_ipv4_only() {
        // Arrange
        let candidates = vec![
            cand("lo", "127.0.0.1"),
            cand("eth0", "192.168.1.20"),
            cand("eth0", "fe80::1"),
            cand("wlan0", "10.0.0.5"),
            cand("docker0", "0.0.0.0"),
            cand("eth1", "169.254.3.4"),
        ];

        // Act
        let usable = usable_interfaces(candidates);

        // Assert
        assert_eq!(
            usable,
            vec![
                NetInterface::new("eth0", Ipv4Addr::new(192, 168, 1, 20)),
                NetInterface::new("wlan0", Ipv4Addr::new(10, 0, 0, 5)),
            ]
        );
    }

    #[test]
    fn test_filter_removes_duplicate_addresses() {
        let usable = usable_interfaces(vec![
            cand("eth0", "192.168.1.20"),
            cand("eth0:1", "192.168.1.20"),
        ]);
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].name, "eth0");
    }

    #[test]
    fn test_configured_interfaces_keep_explicit_loopback() {
        // Arrange
        let addresses = [
            Ipv4Addr::new(10, 1, 1, 1),
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::new(169, 254, 3, 4),
            Ipv4Addr::new(10, 1, 1, 1),
        ];

        // Act
        let usable = configured_interfaces(&addresses);

        // Assert
        let kept: Vec<Ipv4Addr> = usable.iter().map(|i| i.address).collect();
        assert_eq!(
            kept,
            vec![
                Ipv4Addr::new(10, 1, 1, 1),
                Ipv4Addr::LOCALHOST,
                Ipv4Addr::new(169, 254, 3, 4),
            ]
        );
    }

    #[test]
    fn test_configured_interfaces_drop_unadvertisable_addresses() {
        let usable = configured_interfaces(&[Ipv4Addr::UNSPECIFIED, Ipv4Addr::new(239, 0, 0, 222)]);
        assert!(usable.is_empty());
    }

    #[test]
    fn test_local_interfaces_never_returns_loopback() {
        // The host may have no usable interface at all; only check content.
        if let Ok(list) = local_interfaces() {
            assert!(list.iter().all(|i| !i.address.is_loopback()));
        }
    }
}
