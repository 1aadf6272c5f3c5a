//! # Network Identity Resolution
//!
//! Resolves everything the engines need to know about the operating host's
//! position on the LAN: the capture interface, its IPv4 address and MAC,
//! the subnet it sits on and the default gateway.
//!
//! Resolution happens exactly once at startup. [`NetworkInfo`] is immutable
//! for the rest of the run, so no engine ever needs to synchronize on it.

use std::net::Ipv4Addr;

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use pnet::util::MacAddr;
use tracing::debug;

use crate::error::NetworkError;
use crate::network::gateway;

/// The host's resolved position on the LAN. Fully populated before any
/// spoofing or redirection starts; read-only afterwards.
#[derive(Clone, Debug)]
pub struct NetworkInfo {
    pub interface: NetworkInterface,
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Network,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// The interface is operationally down.
    IsDown,
    /// The interface is a loopback device.
    IsLoopback,
    /// The interface does not have a MAC address.
    NoMacAddress,
    /// The interface does not support broadcast (required for ARP).
    NotBroadcast,
    /// The interface is a point-to-point link (e.g., a VPN).
    IsPointToPoint,
    /// The interface has no IPv4 network.
    NoIpv4Network,
}

impl NetworkInfo {
    /// Resolves the network identity for the named interface, or for the
    /// best viable LAN interface when no name is given. Fails if any part
    /// of the identity cannot be determined.
    pub fn resolve(name: Option<&str>) -> anyhow::Result<Self> {
        let interface = match name {
            Some(name) => find_by_name(name)?,
            None => find_viable_lan_interface()?,
        };

        let mac = interface
            .mac
            .ok_or_else(|| NetworkError::NoMac(interface.name.clone()))?;

        let subnet = ipv4_network(&interface)
            .ok_or_else(|| NetworkError::NoIpv4(interface.name.clone()))?;

        let gateway = gateway::default_gateway()?;
        debug!("operating on {} ({mac}), subnet {subnet}", interface.name);

        Ok(Self {
            ip: subnet.ip(),
            interface,
            mac,
            gateway,
            subnet,
        })
    }
}

/// Iterates the usable host addresses of a subnet, excluding the network
/// and broadcast addresses.
pub fn subnet_hosts(subnet: Ipv4Network) -> impl Iterator<Item = Ipv4Addr> {
    let network = u32::from(subnet.network());
    let broadcast = u32::from(subnet.broadcast());
    let start = network.saturating_add(1);
    let end = broadcast.saturating_sub(1);

    (start..=end).map(Ipv4Addr::from)
}

fn find_by_name(name: &str) -> anyhow::Result<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|interface| interface.name == name)
        .ok_or_else(|| NetworkError::UnknownInterface(name.to_string()).into())
}

fn find_viable_lan_interface() -> anyhow::Result<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|interface| is_viable_lan_interface(interface).is_ok())
        .ok_or_else(|| NetworkError::NoInterface.into())
}

fn is_viable_lan_interface(interface: &NetworkInterface) -> Result<(), ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if interface.mac.is_none() {
        return Err(ViabilityError::NoMacAddress);
    }
    if !interface.is_broadcast() {
        return Err(ViabilityError::NotBroadcast);
    }
    if interface.is_point_to_point() {
        return Err(ViabilityError::IsPointToPoint);
    }
    if ipv4_network(interface).is_none() {
        return Err(ViabilityError::NoIpv4Network);
    }

    Ok(())
}

fn ipv4_network(interface: &NetworkInterface) -> Option<Ipv4Network> {
    interface.ips.iter().find_map(|net| match net {
        IpNetwork::V4(v4) => Some(*v4),
        _ => None,
    })
}

/// Checks whether a string parses as an IPv4 address. Used to validate an
/// explicitly configured target before anything touches the network.
pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}
