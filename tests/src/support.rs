#![cfg(test)]
//! Shared fixtures for the integration tests: a fabricated network
//! identity so sessions can exist without touching a real interface.

use std::net::Ipv4Addr;
use std::sync::Arc;

use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use pnet::util::MacAddr;
use snare_common::config::Config;
use snare_common::network::interface::NetworkInfo;
use snare_core::session::Session;

pub const OUR_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 100);
pub const GATEWAY_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

pub fn network_info() -> NetworkInfo {
    let subnet = Ipv4Network::new(OUR_IP, 24).unwrap();
    NetworkInfo {
        interface: NetworkInterface {
            name: "test0".into(),
            description: String::new(),
            index: 1,
            mac: Some(MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff)),
            ips: vec![IpNetwork::V4(subnet)],
            flags: 0,
        },
        ip: OUR_IP,
        mac: MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff),
        gateway: GATEWAY_IP,
        subnet,
    }
}

pub fn session() -> Arc<Session> {
    Session::with_network(Config::default(), network_info())
}
