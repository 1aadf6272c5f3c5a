//! Captured-frame views.
//!
//! A [`CapturedFrame`] owns the raw bytes handed over by the capture loop
//! and exposes progressively deeper views: link-layer addresses, IPv4
//! endpoints, and the transport segment the protocol parsers feed on.
//! Frames are ephemeral, produced by the sniffer and consumed synchronously
//! by parser dispatch, never retained.

use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use pnet::packet::Packet;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::util::MacAddr;

#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub seen_at: DateTime<Local>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// A transport-level view of a captured frame.
#[derive(Clone, Debug)]
pub struct Segment {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub transport: Transport,
    pub payload: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            seen_at: Local::now(),
        }
    }

    pub fn source_mac(&self) -> Option<MacAddr> {
        EthernetPacket::new(&self.data).map(|ethernet| ethernet.get_source())
    }

    pub fn dest_mac(&self) -> Option<MacAddr> {
        EthernetPacket::new(&self.data).map(|ethernet| ethernet.get_destination())
    }

    /// The IPv4 source/destination pair, for frames that carry IPv4 at all.
    pub fn ipv4_endpoints(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        let ethernet = EthernetPacket::new(&self.data)?;
        if ethernet.get_ethertype() != EtherTypes::Ipv4 {
            return None;
        }

        let ipv4 = Ipv4Packet::new(ethernet.payload())?;
        Some((ipv4.get_source(), ipv4.get_destination()))
    }

    /// Peels ethernet → IPv4 → TCP/UDP and returns the transport segment,
    /// or `None` when any layer is absent or malformed.
    pub fn segment(&self) -> Option<Segment> {
        let ethernet = EthernetPacket::new(&self.data)?;
        if ethernet.get_ethertype() != EtherTypes::Ipv4 {
            return None;
        }

        let ipv4 = Ipv4Packet::new(ethernet.payload())?;
        let src_ip = ipv4.get_source();
        let dst_ip = ipv4.get_destination();

        match ipv4.get_next_level_protocol() {
            IpNextHeaderProtocols::Tcp => {
                let tcp = TcpPacket::new(ipv4.payload())?;
                Some(Segment {
                    src_ip,
                    dst_ip,
                    src_port: tcp.get_source(),
                    dst_port: tcp.get_destination(),
                    transport: Transport::Tcp,
                    payload: tcp.payload().to_vec(),
                })
            }
            IpNextHeaderProtocols::Udp => {
                let udp = UdpPacket::new(ipv4.payload())?;
                Some(Segment {
                    src_ip,
                    dst_ip,
                    src_port: udp.get_source(),
                    dst_port: udp.get_destination(),
                    transport: Transport::Udp,
                    payload: udp.payload().to_vec(),
                })
            }
            _ => None,
        }
    }
}
