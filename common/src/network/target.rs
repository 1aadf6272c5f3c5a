//! # Target Model
//!
//! A target is a host whose traffic is being diverted through this machine.
//! Entries are keyed uniquely by IPv4 address in the session's target set,
//! updated in place whenever the host is sighted again, and never pruned
//! during a run.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use pnet::util::MacAddr;

#[derive(Clone, Debug)]
pub struct Target {
    pub ip: Ipv4Addr,
    /// Unknown until resolved by discovery or by the spoofer's first probe.
    pub mac: Option<MacAddr>,
    pub last_seen: DateTime<Local>,
}

impl Target {
    pub fn new(ip: Ipv4Addr, mac: Option<MacAddr>) -> Self {
        Self {
            ip,
            mac,
            last_seen: Local::now(),
        }
    }

    /// Merges a re-sighting into this entry. A known MAC is never
    /// downgraded back to unknown.
    pub fn refresh(&mut self, mac: Option<MacAddr>) {
        if mac.is_some() {
            self.mac = mac;
        }
        self.last_seen = Local::now();
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mac {
            Some(mac) => write!(f, "{} [{}]", self.ip, mac),
            None => write!(f, "{} [?]", self.ip),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_updates_mac_when_resolved() {
        let mut target = Target::new(Ipv4Addr::new(192, 168, 1, 50), None);
        assert!(target.mac.is_none());

        let mac = MacAddr::new(0xde, 0xad, 0xbe, 0xef, 0x00, 0x01);
        target.refresh(Some(mac));
        assert_eq!(target.mac, Some(mac));
    }

    #[test]
    fn refresh_never_downgrades_a_known_mac() {
        let mac = MacAddr::new(0xde, 0xad, 0xbe, 0xef, 0x00, 0x01);
        let mut target = Target::new(Ipv4Addr::new(192, 168, 1, 50), Some(mac));

        target.refresh(None);
        assert_eq!(target.mac, Some(mac));
    }

    #[test]
    fn display_marks_unresolved_targets() {
        let target = Target::new(Ipv4Addr::new(10, 0, 0, 7), None);
        assert_eq!(target.to_string(), "10.0.0.7 [?]");
    }
}
