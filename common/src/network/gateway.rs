//! Default gateway detection from the operating system's routing table.

use std::net::Ipv4Addr;

use crate::error::NetworkError;

/// Detects the default gateway of this host.
#[cfg(target_os = "linux")]
pub fn default_gateway() -> anyhow::Result<Ipv4Addr> {
    let route = std::fs::read_to_string("/proc/net/route")?;
    parse_route_table(&route).ok_or_else(|| NetworkError::NoGateway.into())
}

/// Detects the default gateway of this host (macOS version).
#[cfg(target_os = "macos")]
pub fn default_gateway() -> anyhow::Result<Ipv4Addr> {
    use std::process::Command;

    let output = Command::new("netstat").args(["-rn", "-f", "inet"]).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    for line in stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() >= 2 && fields[0] == "default" {
            if let Ok(gateway) = fields[1].parse::<Ipv4Addr>() {
                return Ok(gateway);
            }
        }
    }

    Err(NetworkError::NoGateway.into())
}

/// Extracts the default route's gateway from `/proc/net/route` content.
/// The gateway column is hex-encoded, little-endian.
fn parse_route_table(route: &str) -> Option<Ipv4Addr> {
    for line in route.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }

        // Default route has destination 00000000.
        if fields[1] == "00000000" {
            let raw = u32::from_str_radix(fields[2], 16).ok()?;
            return Some(Ipv4Addr::from(raw.to_be()));
        }
    }
    None
}
