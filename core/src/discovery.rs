//! # Target Discovery
//!
//! Populates the session's target set. Two mutually exclusive modes per
//! run: an active sweep that keeps probing the subnet on an interval and
//! records whoever answers, or a single passive read of the operating
//! system's resolution cache. Neither runs when a single target was
//! configured explicitly; the set is seeded with that one entry instead.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use pnet::util::MacAddr;
use snare_common::network::interface::{self, NetworkInfo};
use snare_protocols::arp;
use tracing::{error, info, warn};

use crate::channel::{self, EthernetHandle};
use crate::session::Session;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Active discovery loop. Runs until the session's shutdown signal fires.
pub async fn run(session: Arc<Session>) {
    if let Err(e) = sweep_loop(&session).await {
        error!("discovery stopped: {e:#}");
    }
}

async fn sweep_loop(session: &Session) -> anyhow::Result<()> {
    let mut handle = channel::start_capture(&session.network().interface)?;
    let mut shutdown = session.shutdown();
    let mut tick = tokio::time::interval(SWEEP_INTERVAL);

    info!(
        "sweeping {} for live hosts every {}s",
        session.network().subnet,
        SWEEP_INTERVAL.as_secs()
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            _ = tick.tick() => {
                if let Err(e) = send_sweep(&mut handle, session.network()) {
                    warn!("discovery sweep failed: {e:#}");
                }
            }

            frame = handle.rx.recv() => match frame {
                Some(bytes) => record_reply(session, &bytes),
                None => break,
            }
        }
    }

    Ok(())
}

/// One probe per usable subnet address, skipping ourselves and the gateway.
fn send_sweep(handle: &mut EthernetHandle, network: &NetworkInfo) -> anyhow::Result<()> {
    for ip in interface::subnet_hosts(network.subnet) {
        if ip == network.ip || ip == network.gateway {
            continue;
        }
        handle.send(&arp::request(network.mac, network.ip, ip))?;
    }
    Ok(())
}

pub(crate) fn record_reply(session: &Session, frame: &[u8]) {
    if let Some((ip, mac)) = arp::parse_reply(frame) {
        session.upsert_target(ip, Some(mac));
    }
}

/// Passive mode: seeds the target set from the OS resolution cache, once.
/// Returns how many entries were taken over.
#[cfg(target_os = "linux")]
pub fn read_resolution_cache(session: &Session) -> anyhow::Result<usize> {
    let cache = std::fs::read_to_string("/proc/net/arp")?;
    Ok(seed_from_cache(session, parse_arp_cache(&cache)))
}

/// Passive mode (macOS version): parses `arp -an` output.
#[cfg(target_os = "macos")]
pub fn read_resolution_cache(session: &Session) -> anyhow::Result<usize> {
    use std::process::Command;

    let output = Command::new("arp").arg("-an").output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(seed_from_cache(session, parse_arp_output(&stdout)))
}

fn seed_from_cache(session: &Session, entries: Vec<(Ipv4Addr, MacAddr)>) -> usize {
    entries
        .into_iter()
        .filter(|(ip, mac)| session.upsert_target(*ip, Some(*mac)))
        .count()
}

/// Parses `/proc/net/arp`. Incomplete entries (flags 0x0, zeroed MAC) are
/// skipped; they are hosts the kernel asked about but never heard from.
fn parse_arp_cache(cache: &str) -> Vec<(Ipv4Addr, MacAddr)> {
    cache
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 || fields[2] == "0x0" {
                return None;
            }

            let ip = fields[0].parse::<Ipv4Addr>().ok()?;
            let mac = fields[3].parse::<MacAddr>().ok()?;
            if mac == MacAddr::zero() {
                return None;
            }

            Some((ip, mac))
        })
        .collect()
}

/// Parses `arp -an` lines of the shape `? (ip) at mac on ifname ...`.
#[cfg(target_os = "macos")]
fn parse_arp_output(output: &str) -> Vec<(Ipv4Addr, MacAddr)> {
    output
        .lines()
        .filter_map(|line| {
            let ip = line.split('(').nth(1)?.split(')').next()?;
            let mac = line.split(" at ").nth(1)?.split_whitespace().next()?;
            Some((ip.parse().ok()?, mac.parse().ok()?))
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
