//! # Session State
//!
//! The single shared-state owner for a run: configuration, the resolved
//! network identity, the mutable target set, the shutdown signal and the
//! handles of every running engine.
//!
//! The target set is the only state written concurrently (discovery and
//! the spoofer's reply harvesting write, the spoofer and sniffer read).
//! Readers take point-in-time snapshots so no lock is ever held across
//! network I/O; an entry added mid-iteration is picked up on the next
//! cycle.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use pnet::util::MacAddr;
use snare_common::config::Config;
use snare_common::network::interface::NetworkInfo;
use snare_common::network::target::Target;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::firewall::{FirewallAdapter, Redirection};

pub struct Session {
    config: Config,
    network: NetworkInfo,
    targets: RwLock<HashMap<Ipv4Addr, Target>>,
    shutdown_tx: watch::Sender<bool>,
    engines: Mutex<Vec<JoinHandle<()>>>,
    firewall: Mutex<Option<FirewallGuard>>,
    finalized: AtomicBool,
}

/// Firewall state to undo during finalize: the installed redirection and
/// whether IP forwarding was already on before we enabled it.
pub struct FirewallGuard {
    pub adapter: Box<dyn FirewallAdapter>,
    pub redirection: Option<Redirection>,
    pub forwarding_was_enabled: bool,
}

impl Session {
    /// Resolves the network identity and opens the session. Engines must
    /// only ever be handed a session that resolved successfully, which is
    /// what makes [`NetworkInfo`] immutable for the run.
    pub fn open(config: Config) -> anyhow::Result<std::sync::Arc<Self>> {
        let network = NetworkInfo::resolve(config.interface.as_deref())?;
        Ok(Self::with_network(config, network))
    }

    /// Opens a session around an already-resolved identity.
    pub fn with_network(config: Config, network: NetworkInfo) -> std::sync::Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        std::sync::Arc::new(Self {
            config,
            network,
            targets: RwLock::new(HashMap::new()),
            shutdown_tx,
            engines: Mutex::new(Vec::new()),
            firewall: Mutex::new(None),
            finalized: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn network(&self) -> &NetworkInfo {
        &self.network
    }

    /// A point-in-time copy of the target set for engines that must not
    /// hold a lock while doing I/O.
    pub fn targets_snapshot(&self) -> Vec<Target> {
        self.targets.read().values().cloned().collect()
    }

    pub fn target_count(&self) -> usize {
        self.targets.read().len()
    }

    pub fn has_target(&self, ip: Ipv4Addr) -> bool {
        self.targets.read().contains_key(&ip)
    }

    /// Idempotent insert/update. The operating host and the gateway are
    /// never targets; attempts to add them are dropped. Returns whether
    /// the set was touched.
    pub fn upsert_target(&self, ip: Ipv4Addr, mac: Option<MacAddr>) -> bool {
        if ip == self.network.ip || ip == self.network.gateway {
            return false;
        }

        let mut targets = self.targets.write();
        match targets.get_mut(&ip) {
            Some(target) => target.refresh(mac),
            None => {
                let target = Target::new(ip, mac);
                info!("new target {target}");
                targets.insert(ip, target);
            }
        }
        true
    }

    /// Updates an existing target's MAC and last-seen without ever adding
    /// a new entry. Used by the spoofer's reply harvesting, which must not
    /// grow the set beyond what discovery or configuration put there.
    pub fn refresh_target(&self, ip: Ipv4Addr, mac: MacAddr) {
        if let Some(target) = self.targets.write().get_mut(&ip) {
            if target.mac.is_none() {
                info!("resolved target {ip} to {mac}");
            }
            target.refresh(Some(mac));
        }
    }

    /// A cancellation-signal receiver for one engine loop.
    pub fn shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn register_engine(&self, handle: JoinHandle<()>) {
        self.engines.lock().push(handle);
    }

    /// Records firewall state to undo when the session ends.
    pub fn install_firewall_guard(&self, guard: FirewallGuard) {
        *self.firewall.lock() = Some(guard);
    }

    /// Signals every engine to stop, waits until each has confirmed by
    /// returning, then undoes the firewall changes. Safe to call any
    /// number of times; only the first invocation does anything.
    pub async fn finalize(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(true);

        let engines: Vec<JoinHandle<()>> = self.engines.lock().drain(..).collect();
        for engine in engines {
            if let Err(e) = engine.await {
                warn!("engine ended abnormally: {e}");
            }
        }

        if let Some(guard) = self.firewall.lock().take() {
            guard.teardown();
        }
    }
}

impl FirewallGuard {
    fn teardown(self) {
        if let Some(redirection) = &self.redirection {
            if let Err(e) = self.adapter.del_port_redirection(redirection) {
                warn!("could not remove port redirection: {e:#}");
            }
        }
        if !self.forwarding_was_enabled {
            if let Err(e) = self.adapter.set_forwarding(false) {
                warn!("could not restore IP forwarding: {e:#}");
            }
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
