//! # Firewall Adapter
//!
//! The boundary to the operating system's packet redirection machinery.
//! The core only ever calls this trait: once to enable IP forwarding and
//! install the proxy's port redirection, once during finalize to undo
//! both. How the rules are programmed is entirely the adapter's business.

use std::net::Ipv4Addr;

use anyhow::{Context, bail};

/// A port redirection, kept around for symmetric removal at shutdown.
#[derive(Clone, Debug)]
pub struct Redirection {
    pub interface: String,
    pub protocol: String,
    pub port: u16,
    pub destination_ip: Ipv4Addr,
    pub destination_port: u16,
}

pub trait FirewallAdapter: Send + Sync {
    fn forwarding_enabled(&self) -> anyhow::Result<bool>;

    fn set_forwarding(&self, enabled: bool) -> anyhow::Result<()>;

    fn add_port_redirection(&self, redirection: &Redirection) -> anyhow::Result<()>;

    fn del_port_redirection(&self, redirection: &Redirection) -> anyhow::Result<()>;
}

pub fn platform_adapter() -> Box<dyn FirewallAdapter> {
    #[cfg(target_os = "linux")]
    {
        Box::new(LinuxFirewall)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedFirewall)
    }
}

#[cfg(target_os = "linux")]
pub struct LinuxFirewall;

#[cfg(target_os = "linux")]
impl LinuxFirewall {
    const FORWARD_PATH: &'static str = "/proc/sys/net/ipv4/ip_forward";

    fn iptables(redirection: &Redirection, action: &str) -> anyhow::Result<()> {
        let destination = format!(
            "{}:{}",
            redirection.destination_ip, redirection.destination_port
        );
        run(
            "iptables",
            &[
                "-t",
                "nat",
                action,
                "PREROUTING",
                "-i",
                &redirection.interface,
                "-p",
                &redirection.protocol,
                "--dport",
                &redirection.port.to_string(),
                "-j",
                "DNAT",
                "--to-destination",
                &destination,
            ],
        )
    }
}

#[cfg(target_os = "linux")]
impl FirewallAdapter for LinuxFirewall {
    fn forwarding_enabled(&self) -> anyhow::Result<bool> {
        let state = std::fs::read_to_string(Self::FORWARD_PATH)
            .context("reading IP forwarding state")?;
        Ok(state.trim() == "1")
    }

    fn set_forwarding(&self, enabled: bool) -> anyhow::Result<()> {
        std::fs::write(Self::FORWARD_PATH, if enabled { "1\n" } else { "0\n" })
            .context("writing IP forwarding state")
    }

    fn add_port_redirection(&self, redirection: &Redirection) -> anyhow::Result<()> {
        Self::iptables(redirection, "-A")
    }

    fn del_port_redirection(&self, redirection: &Redirection) -> anyhow::Result<()> {
        Self::iptables(redirection, "-D")
    }
}

#[cfg(not(target_os = "linux"))]
pub struct UnsupportedFirewall;

#[cfg(not(target_os = "linux"))]
impl FirewallAdapter for UnsupportedFirewall {
    fn forwarding_enabled(&self) -> anyhow::Result<bool> {
        bail!("no firewall adapter for this platform")
    }

    fn set_forwarding(&self, _enabled: bool) -> anyhow::Result<()> {
        bail!("no firewall adapter for this platform")
    }

    fn add_port_redirection(&self, _redirection: &Redirection) -> anyhow::Result<()> {
        bail!("no firewall adapter for this platform")
    }

    fn del_port_redirection(&self, _redirection: &Redirection) -> anyhow::Result<()> {
        bail!("no firewall adapter for this platform")
    }
}

#[cfg(target_os = "linux")]
fn run(program: &str, args: &[&str]) -> anyhow::Result<()> {
    let status = std::process::Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("spawning {program}"))?;

    if !status.success() {
        bail!("{program} {} exited with {status}", args.join(" "));
    }
    Ok(())
}
