//! # Spoofing Strategies
//!
//! The engine that keeps traffic diverted is polymorphic over a strategy:
//! anything that can start poisoning against the session's targets and
//! clean up after itself when the run ends. Strategies are chosen by name
//! from a static registry, validated at configuration time: an unknown
//! name fails before a single packet is sent.

pub mod arp;

use std::sync::Arc;

use async_trait::async_trait;
use snare_common::error::ConfigError;

use crate::session::Session;

#[async_trait]
pub trait SpooferStrategy: Send {
    fn name(&self) -> &'static str;

    /// Runs the poisoning loop until the session's shutdown signal fires,
    /// then performs best-effort restoration before returning.
    async fn start(&mut self, session: Arc<Session>) -> anyhow::Result<()>;
}

type Constructor = fn() -> Box<dyn SpooferStrategy>;

const REGISTRY: &[(&str, Constructor)] = &[("arp", || Box::new(arp::ArpSpoofer::new()))];

pub fn available() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

pub fn by_name(name: &str) -> Result<Box<dyn SpooferStrategy>, ConfigError> {
    REGISTRY
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, build)| build())
        .ok_or_else(|| ConfigError::UnknownSpoofer(name.to_string(), available().join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_default_strategy_is_registered() {
        let strategy = by_name("arp").unwrap();
        assert_eq!(strategy.name(), "arp");
    }

    #[test]
    fn unknown_strategies_fail_before_any_network_action() {
        let err = by_name("dhcp").err().unwrap();
        assert!(matches!(err, ConfigError::UnknownSpoofer(name, _) if name == "dhcp"));
    }
}
