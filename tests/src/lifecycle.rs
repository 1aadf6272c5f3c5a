#![cfg(test)]
//! Session lifecycle across engines: seeding, cancellation, and the
//! idempotence of finalize.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pnet::util::MacAddr;
use snare_core::spoofer;

use crate::support;

#[tokio::test]
async fn an_explicit_target_seeds_exactly_one_entry() {
    let session = support::session();
    let target = Ipv4Addr::new(192, 168, 1, 50);

    session.upsert_target(target, None);

    let snapshot = session.targets_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].ip, target);
    assert_eq!(snapshot[0].mac, None);

    // Lazy resolution fills the MAC in place without growing the set.
    session.refresh_target(target, MacAddr::new(2, 0, 0, 0, 0, 0x50));
    let snapshot = session.targets_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].mac.is_some());
}

#[tokio::test]
async fn finalize_signals_engines_once_and_only_once() {
    let session = support::session();
    let cleanups = Arc::new(AtomicUsize::new(0));

    // An engine that performs its restoration side effect on cancellation,
    // the way the spoofer does.
    let counter = cleanups.clone();
    let mut shutdown = session.shutdown();
    let engine = tokio::spawn(async move {
        let _ = shutdown.changed().await;
        counter.fetch_add(1, Ordering::SeqCst);
    });
    session.register_engine(engine);

    session.finalize().await;
    session.finalize().await;

    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_strategies_fail_with_an_untouched_target_set() {
    let session = support::session();

    assert!(spoofer::by_name("nonsense").is_err());
    assert_eq!(session.target_count(), 0);
}
