//! # Sniffer
//!
//! Drives the capture loop over the diverted traffic. Every admitted frame
//! is offered to every enabled parser independently: multiple parsers may
//! fire on the same frame, and one parser failing on a frame affects
//! neither the loop nor the other parsers. The loop never stalls on a bad
//! packet and exits cooperatively on the session's shutdown signal.

use std::sync::Arc;

use snare_protocols::frame::CapturedFrame;
use snare_protocols::parsers::ParserRegistry;
use tracing::{debug, error, info};

use crate::channel;
use crate::session::Session;

pub async fn run(session: Arc<Session>, registry: ParserRegistry) {
    if let Err(e) = capture_loop(&session, &registry).await {
        error!("sniffer stopped: {e:#}");
    }
}

async fn capture_loop(session: &Session, registry: &ParserRegistry) -> anyhow::Result<()> {
    let mut handle = channel::start_capture(&session.network().interface)?;
    let mut shutdown = session.shutdown();

    info!("sniffer started, parsers: {}", registry.names().join(", "));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            frame = handle.rx.recv() => match frame {
                Some(bytes) => handle_frame(session, registry, bytes),
                None => break,
            }
        }
    }

    Ok(())
}

pub(crate) fn handle_frame(session: &Session, registry: &ParserRegistry, bytes: Vec<u8>) {
    let frame = CapturedFrame::new(bytes);
    if !of_interest(session, &frame) {
        return;
    }

    for parser in registry.iter() {
        if !parser.matches(&frame) {
            continue;
        }
        match parser.decode(&frame) {
            Ok(Some(event)) => info!("{event}"),
            Ok(None) => {}
            Err(e) => debug!("parser '{}' failed on a frame: {e:#}", parser.name()),
        }
    }
}

/// The address filter: frames touching a target or the gateway are in;
/// frames touching this host are in only under local capture. Anything
/// that is not IPv4 is out.
pub(crate) fn of_interest(session: &Session, frame: &CapturedFrame) -> bool {
    let Some((src, dst)) = frame.ipv4_endpoints() else {
        return false;
    };

    let network = session.network();
    if src == network.ip || dst == network.ip {
        return session.config().local;
    }

    src == network.gateway
        || dst == network.gateway
        || session.has_target(src)
        || session.has_target(dst)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
