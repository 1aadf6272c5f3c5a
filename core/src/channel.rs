//! Datalink channel plumbing.
//!
//! Every engine that touches the wire gets its own [`EthernetHandle`]: a
//! raw sender plus an unbounded stream of captured frames, fed by a reader
//! thread. The underlying capture primitive blocks, so the channel is
//! opened with a short read timeout and the reader re-checks its stop flag
//! between reads; cancellation is cooperative, never forced.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use snare_common::error::NetworkError;
use tokio::sync::mpsc::{self, UnboundedReceiver};

const READ_TIMEOUT: Duration = Duration::from_millis(50);

pub struct EthernetHandle {
    pub tx: Box<dyn DataLinkSender>,
    pub rx: UnboundedReceiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
}

impl EthernetHandle {
    /// Wraps an already-open sender/receiver pair. Used by tests and by
    /// alternative capture backends.
    pub fn from_parts(tx: Box<dyn DataLinkSender>, rx: UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn send(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        match self.tx.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(NetworkError::SendFailed(e.to_string()).into()),
            None => Err(NetworkError::SendFailed("sender queue closed".into()).into()),
        }
    }

    /// Asks the reader thread to park at its next timeout.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for EthernetHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens a capture on `interface` and starts the reader thread.
pub fn start_capture(interface: &NetworkInterface) -> anyhow::Result<EthernetHandle> {
    let (tx, mut rx) = open_eth_channel(interface, &capture_config(), datalink::channel)?;

    let stop = Arc::new(AtomicBool::new(false));
    let reader_stop = stop.clone();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        loop {
            if reader_stop.load(Ordering::Relaxed) {
                break;
            }
            match rx.next() {
                Ok(frame) => {
                    if frame_tx.send(frame.to_vec()).is_err() {
                        break;
                    }
                }
                // Read timeout or transient error; loop back around so the
                // stop flag gets another look.
                Err(_) => {}
            }
        }
    });

    Ok(EthernetHandle {
        tx,
        rx: frame_rx,
        stop,
    })
}

fn capture_config() -> Config {
    Config {
        read_timeout: Some(READ_TIMEOUT),
        ..Default::default()
    }
}

fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: &Config,
    channel_opener: F,
) -> anyhow::Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>)>
where
    F: FnOnce(&NetworkInterface, Config) -> std::io::Result<datalink::Channel>,
{
    let ch: Channel =
        channel_opener(intf, *cfg).with_context(|| format!("opening on {}", intf.name))?;
    match ch {
        Channel::Ethernet(tx, rx) => Ok((tx, rx)),
        _ => bail!("non-ethernet channel for {}", intf.name),
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
