pub mod channel;
pub mod discovery;
pub mod firewall;
pub mod proxy;
pub mod session;
pub mod sniffer;
pub mod spoofer;
