use thiserror::Error;

/// Startup-time configuration failures. All of these abort the run before
/// any packet is sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("this software must run as root")]
    NotRoot,
    #[error("invalid target '{0}'")]
    InvalidTarget(String),
    #[error("unknown spoofer '{0}', available: {1}")]
    UnknownSpoofer(String, String),
    #[error("unknown parser '{0}', available: {1}")]
    UnknownParser(String, String),
    #[error("unknown proxy module '{0}', available: {1}")]
    UnknownModule(String, String),
    #[error("'{0}' did not register any proxy module")]
    EmptyModuleChain(String),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no viable capture interface found")]
    NoInterface,
    #[error("interface '{0}' not found")]
    UnknownInterface(String),
    #[error("interface '{0}' has no MAC address")]
    NoMac(String),
    #[error("interface '{0}' has no IPv4 network")]
    NoIpv4(String),
    #[error("no default gateway found")]
    NoGateway,
    #[error("failed to open datalink channel: {0}")]
    ChannelOpen(String),
    #[error("non-ethernet datalink channel")]
    UnsupportedChannel,
    #[error("packet send failed: {0}")]
    SendFailed(String),
}
