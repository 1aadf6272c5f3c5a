use std::net::Ipv4Addr;
use std::path::PathBuf;

pub const DEFAULT_SPOOFER: &str = "arp";
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// Run configuration, built once from the command line and handed by
/// reference into every engine. Nothing mutates it after startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capture interface name. `None` selects the best viable LAN interface.
    pub interface: Option<String>,
    /// Spoofing strategy name, resolved against the strategy registry.
    pub spoofer: String,
    /// Explicit single target. Disables discovery entirely when set.
    pub target: Option<Ipv4Addr>,
    /// Also append log lines to this file.
    pub log_file: Option<PathBuf>,
    pub debug: bool,
    /// Parse packets coming from/to this host too.
    pub local: bool,
    pub sniffer: bool,
    /// Parser names to enable, or `["*"]` for every registered parser.
    pub parsers: Vec<String>,
    /// Seed targets from the OS resolution cache instead of sweeping.
    pub no_discovery: bool,
    pub proxy: bool,
    pub proxy_port: u16,
    /// Builtin proxy module names to load. Only meaningful with `proxy`.
    pub proxy_modules: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            spoofer: DEFAULT_SPOOFER.to_string(),
            target: None,
            log_file: None,
            debug: false,
            local: false,
            sniffer: false,
            parsers: vec!["*".to_string()],
            no_discovery: false,
            proxy: false,
            proxy_port: DEFAULT_PROXY_PORT,
            proxy_modules: Vec::new(),
        }
    }
}
