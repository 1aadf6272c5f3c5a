use std::path::PathBuf;

use clap::Parser;
use snare_common::config::{self, Config};
use snare_common::error::ConfigError;
use snare_common::network::interface::is_ipv4;

#[derive(Parser)]
#[command(name = "snare")]
#[command(about = "A LAN man-in-the-middle toolkit.", version)]
pub struct CommandLine {
    /// Network interface name; default: the best viable LAN interface
    #[arg(short = 'I', long = "interface")]
    pub interface: Option<String>,

    /// Spoofer strategy to use
    #[arg(short = 'S', long = "spoofer", default_value = config::DEFAULT_SPOOFER)]
    pub spoofer: String,

    /// Target ip address; if not specified the whole subnet is targeted
    #[arg(short = 'T', long = "target")]
    pub target: Option<String>,

    /// Log all messages into a file as well
    #[arg(short = 'O', long = "log")]
    pub log: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'D', long = "debug")]
    pub debug: bool,

    /// Parse packets coming from/to the address of this computer (implies -X)
    #[arg(short = 'L', long = "local")]
    pub local: bool,

    /// Enable the sniffer
    #[arg(short = 'X', long = "sniffer")]
    pub sniffer: bool,

    /// Comma separated list of packet parsers to enable, "*" for all (implies -X)
    #[arg(short = 'P', long = "parsers")]
    pub parsers: Option<String>,

    /// Do not actively search for hosts, just use the current ARP cache
    #[arg(long = "no-discovery")]
    pub no_discovery: bool,

    /// Enable the HTTP proxy and redirect all port 80 requests to it
    #[arg(long = "proxy")]
    pub proxy: bool,

    /// Set the HTTP proxy port
    #[arg(long = "proxy-port", default_value_t = config::DEFAULT_PROXY_PORT)]
    pub proxy_port: u16,

    /// Comma separated list of builtin proxy modules to load
    #[arg(long = "proxy-module")]
    pub proxy_module: Option<String>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn into_config(self) -> Result<Config, ConfigError> {
        let target = match self.target {
            Some(raw) => {
                if !is_ipv4(&raw) {
                    return Err(ConfigError::InvalidTarget(raw));
                }
                raw.parse().ok()
            }
            None => None,
        };

        // Asking for local capture or a parser list only makes sense with
        // the sniffer running.
        let sniffer = self.sniffer || self.local || self.parsers.is_some();

        let parsers = match &self.parsers {
            Some(list) => split_names(list),
            None => vec!["*".to_string()],
        };
        let proxy_modules = self
            .proxy_module
            .as_deref()
            .map(split_names)
            .unwrap_or_default();

        Ok(Config {
            interface: self.interface,
            spoofer: self.spoofer,
            target,
            log_file: self.log,
            debug: self.debug,
            local: self.local,
            sniffer,
            parsers,
            no_discovery: self.no_discovery,
            proxy: self.proxy,
            proxy_port: self.proxy_port,
            proxy_modules,
        })
    }
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
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
    use clap::Parser;

    fn parse(argv: &[&str]) -> CommandLine {
        CommandLine::try_parse_from(argv).expect("argv should parse")
    }

    #[test]
    fn parser_selection_implies_the_sniffer() {
        let cfg = parse(&["snare", "-P", "url,dns"]).into_config().unwrap();
        assert!(cfg.sniffer);
        assert_eq!(cfg.parsers, vec!["url".to_string(), "dns".to_string()]);
    }

    #[test]
    fn local_capture_implies_the_sniffer() {
        let cfg = parse(&["snare", "-L"]).into_config().unwrap();
        assert!(cfg.local);
        assert!(cfg.sniffer);
    }

    #[test]
    fn defaults_match_the_documented_surface() {
        let cfg = parse(&["snare"]).into_config().unwrap();
        assert_eq!(cfg.spoofer, "arp");
        assert_eq!(cfg.proxy_port, 8080);
        assert_eq!(cfg.parsers, vec!["*".to_string()]);
        assert!(!cfg.sniffer);
        assert!(!cfg.proxy);
    }

    #[test]
    fn an_invalid_target_is_rejected_before_startup() {
        let err = parse(&["snare", "-T", "999.1.2.3"]).into_config().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget(raw) if raw == "999.1.2.3"));
    }

    #[test]
    fn a_valid_target_is_carried_through() {
        let cfg = parse(&["snare", "-T", "192.168.1.50"]).into_config().unwrap();
        assert_eq!(cfg.target, Some("192.168.1.50".parse().unwrap()));
    }
}
