mod args;
mod terminal;

use std::sync::Arc;

use anyhow::bail;
use args::CommandLine;
use snare_common::config::Config;
use snare_common::error::ConfigError;
use snare_core::firewall::{self, Redirection};
use snare_core::proxy::ProxyServer;
use snare_core::session::{FirewallGuard, Session};
use snare_core::spoofer::SpooferStrategy;
use snare_core::{discovery, sniffer, spoofer};
use snare_modules::ModuleChain;
use snare_protocols::parsers::ParserRegistry;
use terminal::print;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CommandLine::parse_args();
    terminal::logging::init(args.debug, args.log.as_deref())?;
    print::banner();

    let result = match args.into_config() {
        Ok(cfg) => run(cfg).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        // The one top-level fault boundary: log the message and its chain,
        // then exit nonzero. Finalize already ran for any session that got
        // as far as existing.
        error!("{e:#}");
        debug!("{e:?}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    if !is_root::is_root() {
        bail!(ConfigError::NotRoot);
    }

    // Resolve every configured name before anything touches the network.
    let strategy = spoofer::by_name(&cfg.spoofer)?;
    let registry = ParserRegistry::select(&cfg.parsers)?;
    let chain = if cfg.proxy && !cfg.proxy_modules.is_empty() {
        ModuleChain::load(&cfg.proxy_modules)?
    } else {
        ModuleChain::empty()
    };

    let session = Session::open(cfg)?;
    let network = session.network();
    info!("  Interface     : {}", network.interface.name);
    info!("  Local Address : {}", network.ip);
    info!("  Local MAC     : {}", network.mac);
    info!("  Gateway       : {}", network.gateway);
    info!("  Subnet        : {}", network.subnet);

    let outcome = engage(&session, strategy, registry, chain).await;

    // Cleanup runs no matter how the run ended.
    session.finalize().await;
    info!("shutdown complete");

    outcome
}

async fn engage(
    session: &Arc<Session>,
    strategy: Box<dyn SpooferStrategy>,
    registry: ParserRegistry,
    chain: ModuleChain,
) -> anyhow::Result<()> {
    seed_targets(session)?;
    start_spoofer(session, strategy);

    if session.config().proxy {
        start_proxy(session, chain).await?;
    }

    if session.config().sniffer {
        let engine = tokio::spawn(sniffer::run(session.clone(), registry));
        session.register_engine(engine);
    } else {
        warn!("sniffer is not enabled, the MITM will run but nothing gets collected");
    }

    // Park here until interrupted; the engines run on their own tasks and
    // stop through the shutdown signal, never through forced interruption.
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, cleaning up"),
        Err(e) => error!("could not listen for the interrupt signal: {e}"),
    }

    Ok(())
}

fn seed_targets(session: &Arc<Session>) -> anyhow::Result<()> {
    match session.config().target {
        Some(ip) => {
            // Explicit target: discovery does not run at all. The MAC gets
            // resolved lazily by the spoofer's first probe.
            session.upsert_target(ip, None);
            info!("targeting {ip}");
        }
        None if session.config().no_discovery => {
            let count = discovery::read_resolution_cache(session)?;
            info!("seeded {count} targets from the system resolution cache");
        }
        None => {
            let engine = tokio::spawn(discovery::run(session.clone()));
            session.register_engine(engine);
        }
    }
    Ok(())
}

fn start_spoofer(session: &Arc<Session>, mut strategy: Box<dyn SpooferStrategy>) {
    info!("spoofer module: {}", strategy.name());
    let handle = session.clone();
    let engine = tokio::spawn(async move {
        if let Err(e) = strategy.start(handle).await {
            error!("spoofer engine stopped: {e:#}");
        }
    });
    session.register_engine(engine);
}

async fn start_proxy(session: &Arc<Session>, chain: ModuleChain) -> anyhow::Result<()> {
    let network = session.network();
    let proxy_port = session.config().proxy_port;

    // Bind first: a taken port must fail the run before any firewall state
    // is changed.
    let server = ProxyServer::new(network.ip, proxy_port, chain);
    let listener = server.bind().await?;

    let adapter = firewall::platform_adapter();
    let forwarding_was_enabled = adapter.forwarding_enabled().unwrap_or(false);
    if !forwarding_was_enabled {
        adapter.set_forwarding(true)?;
    }

    let redirection = Redirection {
        interface: network.interface.name.clone(),
        protocol: "tcp".to_string(),
        port: 80,
        destination_ip: network.ip,
        destination_port: proxy_port,
    };
    adapter.add_port_redirection(&redirection)?;
    info!("redirecting tcp/80 to {}:{}", network.ip, proxy_port);

    session.install_firewall_guard(FirewallGuard {
        adapter,
        redirection: Some(redirection),
        forwarding_was_enabled,
    });

    let engine = tokio::spawn(server.serve(listener, session.clone()));
    session.register_engine(engine);
    Ok(())
}
