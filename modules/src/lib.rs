//! # Proxy Module Chain
//!
//! An ordered, pluggable sequence of request/response transformers applied
//! to every intercepted proxy connection. Modules are statically linked and
//! selected by name from [`builtin`]'s registry; order is fixed when the
//! chain is loaded and stays stable for the whole run.
//!
//! Trust boundary: a registered module runs in-process with the tool's full
//! (root) privilege. Registering one is granting it everything the tool can
//! do.

pub mod builtin;

use snare_common::error::ConfigError;
use snare_protocols::http::{ProxyRequest, ProxyResponse};
use tracing::warn;

pub trait ProxyModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Runs against a connection's request and its (possibly still empty)
    /// response, mutating either in place. Filling the response
    /// short-circuits the upstream leg for that connection.
    fn on_request(
        &self,
        request: &mut ProxyRequest,
        response: &mut ProxyResponse,
    ) -> anyhow::Result<()>;
}

pub struct ModuleChain {
    modules: Vec<Box<dyn ProxyModule>>,
}

impl ModuleChain {
    pub fn empty() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Resolves a list of registered module names into a chain. An unknown
    /// name, or a selection that registers nothing, is a configuration
    /// error raised before the proxy starts.
    pub fn load(names: &[String]) -> Result<Self, ConfigError> {
        let mut modules: Vec<Box<dyn ProxyModule>> = Vec::new();

        for name in names {
            let constructor = builtin::REGISTRY
                .iter()
                .find(|(known, _)| known == name)
                .map(|(_, build)| build)
                .ok_or_else(|| {
                    ConfigError::UnknownModule(name.clone(), available().join(", "))
                })?;
            modules.push(constructor());
        }

        if modules.is_empty() {
            return Err(ConfigError::EmptyModuleChain(names.join(",")));
        }

        Ok(Self { modules })
    }

    /// An arbitrary chain, for tests and embedders.
    pub fn with(modules: Vec<Box<dyn ProxyModule>>) -> Self {
        Self { modules }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|module| module.name()).collect()
    }

    /// Runs every enabled module, in registration order, against one
    /// connection's request/response pair. A failing module is skipped for
    /// that connection only; the chain always continues.
    pub fn apply(&self, request: &mut ProxyRequest, response: &mut ProxyResponse) {
        for module in &self.modules {
            if !module.is_enabled() {
                continue;
            }
            if let Err(e) = module.on_request(request, response) {
                warn!("proxy module '{}' failed: {e:#}", module.name());
            }
        }
    }
}

pub fn available() -> Vec<&'static str> {
    builtin::REGISTRY.iter().map(|(name, _)| *name).collect()
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

    struct Marker {
        name: &'static str,
        enabled: bool,
    }

    impl ProxyModule for Marker {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn on_request(
            &self,
            _request: &mut ProxyRequest,
            response: &mut ProxyResponse,
        ) -> anyhow::Result<()> {
            response.append_header("X-Chain", self.name);
            Ok(())
        }
    }

    struct Faulty;

    impl ProxyModule for Faulty {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn on_request(
            &self,
            _request: &mut ProxyRequest,
            _response: &mut ProxyResponse,
        ) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    fn request() -> ProxyRequest {
        ProxyRequest::parse_head(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap()
            .unwrap()
            .0
    }

    #[test]
    fn applies_modules_in_registration_order() {
        let chain = ModuleChain::with(vec![
            Box::new(Marker {
                name: "A",
                enabled: true,
            }),
            Box::new(Marker {
                name: "B",
                enabled: true,
            }),
        ]);

        let mut req = request();
        let mut resp = ProxyResponse::empty();
        chain.apply(&mut req, &mut resp);

        assert_eq!(resp.header("X-Chain"), Some("A,B"));
    }

    #[test]
    fn disabled_modules_are_skipped_without_reordering() {
        let chain = ModuleChain::with(vec![
            Box::new(Marker {
                name: "A",
                enabled: true,
            }),
            Box::new(Marker {
                name: "off",
                enabled: false,
            }),
            Box::new(Marker {
                name: "B",
                enabled: true,
            }),
        ]);

        let mut req = request();
        let mut resp = ProxyResponse::empty();
        chain.apply(&mut req, &mut resp);

        assert_eq!(resp.header("X-Chain"), Some("A,B"));
    }

    #[test]
    fn a_failing_module_does_not_break_the_chain() {
        let chain = ModuleChain::with(vec![
            Box::new(Marker {
                name: "A",
                enabled: true,
            }),
            Box::new(Faulty),
            Box::new(Marker {
                name: "B",
                enabled: true,
            }),
        ]);

        let mut req = request();
        let mut resp = ProxyResponse::empty();
        chain.apply(&mut req, &mut resp);

        assert_eq!(resp.header("X-Chain"), Some("A,B"));
    }

    #[test]
    fn loading_unknown_modules_is_fatal() {
        let err = ModuleChain::load(&["nonsense".to_string()]).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownModule(name, _) if name == "nonsense"));
    }

    #[test]
    fn loading_nothing_is_fatal() {
        let err = ModuleChain::load(&[]).err().unwrap();
        assert!(matches!(err, ConfigError::EmptyModuleChain(_)));
    }

    #[test]
    fn builtin_chain_loads_in_requested_registration() {
        let chain =
            ModuleChain::load(&["strip-encoding".to_string(), "no-cache".to_string()]).unwrap();
        assert_eq!(chain.names(), vec!["strip-encoding", "no-cache"]);
    }
}
