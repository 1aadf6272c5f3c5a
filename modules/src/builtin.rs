//! Statically linked proxy modules.
//!
//! The registry below is the single extension point for the proxy pipeline:
//! name → constructor, resolved at configuration time. Adding a module means
//! adding an entry here and accepting that it will run with full privilege.

pub mod no_cache;
pub mod redirect;
pub mod strip_encoding;

use crate::ProxyModule;

type Constructor = fn() -> Box<dyn ProxyModule>;

pub const REGISTRY: &[(&str, Constructor)] = &[
    ("strip-encoding", || {
        Box::new(strip_encoding::StripEncoding)
    }),
    ("no-cache", || Box::new(no_cache::NoCache)),
    ("redirect", || Box::new(redirect::Redirect)),
];
