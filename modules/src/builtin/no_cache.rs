//! Defeats client-side caching so every intercepted request produces a
//! full origin response instead of a 304.

use snare_protocols::http::{ProxyRequest, ProxyResponse};

use crate::ProxyModule;

pub struct NoCache;

impl ProxyModule for NoCache {
    fn name(&self) -> &'static str {
        "no-cache"
    }

    fn on_request(
        &self,
        request: &mut ProxyRequest,
        _response: &mut ProxyResponse,
    ) -> anyhow::Result<()> {
        request.remove_header("If-Modified-Since");
        request.remove_header("If-None-Match");
        request.set_header("Cache-Control", "no-cache");
        Ok(())
    }
}
