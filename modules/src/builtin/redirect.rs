//! Answers every intercepted request with a redirect, without ever
//! contacting the origin. The sample short-circuiting module.

use snare_protocols::http::{ProxyRequest, ProxyResponse};

use crate::ProxyModule;

const DESTINATION: &str = "http://example.com/";

pub struct Redirect;

impl ProxyModule for Redirect {
    fn name(&self) -> &'static str {
        "redirect"
    }

    fn on_request(
        &self,
        _request: &mut ProxyRequest,
        response: &mut ProxyResponse,
    ) -> anyhow::Result<()> {
        response.short_circuit(302, "Found", Vec::new());
        response.set_header("Location", DESTINATION);
        response.set_header("Connection", "close");
        Ok(())
    }
}
