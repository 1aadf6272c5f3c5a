//! Strips compression negotiation from intercepted requests so origin
//! responses come back as plaintext the other modules can work on.

use snare_protocols::http::{ProxyRequest, ProxyResponse};

use crate::ProxyModule;

pub struct StripEncoding;

impl ProxyModule for StripEncoding {
    fn name(&self) -> &'static str {
        "strip-encoding"
    }

    fn on_request(
        &self,
        request: &mut ProxyRequest,
        _response: &mut ProxyResponse,
    ) -> anyhow::Result<()> {
        request.remove_header("Accept-Encoding");
        request.remove_header("TE");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_encoding_negotiation_headers() {
        let (mut request, _) = ProxyRequest::parse_head(
            b"GET / HTTP/1.1\r\nHost: example.com\r\nAccept-Encoding: gzip, br\r\n\r\n",
        )
        .unwrap()
        .unwrap();
        let mut response = ProxyResponse::empty();

        StripEncoding.on_request(&mut request, &mut response).unwrap();

        assert_eq!(request.header("Accept-Encoding"), None);
        assert_eq!(request.host(), Some("example.com"));
    }
}
