//! Extracts session cookies from plaintext HTTP requests.

use anyhow::Context;

use crate::frame::{CapturedFrame, Transport};
use crate::parsers::{ParseEvent, Parser, looks_like_http_request, sniff_http_request};

pub struct CookieParser;

impl Parser for CookieParser {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn matches(&self, frame: &CapturedFrame) -> bool {
        frame.segment().is_some_and(|segment| {
            segment.transport == Transport::Tcp
                && segment.dst_port == 80
                && looks_like_http_request(&segment.payload)
        })
    }

    fn decode(&self, frame: &CapturedFrame) -> anyhow::Result<Option<ParseEvent>> {
        let segment = frame.segment().context("no transport segment")?;
        let request =
            sniff_http_request(&segment.payload).context("not an http request head")?;

        let Some(cookie) = request.header("Cookie") else {
            return Ok(None);
        };

        let host = request
            .host()
            .map(str::to_string)
            .unwrap_or_else(|| segment.dst_ip.to_string());

        Ok(Some(ParseEvent {
            protocol: "cookie",
            fields: vec![
                ("from", segment.src_ip.to_string()),
                ("host", host),
                ("cookie", cookie.to_string()),
            ],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testkit::tcp_frame;
    use std::net::Ipv4Addr;

    #[test]
    fn extracts_the_cookie_header() {
        let frame = tcp_frame(
            (Ipv4Addr::new(192, 168, 1, 50), 40000),
            (Ipv4Addr::new(93, 184, 216, 34), 80),
            b"GET / HTTP/1.1\r\nHost: example.com\r\nCookie: sid=deadbeef\r\n\r\n",
        );

        let event = CookieParser.decode(&frame).unwrap().unwrap();
        assert!(event.fields.contains(&("cookie", "sid=deadbeef".to_string())));
    }

    #[test]
    fn cookieless_requests_yield_nothing() {
        let frame = tcp_frame(
            (Ipv4Addr::new(192, 168, 1, 50), 40000),
            (Ipv4Addr::new(93, 184, 216, 34), 80),
            b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n",
        );
        assert_eq!(CookieParser.decode(&frame).unwrap(), None);
    }
}
