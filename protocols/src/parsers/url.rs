//! Decodes requested URLs out of plaintext HTTP traffic.

use anyhow::Context;

use crate::frame::{CapturedFrame, Transport};
use crate::parsers::{ParseEvent, Parser, looks_like_http_request, sniff_http_request};

pub struct UrlParser;

impl Parser for UrlParser {
    fn name(&self) -> &'static str {
        "url"
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

        let host = request
            .host()
            .map(str::to_string)
            .unwrap_or_else(|| segment.dst_ip.to_string());

        Ok(Some(ParseEvent {
            protocol: "url",
            fields: vec![
                ("from", segment.src_ip.to_string()),
                ("method", request.method.to_string()),
                ("url", format!("{host}{}", request.path)),
            ],
        }))
    }
}
