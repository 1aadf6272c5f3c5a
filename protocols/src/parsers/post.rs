//! Decodes POST bodies out of plaintext HTTP traffic.

use anyhow::Context;

use crate::frame::{CapturedFrame, Transport};
use crate::parsers::{ParseEvent, Parser, body_of, sniff_http_request};

/// Bodies are truncated for logging; a capture is not a content archive.
const MAX_BODY: usize = 512;

pub struct PostParser;

impl Parser for PostParser {
    fn name(&self) -> &'static str {
        "post"
    }

    fn matches(&self, frame: &CapturedFrame) -> bool {
        frame.segment().is_some_and(|segment| {
            segment.transport == Transport::Tcp
                && segment.dst_port == 80
                && segment.payload.starts_with(b"POST ")
        })
    }

    fn decode(&self, frame: &CapturedFrame) -> anyhow::Result<Option<ParseEvent>> {
        let segment = frame.segment().context("no transport segment")?;
        let request =
            sniff_http_request(&segment.payload).context("not an http request head")?;

        let Some(body) = body_of(&segment.payload).filter(|body| !body.is_empty()) else {
            // Body in a later segment; nothing to report from this frame.
            return Ok(None);
        };

        let host = request
            .host()
            .map(str::to_string)
            .unwrap_or_else(|| segment.dst_ip.to_string());
        let shown = &body[..body.len().min(MAX_BODY)];

        Ok(Some(ParseEvent {
            protocol: "post",
            fields: vec![
                ("from", segment.src_ip.to_string()),
                ("url", format!("{host}{}", request.path)),
                ("data", String::from_utf8_lossy(shown).into_owned()),
            ],
        }))
    }
}
