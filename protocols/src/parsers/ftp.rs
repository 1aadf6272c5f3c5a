//! Captures FTP control-channel credentials.

use anyhow::Context;

use crate::frame::{CapturedFrame, Transport};
use crate::parsers::{ParseEvent, Parser};

pub struct FtpParser;

impl Parser for FtpParser {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn matches(&self, frame: &CapturedFrame) -> bool {
        frame.segment().is_some_and(|segment| {
            segment.transport == Transport::Tcp
                && segment.dst_port == 21
                && !segment.payload.is_empty()
        })
    }

    fn decode(&self, frame: &CapturedFrame) -> anyhow::Result<Option<ParseEvent>> {
        let segment = frame.segment().context("no transport segment")?;
        let text = std::str::from_utf8(&segment.payload).context("non-utf8 ftp command")?;

        let mut fields: Vec<(&'static str, String)> =
            vec![("from", segment.src_ip.to_string())];
        for line in text.lines() {
            let upper = line.to_ascii_uppercase();
            if upper.starts_with("USER ") {
                fields.push(("user", line[5..].trim().to_string()));
            } else if upper.starts_with("PASS ") {
                fields.push(("pass", line[5..].trim().to_string()));
            }
        }

        // Only the source field means no credential command in this frame.
        if fields.len() == 1 {
            return Ok(None);
        }

        Ok(Some(ParseEvent {
            protocol: "ftp",
            fields,
        }))
    }
}
