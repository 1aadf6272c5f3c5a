//! Decodes DNS query names from diverted lookups.

use anyhow::Context;

use crate::frame::{CapturedFrame, Transport};
use crate::parsers::{ParseEvent, Parser};

pub struct DnsParser;

impl Parser for DnsParser {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn matches(&self, frame: &CapturedFrame) -> bool {
        frame.segment().is_some_and(|segment| {
            segment.transport == Transport::Udp
                && (segment.dst_port == 53 || segment.src_port == 53)
        })
    }

    fn decode(&self, frame: &CapturedFrame) -> anyhow::Result<Option<ParseEvent>> {
        let segment = frame.segment().context("no transport segment")?;
        let packet = dns_parser::Packet::parse(&segment.payload)
            .map_err(|e| anyhow::anyhow!("malformed dns packet: {e}"))?;

        if packet.questions.is_empty() {
            return Ok(None);
        }

        let queries = packet
            .questions
            .iter()
            .map(|question| question.qname.to_string())
            .collect::<Vec<String>>()
            .join(",");

        Ok(Some(ParseEvent {
            protocol: "dns",
            fields: vec![
                ("from", segment.src_ip.to_string()),
                ("queries", queries),
            ],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testkit::udp_frame;
    use std::net::Ipv4Addr;

    /// A standard query for example.com, type A, class IN.
    const QUERY: &[u8] = &[
        0x12, 0x34, // transaction id
        0x01, 0x00, // flags: recursion desired
        0x00, 0x01, // one question
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // no answers/authority/additional
        0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00,
        0x00, 0x01, // type A
        0x00, 0x01, // class IN
    ];

    #[test]
    fn decodes_query_names() {
        let frame = udp_frame(
            (Ipv4Addr::new(192, 168, 1, 50), 40000),
            (Ipv4Addr::new(192, 168, 1, 1), 53),
            QUERY,
        );

        let parser = DnsParser;
        assert!(parser.matches(&frame));

        let event = parser.decode(&frame).unwrap().unwrap();
        assert!(event.fields.contains(&("queries", "example.com".to_string())));
    }

    #[test]
    fn garbage_payloads_error_cleanly() {
        let frame = udp_frame(
            (Ipv4Addr::new(192, 168, 1, 50), 40000),
            (Ipv4Addr::new(192, 168, 1, 1), 53),
            b"\x00\x01",
        );
        assert!(DnsParser.decode(&frame).is_err());
    }
}
