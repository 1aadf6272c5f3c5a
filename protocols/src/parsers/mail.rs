//! Captures credentials on plaintext mail protocols (SMTP, POP3, IMAP).

use anyhow::Context;

use crate::frame::{CapturedFrame, Transport};
use crate::parsers::{ParseEvent, Parser};

const MAIL_PORTS: &[u16] = &[25, 110, 143];

pub struct MailParser;

impl Parser for MailParser {
    fn name(&self) -> &'static str {
        "mail"
    }

    fn matches(&self, frame: &CapturedFrame) -> bool {
        frame.segment().is_some_and(|segment| {
            segment.transport == Transport::Tcp
                && MAIL_PORTS.contains(&segment.dst_port)
                && !segment.payload.is_empty()
        })
    }

    fn decode(&self, frame: &CapturedFrame) -> anyhow::Result<Option<ParseEvent>> {
        let segment = frame.segment().context("no transport segment")?;
        let text = std::str::from_utf8(&segment.payload).context("non-utf8 mail command")?;

        let mut fields: Vec<(&'static str, String)> =
            vec![("from", segment.src_ip.to_string())];
        for line in text.lines() {
            let upper = line.to_ascii_uppercase();
            if upper.starts_with("USER ")
                || upper.starts_with("PASS ")
                || upper.starts_with("AUTH ")
                || upper.contains(" LOGIN ")
            {
                fields.push(("credential", line.trim().to_string()));
            }
        }

        if fields.len() == 1 {
            return Ok(None);
        }

        Ok(Some(ParseEvent {
            protocol: "mail",
            fields,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testkit::tcp_frame;
    use std::net::Ipv4Addr;

    #[test]
    fn captures_auth_exchanges() {
        let frame = tcp_frame(
            (Ipv4Addr::new(192, 168, 1, 50), 40000),
            (Ipv4Addr::new(192, 168, 1, 9), 25),
            b"AUTH PLAIN AGFkbWluAGh1bnRlcjI=\r\n",
        );

        let event = MailParser.decode(&frame).unwrap().unwrap();
        assert_eq!(event.protocol, "mail");
        assert!(
            event
                .fields
                .contains(&("credential", "AUTH PLAIN AGFkbWluAGh1bnRlcjI=".to_string()))
        );
    }

    #[test]
    fn message_data_yields_nothing() {
        let frame = tcp_frame(
            (Ipv4Addr::new(192, 168, 1, 50), 40000),
            (Ipv4Addr::new(192, 168, 1, 9), 25),
            b"Subject: hello\r\n\r\nbody\r\n",
        );
        assert_eq!(MailParser.decode(&frame).unwrap(), None);
    }
}
