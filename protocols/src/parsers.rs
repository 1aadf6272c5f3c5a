//! # Protocol Parser Registry
//!
//! Every decoder the sniffer can feed is registered here, in the order it
//! dispatches. A parser inspects a captured frame and, when it applies,
//! extracts structured fields into a [`ParseEvent`]. All matching parsers
//! fire on a frame; there is no first-match short-circuit, and one parser
//! failing on a frame never affects the others.

pub mod cookie;
pub mod dns;
pub mod ftp;
pub mod httpauth;
pub mod mail;
pub mod post;
pub mod url;

use std::fmt;

use snare_common::error::ConfigError;

use crate::frame::CapturedFrame;

/// Structured fields decoded from one frame by one parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseEvent {
    pub protocol: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

impl fmt::Display for ParseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.protocol.to_uppercase())?;
        for (name, value) in &self.fields {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap applicability check, run on every admitted frame.
    fn matches(&self, frame: &CapturedFrame) -> bool;

    /// Full decode. `Ok(None)` means the frame matched superficially but
    /// carried nothing worth reporting.
    fn decode(&self, frame: &CapturedFrame) -> anyhow::Result<Option<ParseEvent>>;
}

type Constructor = fn() -> Box<dyn Parser>;

/// Registration order is dispatch order.
const REGISTRY: &[(&str, Constructor)] = &[
    ("url", || Box::new(url::UrlParser)),
    ("post", || Box::new(post::PostParser)),
    ("cookie", || Box::new(cookie::CookieParser)),
    ("httpauth", || Box::new(httpauth::HttpAuthParser)),
    ("ftp", || Box::new(ftp::FtpParser)),
    ("mail", || Box::new(mail::MailParser)),
    ("dns", || Box::new(dns::DnsParser)),
];

pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Every registered parser, in registration order.
    pub fn all() -> Self {
        Self {
            parsers: REGISTRY.iter().map(|(_, build)| build()).collect(),
        }
    }

    /// An arbitrary parser set. Used by tests and by embedders.
    pub fn with(parsers: Vec<Box<dyn Parser>>) -> Self {
        Self { parsers }
    }

    /// Resolves a selection of parser names, `"*"` meaning all of them.
    /// Dispatch order stays registration order regardless of how the
    /// selection was written. Unknown names fail before any capture starts.
    pub fn select(names: &[String]) -> Result<Self, ConfigError> {
        if names.iter().any(|name| name == "*") {
            return Ok(Self::all());
        }

        for name in names {
            if !REGISTRY.iter().any(|(known, _)| known == name) {
                return Err(ConfigError::UnknownParser(
                    name.clone(),
                    Self::available().join(", "),
                ));
            }
        }

        let parsers = REGISTRY
            .iter()
            .filter(|(known, _)| names.iter().any(|name| name == known))
            .map(|(_, build)| build())
            .collect();

        Ok(Self { parsers })
    }

    pub fn available() -> Vec<&'static str> {
        REGISTRY.iter().map(|(name, _)| *name).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|parser| parser.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Parser> {
        self.parsers.iter().map(|parser| parser.as_ref())
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "HEAD", "PUT", "DELETE", "OPTIONS", "CONNECT", "PATCH", "TRACE",
];

/// A request head sniffed from a raw TCP payload. Line-based rather than a
/// strict parse: a segment truncated mid-head still yields the request line
/// and whatever headers made it into the capture.
pub(crate) struct SniffedRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub headers: Vec<(&'a str, &'a str)>,
}

impl<'a> SniffedRequest<'a> {
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    pub fn host(&self) -> Option<&'a str> {
        self.header("Host")
    }
}

pub(crate) fn looks_like_http_request(payload: &[u8]) -> bool {
    HTTP_METHODS.iter().any(|method| {
        payload.len() > method.len()
            && payload.starts_with(method.as_bytes())
            && payload[method.len()] == b' '
    })
}

pub(crate) fn sniff_http_request(payload: &[u8]) -> Option<SniffedRequest<'_>> {
    let text = std::str::from_utf8(&payload[..head_len(payload)]).ok()?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next()?;
    let mut parts = request_line.split(' ');
    let method = parts.next()?;
    let path = parts.next()?;
    if !HTTP_METHODS.contains(&method) {
        return None;
    }

    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim(), value.trim()))
        })
        .collect();

    Some(SniffedRequest {
        method,
        path,
        headers,
    })
}

/// The head portion of a payload: everything before the blank line, or the
/// whole payload when the head was truncated by the capture.
fn head_len(payload: &[u8]) -> usize {
    payload
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 2)
        .unwrap_or(payload.len())
}

/// The body portion, when the blank line made it into the capture.
pub(crate) fn body_of(payload: &[u8]) -> Option<&[u8]> {
    payload
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| &payload[pos + 4..])
}
