//! Plaintext HTTP request/response objects for the intercepting proxy.
//!
//! Heads are parsed with `httparse`; headers keep their wire order in a
//! plain vector so a serialized request leaves this host byte-compatible
//! with what the client sent, modulo whatever the module chain changed.
//! Each pair is owned exclusively by one connection task.

use anyhow::Context;

const MAX_HEADERS: usize = 64;

#[derive(Clone, Debug)]
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    pub version: u8,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub reason: String,
    pub version: u8,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    filled: bool,
}

impl ProxyRequest {
    /// Parses a request head from `buf`. Returns `Ok(None)` while the head
    /// is still incomplete; on completion, the request (body empty) plus
    /// the number of bytes the head consumed.
    pub fn parse_head(buf: &[u8]) -> anyhow::Result<Option<(Self, usize)>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);

        match parsed.parse(buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let request = Self {
                    method: parsed.method.context("request without method")?.to_string(),
                    path: parsed.path.context("request without path")?.to_string(),
                    version: parsed.version.unwrap_or(1),
                    headers: collect_headers(parsed.headers),
                    body: Vec::new(),
                };
                Ok(Some((request, head_len)))
            }
            Ok(httparse::Status::Partial) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("malformed request head: {e}")),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        set_header(&mut self.headers, name, value);
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers
            .retain(|(header, _)| !header.eq_ignore_ascii_case(name));
    }

    pub fn host(&self) -> Option<&str> {
        self.header("Host")
    }

    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Serializes the request for the upstream leg, headers in order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} HTTP/1.{}\r\n", self.method, self.path, self.version)
            .into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl ProxyResponse {
    /// The placeholder a connection starts with. Not considered filled
    /// until a module short-circuits or the origin's answer is merged in.
    pub fn empty() -> Self {
        Self {
            status: 200,
            reason: "OK".to_string(),
            version: 1,
            headers: Vec::new(),
            body: Vec::new(),
            filled: false,
        }
    }

    /// Parses a response head. Same contract as [`ProxyRequest::parse_head`].
    pub fn parse_head(buf: &[u8]) -> anyhow::Result<Option<(Self, usize)>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut headers);

        match parsed.parse(buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let response = Self {
                    status: parsed.code.context("response without status")?,
                    reason: parsed.reason.unwrap_or("").to_string(),
                    version: parsed.version.unwrap_or(1),
                    headers: collect_headers(parsed.headers),
                    body: Vec::new(),
                    filled: true,
                };
                Ok(Some((response, head_len)))
            }
            Ok(httparse::Status::Partial) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("malformed response head: {e}")),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Turns this response into a module-authored one, skipping the
    /// upstream leg for the connection.
    pub fn short_circuit(&mut self, status: u16, reason: &str, body: Vec<u8>) {
        self.status = status;
        self.reason = reason.to_string();
        set_header(&mut self.headers, "Content-Length", &body.len().to_string());
        self.body = body;
        self.filled = true;
    }

    /// Replaces this response with the origin's answer while preserving
    /// every header the module chain already added.
    pub fn merge_origin(&mut self, origin: ProxyResponse) {
        let added = std::mem::take(&mut self.headers);

        self.status = origin.status;
        self.reason = origin.reason;
        self.version = origin.version;
        self.headers = origin.headers;
        self.body = origin.body;
        self.filled = true;

        for (name, value) in added {
            append_value(&mut self.headers, &name, &value);
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        set_header(&mut self.headers, name, value);
    }

    /// Appends to an existing header value (comma separated), or inserts
    /// the header when absent.
    pub fn append_header(&mut self, name: &str, value: &str) {
        append_value(&mut self.headers, name, value);
    }

    pub fn content_length(&self) -> Option<usize> {
        find_header(&self.headers, "Content-Length")
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.{} {} {}\r\n",
            self.version, self.status, self.reason
        )
        .into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

fn collect_headers(headers: &[httparse::Header]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|header| {
            (
                header.name.to_string(),
                String::from_utf8_lossy(header.value).into_owned(),
            )
        })
        .collect()
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(header, _)| header.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(header, _)| header.eq_ignore_ascii_case(name))
    {
        Some((_, existing)) => *existing = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

fn append_value(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(header, _)| header.eq_ignore_ascii_case(name))
    {
        Some((_, existing)) => *existing = format!("{existing},{value}"),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
