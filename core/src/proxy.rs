//! # Intercepting HTTP Proxy
//!
//! Receives the plaintext HTTP connections the firewall redirects here.
//! Each accepted connection is an independent task: parse the request, run
//! the module chain over it, forward upstream unless a module already
//! answered, and relay the response back. The only thing connections share
//! is the read-mostly module chain.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use snare_modules::ModuleChain;
use snare_protocols::http::{ProxyRequest, ProxyResponse};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::session::Session;

const IO_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_HEAD: usize = 64 * 1024;

pub struct ProxyServer {
    address: Ipv4Addr,
    port: u16,
    chain: Arc<ModuleChain>,
}

impl ProxyServer {
    pub fn new(address: Ipv4Addr, port: u16, chain: ModuleChain) -> Self {
        Self {
            address,
            port,
            chain: Arc::new(chain),
        }
    }

    /// Binds the listener. Fails fast, reporting the bind error, when
    /// the port is already taken.
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        TcpListener::bind((self.address, self.port))
            .await
            .with_context(|| format!("binding proxy listener on {}:{}", self.address, self.port))
    }

    /// Accept loop. Exits on the session's shutdown signal, closing the
    /// listener while in-flight connection tasks run to completion.
    pub async fn serve(self, listener: TcpListener, session: Arc<Session>) {
        if self.chain.is_empty() {
            warn!("no proxy module loaded, requests will be forwarded unmodified");
        } else {
            info!("proxy module chain: {}", self.chain.names().join(" -> "));
        }

        let mut shutdown = session.shutdown();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let chain = self.chain.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, chain).await {
                                debug!("proxy connection from {peer}: {e:#}");
                            }
                        });
                    }
                    Err(e) => warn!("proxy accept failed: {e}"),
                }
            }
        }
    }
}

/// One intercepted connection, owned end to end by this task.
pub async fn handle_connection(
    mut client: TcpStream,
    chain: Arc<ModuleChain>,
) -> anyhow::Result<()> {
    let mut request = read_request(&mut client).await?;
    let mut response = ProxyResponse::empty();

    debug!("intercepted {} {}", request.method, request.path);
    chain.apply(&mut request, &mut response);

    // A module that filled the response has answered for the origin.
    if !response.is_filled() {
        fetch_origin(&mut request, &mut response).await?;
    }

    timeout(IO_TIMEOUT, client.write_all(&response.to_bytes()))
        .await
        .context("client write timed out")??;
    Ok(())
}

async fn read_request(client: &mut TcpStream) -> anyhow::Result<ProxyRequest> {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);

    let (mut request, head_len) = loop {
        let mut chunk = [0u8; 4096];
        let n = timeout(IO_TIMEOUT, client.read(&mut chunk))
            .await
            .context("client read timed out")??;
        if n == 0 {
            bail!("client closed before sending a full request head");
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_HEAD {
            bail!("request head too large");
        }

        if let Some(parsed) = ProxyRequest::parse_head(&buf)? {
            break parsed;
        }
    };

    let needed = head_len + request.content_length();
    while buf.len() < needed {
        let mut chunk = [0u8; 4096];
        let n = timeout(IO_TIMEOUT, client.read(&mut chunk))
            .await
            .context("client read timed out")??;
        if n == 0 {
            bail!("client closed mid-body");
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    request.body = buf[head_len..needed].to_vec();
    Ok(request)
}

/// Forwards the (possibly mutated) request to the origin named by its Host
/// header and merges the origin's answer into the response, preserving any
/// headers the module chain added.
async fn fetch_origin(
    request: &mut ProxyRequest,
    response: &mut ProxyResponse,
) -> anyhow::Result<()> {
    let host = request
        .host()
        .context("intercepted request has no Host header")?
        .to_string();
    let authority = if host.contains(':') {
        host.clone()
    } else {
        format!("{host}:80")
    };

    // The upstream leg is one-shot; reading to EOF delimits bodies that
    // carry no Content-Length.
    request.set_header("Connection", "close");

    let mut upstream = timeout(IO_TIMEOUT, TcpStream::connect(&authority))
        .await
        .context("origin connect timed out")?
        .with_context(|| format!("connecting to origin {authority}"))?;

    timeout(IO_TIMEOUT, upstream.write_all(&request.to_bytes()))
        .await
        .context("origin write timed out")??;

    let mut buf: Vec<u8> = Vec::with_capacity(8192);
    let (mut origin, head_len) = loop {
        let mut chunk = [0u8; 8192];
        let n = timeout(IO_TIMEOUT, upstream.read(&mut chunk))
            .await
            .context("origin read timed out")??;
        if n == 0 {
            bail!("origin {authority} closed before a full response head");
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_HEAD {
            bail!("response head too large");
        }

        if let Some(parsed) = ProxyResponse::parse_head(&buf)? {
            break parsed;
        }
    };

    let mut body = buf[head_len..].to_vec();
    match origin.content_length() {
        Some(length) => {
            while body.len() < length {
                let mut chunk = [0u8; 8192];
                let n = timeout(IO_TIMEOUT, upstream.read(&mut chunk))
                    .await
                    .context("origin read timed out")??;
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
            }
        }
        None => loop {
            let mut chunk = [0u8; 8192];
            let n = timeout(IO_TIMEOUT, upstream.read(&mut chunk))
                .await
                .context("origin read timed out")??;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        },
    }

    origin.body = body;
    response.merge_origin(origin);
    Ok(())
}
