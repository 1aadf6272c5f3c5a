#![cfg(test)]
//! End-to-end proxy interception over loopback: a stub origin, the real
//! listener/accept path, and the module chain in between.

use std::net::Ipv4Addr;
use std::sync::Arc;

use snare_core::proxy::ProxyServer;
use snare_core::session::Session;
use snare_modules::{ModuleChain, ProxyModule};
use snare_protocols::http::{ProxyRequest, ProxyResponse};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::support;

/// A stub origin that records the bytes it received and answers a fixed
/// response.
async fn spawn_origin() -> (std::net::SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut received = Vec::new();
        let mut chunk = [0u8; 4096];
        while !received.windows(4).any(|window| window == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&chunk[..n]);
        }

        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
            .await
            .unwrap();
        received
    });

    (addr, task)
}

async fn run_proxy(session: &Arc<Session>, chain: ModuleChain) -> std::net::SocketAddr {
    let server = ProxyServer::new(Ipv4Addr::LOCALHOST, 0, chain);
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let engine = tokio::spawn(server.serve(listener, session.clone()));
    session.register_engine(engine);
    addr
}

async fn roundtrip(proxy: std::net::SocketAddr, request: &str) -> String {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn an_empty_chain_forwards_requests_unmodified() {
    let (origin_addr, origin) = spawn_origin().await;
    let session = support::session();
    let proxy_addr = run_proxy(&session, ModuleChain::empty()).await;

    let request = format!(
        "GET /hello HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nX-Probe: intact\r\n\r\n",
        origin_addr.port()
    );
    let response = roundtrip(proxy_addr, &request).await;

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with("hello"));

    let upstream = String::from_utf8_lossy(&origin.await.unwrap()).into_owned();
    assert!(upstream.starts_with("GET /hello HTTP/1.1\r\n"));
    // Client headers pass through untouched; the forced Connection header
    // is the proxy's only addition.
    assert!(upstream.contains("X-Probe: intact\r\n"));
    assert!(upstream.contains("Connection: close\r\n"));

    session.finalize().await;
}

struct Marker(&'static str);

impl ProxyModule for Marker {
    fn name(&self) -> &'static str {
        self.0
    }

    fn on_request(
        &self,
        request: &mut ProxyRequest,
        response: &mut ProxyResponse,
    ) -> anyhow::Result<()> {
        request.remove_header("X-Secret");
        response.append_header("X-Chain", self.0);
        Ok(())
    }
}

#[tokio::test]
async fn modules_run_in_order_before_the_upstream_leg() {
    let (origin_addr, origin) = spawn_origin().await;
    let session = support::session();
    let chain = ModuleChain::with(vec![Box::new(Marker("A")), Box::new(Marker("B"))]);
    let proxy_addr = run_proxy(&session, chain).await;

    let request = format!(
        "GET / HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nX-Secret: hunter2\r\n\r\n",
        origin_addr.port()
    );
    let response = roundtrip(proxy_addr, &request).await;

    // Chain-added headers survive the merge with the origin response, in
    // registration order.
    assert!(response.contains("X-Chain: A,B\r\n"));

    // The mutated request is what went upstream.
    let upstream = String::from_utf8_lossy(&origin.await.unwrap()).into_owned();
    assert!(!upstream.contains("X-Secret"));

    session.finalize().await;
}

struct Answer;

impl ProxyModule for Answer {
    fn name(&self) -> &'static str {
        "answer"
    }

    fn on_request(
        &self,
        _request: &mut ProxyRequest,
        response: &mut ProxyResponse,
    ) -> anyhow::Result<()> {
        response.short_circuit(403, "Forbidden", b"blocked".to_vec());
        Ok(())
    }
}

#[tokio::test]
async fn a_short_circuiting_module_skips_the_origin() {
    let session = support::session();
    let chain = ModuleChain::with(vec![Box::new(Answer)]);
    let proxy_addr = run_proxy(&session, chain).await;

    // Host points at a dead port; a short circuit must never dial it.
    let response = roundtrip(
        proxy_addr,
        "GET / HTTP/1.1\r\nHost: 127.0.0.1:9\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 403 Forbidden"));
    assert!(response.ends_with("blocked"));

    session.finalize().await;
}
