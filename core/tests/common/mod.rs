/*
 * common/mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Loopback servers shared by the integration tests. Each server accepts a
 * single connection, hands the captured request head back through a channel,
 * and answers with canned bytes or a scripted WebSocket exchange.
 */

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, HandshakeKind, RootCertStore, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

use tidewire_core::client_config_with_roots;
use tidewire_core::protocol::websocket::compute_accept;

/// Bytes of one request: head plus any body the client sent with Content-Length.
pub struct Captured {
    pub head: String,
    pub body: String,
}

impl Captured {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

pub async fn listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Read one request head, plus the body when Content-Length says there is one.
pub async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Captured {
    let mut data = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(i) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break i + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a request head");
        data.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let mut captured = Captured {
        head,
        body: String::new(),
    };
    let length: usize = captured
        .header("Content-Length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = data[head_end..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    captured.body = String::from_utf8_lossy(&body).to_string();
    captured
}

/// HTTP server answering each of `responses` on its own connection, in order.
pub async fn http_server(responses: Vec<String>) -> (SocketAddr, oneshot::Receiver<Vec<Captured>>) {
    let (listener, addr) = listener().await;
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut seen = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut stream).await);
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        let _ = tx.send(seen);
    });
    (addr, rx)
}

/// Accepts one connection, reads the request, never answers. Keeps the socket open until
/// the client goes away.
pub async fn silent_server() -> SocketAddr {
    let (listener, addr) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut sink = [0u8; 1024];
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    });
    addr
}

pub fn ok_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

pub fn redirect_response(status: u16, location: &str) -> String {
    format!(
        "HTTP/1.1 {} Moved\r\nLocation: {}\r\nContent-Length: 0\r\n\r\n",
        status, location
    )
}

/// Accept a WebSocket upgrade on `stream`, answering with the correct accept value.
pub async fn accept_upgrade(stream: &mut TcpStream) -> Captured {
    let request = read_request(stream).await;
    let key = request.header("Sec-WebSocket-Key").unwrap();
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        compute_accept(&key)
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    request
}

/// Unmasked server frame.
pub fn server_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x80 | opcode];
    if payload.len() < 126 {
        out.push(payload.len() as u8);
    } else {
        out.push(126);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Read one masked client frame and return (opcode, unmasked payload).
pub async fn read_client_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await.unwrap();
    assert_eq!(head[1] & 0x80, 0x80, "client frames must be masked");
    let len = match head[1] & 0x7f {
        126 => {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext).await.unwrap();
            u16::from_be_bytes(ext) as usize
        }
        127 => {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext).await.unwrap();
            u64::from_be_bytes(ext) as usize
        }
        n => n as usize,
    };
    let mut mask = [0u8; 4];
    stream.read_exact(&mut mask).await.unwrap();
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    for (i, b) in payload.iter_mut().enumerate() {
        *b ^= mask[i % 4];
    }
    (head[0] & 0x0f, payload)
}

/// Self-signed identity for `localhost`, with a client config trusting it and an acceptor
/// serving it. Acceptors cloned from one identity share the server's session store, so a
/// client can resume against any of them.
pub struct TlsIdentity {
    pub client: Arc<ClientConfig>,
    pub acceptor: TlsAcceptor,
}

impl TlsIdentity {
    pub fn localhost() -> Self {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let key: PrivateKeyDer<'static> =
            PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der()).into();
        let cert_der = CertificateDer::from(cert.cert);

        let mut roots = RootCertStore::empty();
        roots.add(cert_der.clone()).unwrap();
        let server = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key)
            .unwrap();
        Self {
            client: client_config_with_roots(roots),
            acceptor: TlsAcceptor::from(Arc::new(server)),
        }
    }
}

/// HTTPS server answering each of `responses` on its own TLS connection, in order. Reports
/// how every handshake was negotiated and the requests it saw.
pub async fn https_server(
    acceptor: TlsAcceptor,
    responses: Vec<String>,
) -> (
    SocketAddr,
    oneshot::Receiver<(Vec<Option<HandshakeKind>>, Vec<Captured>)>,
) {
    let (listener, addr) = listener().await;
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut kinds = Vec::new();
        let mut seen = Vec::new();
        for response in responses {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut stream = acceptor.accept(tcp).await.unwrap();
            kinds.push(stream.get_ref().1.handshake_kind());
            seen.push(read_request(&mut stream).await);
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        let _ = tx.send((kinds, seen));
    });
    (addr, rx)
}
