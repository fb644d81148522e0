/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tidewire, an asynchronous HTTP and WebSocket client.
 *
 * Tidewire is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tidewire is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tidewire.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Transport plumbing shared by the HTTP executor and WebSocket sessions: resolve, TCP connect,
//! TLS handshake with optional session reuse, and a stream type that is either plain or TLS.
//!
//! Every step returns the crate `Error` for its stage; `bounded` wraps a step in the
//! caller's timeout.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{HandshakeKind, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result, Stage};
use crate::session_cache::TlsSessionCache;

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
pub fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(e) => tracing::debug!(error = %e, "native root certificates unavailable"),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.to_vec();
    }
    root_store
}

/// TLS client config for HTTP/1.1 and WebSocket (ALPN `http/1.1`) trusting `roots`.
pub fn client_config_with_roots(roots: RootCertStore) -> Arc<ClientConfig> {
    let mut config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

/// TLS client config trusting native + Mozilla roots.
pub fn default_client_config() -> Arc<ClientConfig> {
    client_config_with_roots(build_root_store())
}

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Transport::Plain(s) => s.peer_addr(),
            Transport::Tls(s) => s.get_ref().0.peer_addr(),
        }
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Run one step under `limit`. Exceeding it yields `Error::Timeout` for `stage`.
pub(crate) async fn bounded<T, F>(stage: Stage, limit: Duration, step: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tracing::trace!(%stage, "step started");
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            stage,
            after: limit,
        }),
    }
}

/// Resolve `host:port` to socket addresses.
pub(crate) async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| Error::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(Error::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(addrs)
}

/// Connect to the first address that accepts. Returns the stream and the peer it reached.
pub(crate) async fn connect(host: &str, addrs: &[SocketAddr]) -> Result<(TcpStream, SocketAddr)> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(tcp) => {
                let _ = tcp.set_nodelay(true);
                return Ok((tcp, *addr));
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(Error::Connect {
        host: host.to_string(),
        source: last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses")),
    })
}

/// TLS client side: the caller's pre-configured rustls config plus an optional shared
/// session cache.
#[derive(Clone)]
pub struct TlsSetup {
    config: Arc<ClientConfig>,
    cache: Option<Arc<TlsSessionCache>>,
}

impl TlsSetup {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    pub fn with_cache(config: Arc<ClientConfig>, cache: Arc<TlsSessionCache>) -> Self {
        Self {
            config,
            cache: Some(cache),
        }
    }

    pub fn cache(&self) -> Option<&Arc<TlsSessionCache>> {
        self.cache.as_ref()
    }

    /// TLS handshake over `tcp` with SNI set from `host`. With a cache, a session recorded
    /// for `peer` is offered for resumption, and a newly negotiated session is recorded.
    pub(crate) async fn handshake(
        &self,
        host: &str,
        peer: SocketAddr,
        tcp: TcpStream,
    ) -> Result<TlsStream<TcpStream>> {
        let handshake_err = |source: io::Error| Error::Handshake {
            host: host.to_string(),
            source,
        };
        let server_name = ServerName::try_from(host.to_string()).map_err(|_| {
            handshake_err(io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))
        })?;

        let (connector, session) = match &self.cache {
            Some(cache) => {
                let (handle, resume) = cache.checkout(&peer);
                tracing::debug!(%peer, resume, "starting TLS handshake");
                let mut config = (*self.config).clone();
                config.resumption = handle.resumption();
                (TlsConnector::from(Arc::new(config)), Some((cache, handle)))
            }
            None => (TlsConnector::from(self.config.clone()), None),
        };

        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(handshake_err)?;

        if let Some((cache, handle)) = session {
            match tls.get_ref().1.handshake_kind() {
                Some(HandshakeKind::Resumed) => tracing::debug!(%peer, "TLS session resumed"),
                _ => cache.record(peer, handle),
            }
        }
        Ok(tls)
    }
}

/// True for shutdown errors that only mean the peer already closed its side.
pub(crate) fn is_peer_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_closed_kinds() {
        assert!(is_peer_closed(&io::Error::from(io::ErrorKind::UnexpectedEof)));
        assert!(is_peer_closed(&io::Error::from(io::ErrorKind::NotConnected)));
        assert!(!is_peer_closed(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn bounded_reports_stage_on_timeout() {
        let never = std::future::pending::<Result<()>>();
        let err = bounded(Stage::Reading, Duration::from_millis(20), never)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                stage: Stage::Reading,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn connect_reports_refused_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = connect("127.0.0.1", &[addr]).await.unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }

    #[tokio::test]
    async fn resolve_loopback() {
        let addrs = resolve("127.0.0.1", 8080).await.unwrap();
        assert_eq!(addrs, vec![SocketAddr::from(([127, 0, 0, 1], 8080))]);
    }
}
