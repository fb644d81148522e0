/*
 * executor.rs
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

//! One logical HTTP exchange, redirects included.
//!
//! Steps run strictly in order: resolve, connect, TLS handshake (https only), write, read.
//! A followed redirect rewrites the wire request and starts again at resolve, choosing plain
//! or TLS from the new scheme. The last response is followed by a graceful shutdown.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use crate::config::ClientOptions;
use crate::error::{Error, Result, Stage};
use crate::net::{self, bounded, TlsSetup, Transport};
use crate::protocol::http::h1::{self, WireRequest};
use crate::protocol::http::request::Request;
use crate::protocol::http::response::Response;
use crate::uri::{Scheme, Url};

pub(crate) struct Exchange {
    original: Request,
    wire: WireRequest,
    tls: TlsSetup,
    options: ClientOptions,
    timeout: Duration,
    redirects: usize,
}

impl Exchange {
    pub(crate) fn new(request: Request, tls: TlsSetup, options: &ClientOptions) -> Self {
        let wire = WireRequest::new(&request, &options.user_agent);
        let timeout = request
            .timeout_override()
            .unwrap_or(options.default_timeout);
        Self {
            original: request,
            wire,
            tls,
            options: options.clone(),
            timeout,
            redirects: 0,
        }
    }

    /// Drive the exchange to its final response.
    pub(crate) async fn run(mut self) -> Result<Response> {
        let span = tracing::debug_span!(
            "exchange",
            method = self.wire.method.as_str(),
            url = %self.wire.url,
        );
        self.drive().instrument(span).await
    }

    async fn drive(&mut self) -> Result<Response> {
        loop {
            let (response, transport) = self.dispatch().await?;
            // A 3xx without Location (304 Not Modified, for one) is a final response.
            let follow = self.original.follows_location()
                && response.is_redirect()
                && response.location().is_some();
            if follow {
                let location = redirect_location(&response)?;
                // The old connection is dropped rather than shut down.
                drop(transport);
                if self.redirects >= self.options.max_redirects {
                    return Err(Error::TooManyRedirects(self.options.max_redirects));
                }
                self.redirects += 1;
                tracing::debug!(
                    status = response.status(),
                    location = %location,
                    hop = self.redirects,
                    "following redirect"
                );
                self.wire
                    .redirect_to(location, &self.original, &self.options.user_agent);
                continue;
            }
            self.shutdown(transport).await;
            tracing::debug!(status = response.status(), "exchange complete");
            return Ok(response);
        }
    }

    /// One pass of resolve, connect, handshake, write, read against the current target.
    async fn dispatch(&self) -> Result<(Response, Transport)> {
        let url = &self.wire.url;
        let host = url.host();
        let limit = self.timeout;

        tracing::trace!(host, port = url.port(), "resolving");
        let addrs = bounded(Stage::Resolving, limit, net::resolve(host, url.port())).await?;
        let (tcp, peer) = bounded(Stage::Connecting, limit, net::connect(host, &addrs)).await?;
        tracing::trace!(%peer, tls = url.scheme().is_tls(), "connected");

        let mut transport = if url.scheme().is_tls() {
            let tls = bounded(
                Stage::TlsHandshaking,
                limit,
                self.tls.handshake(host, peer, tcp),
            )
            .await?;
            Transport::Tls(Box::new(tls))
        } else {
            Transport::Plain(tcp)
        };

        let head = self.wire.encode();
        bounded(Stage::Writing, limit, async {
            transport.write_all(&head).await.map_err(Error::Write)?;
            transport.flush().await.map_err(Error::Write)
        })
        .await?;
        tracing::trace!(request_target = %self.wire.target(), "request written");

        let mut buf = BytesMut::with_capacity(self.options.read_buffer_size);
        let response = bounded(
            Stage::Reading,
            limit,
            h1::read_response(
                &mut transport,
                &mut buf,
                self.options.max_head_bytes,
                self.options.read_buffer_size,
            ),
        )
        .await?;
        Ok((response, transport))
    }

    /// Close the transport. The response already read wins over any shutdown failure.
    async fn shutdown(&self, mut transport: Transport) {
        let result = bounded(Stage::Shutdown, self.timeout, async {
            transport.shutdown().await.map_err(Error::Shutdown)
        })
        .await;
        match result {
            Ok(()) => tracing::trace!("transport shut down"),
            Err(Error::Shutdown(e)) if net::is_peer_closed(&e) => {
                tracing::trace!(error = %e, "peer already closed")
            }
            Err(e) => tracing::warn!(error = %e, "shutdown failed after response was read"),
        }
    }
}

/// Location of a redirect response as an absolute http(s) URL.
fn redirect_location(response: &Response) -> Result<Url> {
    let location = response
        .location()
        .ok_or_else(|| Error::RedirectLocation {
            location: String::new(),
            reason: "missing Location header".to_string(),
        })?;
    let invalid = |reason: String| Error::RedirectLocation {
        location: location.to_string(),
        reason,
    };
    let url = Url::parse(location).map_err(|e| match e {
        Error::InvalidUrl { reason, .. } => invalid(reason),
        other => invalid(other.to_string()),
    })?;
    if !matches!(url.scheme(), Scheme::Http | Scheme::Https) {
        return Err(invalid(format!("{} is not an HTTP scheme", url.scheme())));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::request::{Headers, HttpVersion};
    use bytes::Bytes;

    fn redirect(location: Option<&str>) -> Response {
        let mut headers = Headers::new();
        if let Some(l) = location {
            headers.append("Location", l);
        }
        Response::from_parts(
            HttpVersion::Http1_1,
            301,
            "Moved Permanently".into(),
            headers,
            Bytes::new(),
        )
    }

    #[test]
    fn absolute_location_is_parsed() {
        let url = redirect_location(&redirect(Some("https://example.test/new"))).unwrap();
        assert_eq!(url.scheme(), Scheme::Https);
        assert_eq!(url.host(), "example.test");
        assert_eq!(url.path(), "/new");
    }

    #[test]
    fn relative_or_missing_location_is_rejected() {
        for location in [Some("/new"), Some("ht!tp://x"), Some("wss://example.test/"), None] {
            assert!(matches!(
                redirect_location(&redirect(location)),
                Err(Error::RedirectLocation { .. })
            ));
        }
    }
}
