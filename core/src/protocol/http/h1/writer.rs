/*
 * writer.rs
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

//! Wire-level request: the executor's mutable copy of a caller's `Request`, and its HTTP/1.1
//! encoding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::http::request::{Headers, HttpVersion, Method, Request};
use crate::uri::Url;

/// What actually goes on the wire. Built from a `Request` and rewritten in place when a
/// redirect is followed.
#[derive(Debug, Clone)]
pub(crate) struct WireRequest {
    pub(crate) method: Method,
    pub(crate) version: HttpVersion,
    pub(crate) url: Url,
    pub(crate) headers: Headers,
    pub(crate) body: String,
}

impl WireRequest {
    pub(crate) fn new(request: &Request, user_agent: &str) -> Self {
        let endpoint = request.endpoint();
        let mut wire = Self {
            method: endpoint.method(),
            version: request.http_version(),
            url: endpoint.url(),
            headers: Headers::new(),
            body: String::new(),
        };
        wire.apply(request, user_agent);
        wire
    }

    /// Point at `location`. The caller's headers are applied again and body plus parameters
    /// are serialized again, as for the first dispatch.
    pub(crate) fn redirect_to(&mut self, location: Url, original: &Request, user_agent: &str) {
        self.url = location;
        self.apply(original, user_agent);
    }

    fn apply(&mut self, request: &Request, user_agent: &str) {
        let mut headers = Headers::new();
        headers.set("Host", self.url.host_header());
        headers.set("User-Agent", user_agent);
        for (name, value) in request.header_map().iter() {
            if !name.eq_ignore_ascii_case("Host") {
                headers.set(name, value);
            }
        }
        headers.set("Connection", "close");
        self.body = request.endpoint().serialize_body(request.body_text());
        if self.method != Method::Get {
            headers.set("Content-Length", self.body.len().to_string());
        }
        self.headers = headers;
    }

    /// Request target for the request line.
    pub(crate) fn target(&self) -> String {
        self.url.request_target()
    }

    /// Request line, headers and body.
    pub(crate) fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(256 + self.body.len());
        out.put_slice(self.method.as_str().as_bytes());
        out.put_u8(b' ');
        out.put_slice(self.target().as_bytes());
        out.put_u8(b' ');
        out.put_slice(self.version.as_str().as_bytes());
        out.put_slice(b"\r\n");
        for (name, value) in self.headers.iter() {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"\r\n");
        out.put_slice(self.body.as_bytes());
        out.freeze()
    }
}
