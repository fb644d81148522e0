/*
 * response.rs
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

//! HTTP response: status, reason, version, headers and the complete body.

use std::borrow::Cow;

use bytes::Bytes;

use crate::protocol::http::request::{Headers, HttpVersion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    version: HttpVersion,
    status: u16,
    reason: String,
    headers: Headers,
    body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            version: HttpVersion::Http1_1,
            status,
            reason: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub(crate) fn from_parts(
        version: HttpVersion,
        status: u16,
        reason: String,
        headers: Headers,
        body: Bytes,
    ) -> Self {
        Self {
            version,
            status,
            reason,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Body as text; invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Redirection class status (300-399).
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status() {
        assert!(Response::new(204).is_success());
        assert!(Response::new(301).is_redirect());
        assert!(Response::new(399).is_redirect());
        assert!(!Response::new(400).is_redirect());
        assert!(!Response::new(299).is_redirect());
    }

    #[test]
    fn text_is_lossy() {
        let mut headers = Headers::new();
        headers.append("Location", "https://example.test/new");
        let r = Response::from_parts(
            HttpVersion::Http1_1,
            301,
            "Moved Permanently".into(),
            headers,
            Bytes::from_static(b"ok\xff"),
        );
        assert_eq!(r.text(), "ok\u{fffd}");
        assert_eq!(r.location(), Some("https://example.test/new"));
        assert_eq!(r.reason(), "Moved Permanently");
    }
}
