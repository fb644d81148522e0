/*
 * uri.rs
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

//! Target URLs for http, https, ws and wss. Parsing is delegated to the `url` crate; this
//! module keeps the pieces the connection code needs (scheme, host, port, request target)
//! and serializes endpoint parameters.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{Error, Result};

/// Parameter key/value safe set: encode the separators used by `key=value&key=value`
/// plus space, `%`, `#` and `+`. Unreserved text passes through unchanged.
const PARAM: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'&')
    .add(b'=')
    .add(b'#')
    .add(b'+')
    .add(b'%')
    .add(b'?');

/// URL scheme. Only the four schemes the client can connect to are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    Ws,
    Wss,
}

impl Scheme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            "ws" => Some(Scheme::Ws),
            "wss" => Some(Scheme::Wss),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }

    /// True for schemes carried over TLS.
    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Https | Scheme::Wss)
    }

    pub fn default_port(&self) -> u16 {
        if self.is_tls() {
            443
        } else {
            80
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decomposed absolute URL: scheme, host, optional port, path, query, fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    scheme: Scheme,
    /// Host without IPv6 brackets.
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
}

impl Url {
    /// Parse an absolute URL. Relative references are rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidUrl {
            url: input.to_string(),
            reason,
        };
        let parsed = url::Url::parse(input.trim()).map_err(|e| invalid(e.to_string()))?;
        let scheme = Scheme::parse(parsed.scheme())
            .ok_or_else(|| invalid(format!("unsupported scheme {:?}", parsed.scheme())))?;
        let host = match parsed.host() {
            Some(url::Host::Domain(d)) if !d.is_empty() => d.to_string(),
            Some(url::Host::Ipv4(addr)) => addr.to_string(),
            Some(url::Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(invalid("URL has no host".to_string())),
        };
        Ok(Self {
            scheme,
            host,
            port: parsed.port(),
            path: parsed.path().to_string(),
            query: parsed.query().unwrap_or("").to_string(),
            fragment: parsed.fragment().unwrap_or("").to_string(),
        })
    }

    /// Build from parts. An empty path becomes `/`; a port equal to the scheme default is dropped.
    pub fn from_parts(
        scheme: Scheme,
        host: impl Into<String>,
        port: Option<u16>,
        path: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            scheme,
            host: host.into(),
            port: port.filter(|p| *p != scheme.default_port()),
            path: if path.is_empty() { "/".to_string() } else { path },
            query: query.into(),
            fragment: String::new(),
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port to connect to: the explicit port or the scheme default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    pub fn explicit_port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Origin-form request target: path plus `?query` when present.
    pub fn request_target(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        if self.query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, self.query)
        }
    }

    /// Value for the Host header: host, plus `:port` when it is not the scheme default.
    pub fn host_header(&self) -> String {
        match self.port {
            Some(p) if p != self.scheme.default_port() => format!("{}:{}", self.bracketed_host(), p),
            _ => self.bracketed_host(),
        }
    }

    fn bracketed_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host_header(), self.request_target())?;
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// Serialize parameters as `key=value` pairs joined by `&`, in the order given.
pub fn encode_params<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in params {
        if !out.is_empty() {
            out.push('&');
        }
        out.extend(utf8_percent_encode(key, PARAM));
        out.push('=');
        out.extend(utf8_percent_encode(value, PARAM));
    }
    out
}
