/*
 * endpoint.rs
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

//! Request targets. An endpoint names scheme, host, port, path, verb and parameters; the verb
//! decides where parameters go (GET: query string, others: body).

use crate::protocol::http::request::Method;
use crate::uri::{encode_params, Scheme, Url};

/// Where an endpoint's parameters are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPlacement {
    Query,
    Body,
}

impl Method {
    pub fn param_placement(&self) -> ParamPlacement {
        match self {
            Method::Get => ParamPlacement::Query,
            Method::Post | Method::Put | Method::Delete => ParamPlacement::Body,
        }
    }
}

/// HTTP endpoint. Parameters keep insertion order; setting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    method: Method,
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    path: String,
    params: Vec<(String, String)>,
}

impl Endpoint {
    /// Endpoint with the given verb over https on the default port.
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            scheme: Scheme::Https,
            host: host.into(),
            port: None,
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn get(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Get, host, path)
    }

    pub fn post(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Post, host, path)
    }

    pub fn put(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Put, host, path)
    }

    pub fn delete(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::Delete, host, path)
    }

    /// Transport scheme (http or https). WebSocket schemes map to their HTTP equivalent.
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = match scheme {
            Scheme::Ws => Scheme::Http,
            Scheme::Wss => Scheme::Https,
            other => other,
        };
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn params<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        params.into_iter().fold(self, |e, (k, v)| e.param(k, v))
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url_scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port to connect to: the explicit one or the scheme default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn param_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn param_placement(&self) -> ParamPlacement {
        self.method.param_placement()
    }

    /// Parameters serialized as `k=v&k=v`. Empty when there are none.
    pub fn param_string(&self) -> String {
        encode_params(self.param_pairs())
    }

    /// Query string carried by the target (GET parameters only).
    fn query(&self) -> String {
        match self.param_placement() {
            ParamPlacement::Query => self.param_string(),
            ParamPlacement::Body => String::new(),
        }
    }

    /// Origin-form target for the request line, e.g. `/?a=1` for a GET with one parameter.
    pub fn request_target(&self) -> String {
        self.url().request_target()
    }

    /// Body for the wire. GET carries none; other verbs carry `body` followed by the
    /// serialized parameters.
    pub fn serialize_body(&self, body: &str) -> String {
        match self.param_placement() {
            ParamPlacement::Query => String::new(),
            ParamPlacement::Body => {
                let mut out = body.to_string();
                out.push_str(&self.param_string());
                out
            }
        }
    }

    /// Full URL of this endpoint.
    pub fn url(&self) -> Url {
        Url::from_parts(self.scheme, self.host.clone(), self.port, self.path.clone(), self.query())
    }
}
