/*
 * config.rs
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

//! Client options shared by sessions: timeouts, redirect limit, buffer and size limits.
//! Defaults can be overridden from the environment with `ClientOptions::from_env()`.

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on resolve + connect + handshake for WebSocket sessions.
pub const DEFAULT_WS_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

pub const DEFAULT_MAX_REDIRECTS: usize = 10;

pub const DEFAULT_USER_AGENT: &str = concat!("tidewire/", env!("CARGO_PKG_VERSION"));

const ENV_TIMEOUT_MS: &str = "TIDEWIRE_TIMEOUT_MS";
const ENV_WS_CONNECT_TIMEOUT_MS: &str = "TIDEWIRE_WS_CONNECT_TIMEOUT_MS";
const ENV_MAX_REDIRECTS: &str = "TIDEWIRE_MAX_REDIRECTS";
const ENV_USER_AGENT: &str = "TIDEWIRE_USER_AGENT";

/// Options for HTTP and WebSocket sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Timeout given to requests that do not set their own.
    pub default_timeout: Duration,
    pub ws_connect_timeout: Duration,
    /// Longest redirect chain followed before failing.
    pub max_redirects: usize,
    /// Sent unless the request sets its own User-Agent.
    pub user_agent: String,
    pub read_buffer_size: usize,
    /// Limit on status line plus headers of a response.
    pub max_head_bytes: usize,
    /// Limit on one reassembled WebSocket message.
    pub max_message_bytes: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            ws_connect_timeout: DEFAULT_WS_CONNECT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            read_buffer_size: 8192,
            max_head_bytes: 64 * 1024,
            max_message_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ClientOptions {
    /// Defaults overlaid with `TIDEWIRE_*` environment variables. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup (environment, or a map in tests).
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_TIMEOUT_MS) {
            self.default_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_WS_CONNECT_TIMEOUT_MS) {
            self.ws_connect_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<usize>(&lookup, ENV_MAX_REDIRECTS) {
            self.max_redirects = n;
        }
        if let Some(ua) = lookup(ENV_USER_AGENT).filter(|s| !s.trim().is_empty()) {
            self.user_agent = ua;
        }
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_ws_connect_timeout(mut self, timeout: Duration) -> Self {
        self.ws_connect_timeout = timeout;
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable option");
            None
        }
    }
}
