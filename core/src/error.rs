/*
 * error.rs
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

//! Client errors. Every failure of an exchange or WebSocket session is reported through
//! one `Error` value carrying enough detail to tell the failing step apart.

use std::fmt;
use std::io;
use std::time::Duration;

/// Step of a connection state machine. Used to label timeouts and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Connecting,
    TlsHandshaking,
    Writing,
    Reading,
    /// WebSocket opening handshake (HTTP upgrade).
    Upgrading,
    Shutdown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolving => "resolve",
            Stage::Connecting => "connect",
            Stage::TlsHandshaking => "TLS handshake",
            Stage::Writing => "write",
            Stage::Reading => "read",
            Stage::Upgrading => "WebSocket handshake",
            Stage::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from HTTP exchanges and WebSocket sessions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },

    /// TLS handshake failure, including an unusable SNI host name and certificate errors.
    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    /// Malformed response, handshake reply or frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid redirect location {location:?}: {reason}")]
    RedirectLocation { location: String, reason: String },

    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("shutdown failed: {0}")]
    Shutdown(#[source] io::Error),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("WebSocket is not connected")]
    NotConnected,

    /// A reuse session already has a request in flight.
    #[error("session already has a request in flight")]
    Busy,

    /// A WebSocket session runs once; reconnecting needs a new session.
    #[error("WebSocket session was already started")]
    AlreadyStarted,
}

impl Error {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// The state-machine step this error belongs to, when there is one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Resolve { .. } => Some(Stage::Resolving),
            Error::Connect { .. } => Some(Stage::Connecting),
            Error::Handshake { .. } => Some(Stage::TlsHandshaking),
            Error::Write(_) => Some(Stage::Writing),
            Error::Read(_) | Error::Protocol(_) => Some(Stage::Reading),
            Error::Timeout { stage, .. } => Some(*stage),
            Error::Shutdown(_) => Some(Stage::Shutdown),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_its_stage() {
        let e = Error::Timeout {
            stage: Stage::TlsHandshaking,
            after: Duration::from_millis(250),
        };
        assert_eq!(e.to_string(), "TLS handshake timed out after 250ms");
        assert_eq!(e.stage(), Some(Stage::TlsHandshaking));
        assert!(e.is_timeout());
    }

    #[test]
    fn source_is_kept() {
        use std::error::Error as _;
        let e = Error::Connect {
            host: "example.test".into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(e.source().is_some());
        assert_eq!(e.stage(), Some(Stage::Connecting));
    }
}
