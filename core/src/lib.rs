/*
 * lib.rs
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

//! Tidewire core: asynchronous HTTP/1.1 and WebSocket client over TCP and TLS.
//!
//! - `protocol::http::AsyncSession` runs one request per task and reports through a callback,
//!   following redirects when asked.
//! - `protocol::http::ReuseClient` hands out sessions sharing a `TlsSessionCache`, so later
//!   handshakes to the same peer resume.
//! - `protocol::websocket::WebSocketSession` holds a long-lived WebSocket connection.
//!
//! Logging goes through `tracing`; install a subscriber to see it.

pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod session_cache;
pub mod uri;

mod cancel;

pub use config::ClientOptions;
pub use error::{Error, Result, Stage};
pub use net::{build_root_store, client_config_with_roots, default_client_config, Transport};
pub use session_cache::{SessionHandle, TlsSessionCache};
pub use uri::{Scheme, Url};
