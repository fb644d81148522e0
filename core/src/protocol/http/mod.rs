/*
 * mod.rs
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

//! HTTP/1.1 client.
//!
//! - `Endpoint` + `Request` describe what to send; `Response` is what comes back.
//! - `AsyncSession::execute_async` runs one exchange per task and reports through a callback.
//! - `ReuseClient` / `ReuseSession` add TLS session resumption through a shared cache.
//! - Buffers: `bytes` (BytesMut for the parse buffer, Bytes for bodies).
//! - Each exchange uses its own connection and sends `Connection: close`.

mod endpoint;
mod executor;
mod request;
mod response;
mod reuse;
mod session;

pub mod h1;

pub use endpoint::{Endpoint, ParamPlacement};
pub use request::{Headers, HttpVersion, Method, Request};
pub use response::Response;
pub use reuse::{ReuseClient, ReuseSession};
pub use session::{AsyncSession, RequestHandle};
