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

//! WebSocket client (RFC 6455) over plain TCP or TLS.
//!
//! `WebSocketSession` owns one connection: handshake, read loop, sends and close.
//! Observers receive messages, control frames and state transitions on the read-loop task.

pub mod frame;
pub mod handshake;
mod message;
mod session;

pub use handshake::compute_accept;
pub use message::{ControlFrame, Message, CLOSE_NORMAL};
pub use session::{ConnectionState, WebSocketBuilder, WebSocketSession};
