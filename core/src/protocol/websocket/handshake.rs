/*
 * handshake.rs
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

//! WebSocket opening handshake (RFC 6455 §4): GET with Upgrade, check the 101 response and
//! its Sec-WebSocket-Accept.

use std::io;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::protocol::http::Response;
use crate::uri::Url;

/// GUID appended to the key before hashing (RFC 6455 §4.2.2).
const WS_ACCEPT_MAGIC: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Fresh Sec-WebSocket-Key: 16 random bytes, base64-encoded.
pub fn generate_key() -> Result<String> {
    let mut raw = [0u8; 16];
    getrandom::getrandom(&mut raw)
        .map_err(|e| Error::Write(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
    Ok(STANDARD.encode(raw))
}

/// Sec-WebSocket-Accept value a server must answer for `key`.
pub fn compute_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_ACCEPT_MAGIC);
    STANDARD.encode(hasher.finalize())
}

/// Upgrade request for `url`.
pub fn build_request(url: &Url, key: &str, user_agent: &str) -> Bytes {
    let target = url.request_target();
    let host = url.host_header();
    let mut req = BytesMut::with_capacity(256);
    for part in [
        "GET ",
        target.as_str(),
        " HTTP/1.1\r\nHost: ",
        host.as_str(),
        "\r\nUser-Agent: ",
        user_agent,
        "\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: ",
        key,
        "\r\nSec-WebSocket-Version: 13\r\n\r\n",
    ] {
        req.put_slice(part.as_bytes());
    }
    req.freeze()
}

/// Check the server's answer to the upgrade request sent with `key`.
pub fn verify_response(response: &Response, key: &str) -> Result<()> {
    if response.status() != 101 {
        return Err(Error::protocol(format!(
            "expected 101 Switching Protocols, got {} {}",
            response.status(),
            response.reason()
        )));
    }
    let upgrade_ok = response
        .header("Upgrade")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));
    if !upgrade_ok {
        return Err(Error::protocol("missing Upgrade: websocket"));
    }
    let connection_ok = response
        .headers()
        .get_all("Connection")
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case("upgrade"));
    if !connection_ok {
        return Err(Error::protocol("missing Connection: Upgrade"));
    }
    match response.header("Sec-WebSocket-Accept") {
        Some(accept) if accept.trim() == compute_accept(key) => Ok(()),
        Some(_) => Err(Error::protocol("Sec-WebSocket-Accept mismatch")),
        None => Err(Error::protocol("missing Sec-WebSocket-Accept")),
    }
}
