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

//! HTTP/1.1 framing: the push parser, the request writer and the read loops that drive the
//! parser from a transport.

mod parser;
mod writer;

pub use parser::{BodyMode, H1ResponseHandler, ParseState, ResponseParser};
pub(crate) use writer::WireRequest;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::protocol::http::request::{Headers, HttpVersion};
use crate::protocol::http::response::Response;

/// Collects parser events into a `Response`.
#[derive(Default)]
struct ResponseCollector {
    version: HttpVersion,
    status: u16,
    reason: String,
    headers: Headers,
    body: BytesMut,
}

impl ResponseCollector {
    fn into_response(self) -> Response {
        Response::from_parts(
            self.version,
            self.status,
            self.reason,
            self.headers,
            self.body.freeze(),
        )
    }

    /// 1xx other than 101 is followed by the real response.
    fn is_interim(&self) -> bool {
        (100..200).contains(&self.status) && self.status != 101
    }
}

impl H1ResponseHandler for ResponseCollector {
    fn status(&mut self, version: &str, code: u16, reason: &str) {
        self.version = HttpVersion::from_token(version).unwrap_or_default();
        self.status = code;
        self.reason = reason.to_string();
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    fn complete(&mut self) {}
}

async fn fill<R: AsyncRead + Unpin>(io: &mut R, buf: &mut BytesMut, reserve: usize) -> Result<usize> {
    buf.reserve(reserve);
    io.read_buf(buf).await.map_err(Error::Read)
}

/// Read one complete response. Bytes already in `buf` are parsed first; interim 1xx
/// responses are skipped.
pub(crate) async fn read_response<R: AsyncRead + Unpin>(
    io: &mut R,
    buf: &mut BytesMut,
    max_head_bytes: usize,
    read_buffer_size: usize,
) -> Result<Response> {
    let mut parser = ResponseParser::new(max_head_bytes);
    let mut collector = ResponseCollector::default();
    loop {
        parser.receive(buf, &mut collector)?;
        match parser.state() {
            ParseState::HeadersComplete if collector.is_interim() => {
                tracing::trace!(status = collector.status, "skipping interim response");
                collector = ResponseCollector::default();
                parser.reset();
                continue;
            }
            ParseState::HeadersComplete => {
                let mode = BodyMode::for_response(collector.status, &collector.headers)?;
                tracing::trace!(status = collector.status, ?mode, "response head parsed");
                parser.set_body_mode(mode, &mut collector);
                continue;
            }
            ParseState::Done => return Ok(collector.into_response()),
            _ => {}
        }
        if fill(io, buf, read_buffer_size).await? == 0 {
            parser.finish_at_eof(&mut collector)?;
            return Ok(collector.into_response());
        }
    }
}

/// Read only a response head (status line and headers). Bytes after the blank line remain
/// in `buf`; the returned response has an empty body.
pub(crate) async fn read_head<R: AsyncRead + Unpin>(
    io: &mut R,
    buf: &mut BytesMut,
    max_head_bytes: usize,
    read_buffer_size: usize,
) -> Result<Response> {
    let mut parser = ResponseParser::new(max_head_bytes);
    let mut collector = ResponseCollector::default();
    loop {
        parser.receive(buf, &mut collector)?;
        if parser.state() == ParseState::HeadersComplete {
            collector.body = BytesMut::new();
            return Ok(collector.into_response());
        }
        if fill(io, buf, read_buffer_size).await? == 0 {
            parser.finish_at_eof(&mut collector)?;
            return Err(Error::protocol("connection closed during response head"));
        }
    }
}
