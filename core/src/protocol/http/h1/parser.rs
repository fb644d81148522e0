/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked or
//! read-until-close).

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::http::request::Headers;

/// Longest chunk-size line accepted (hex size plus extensions).
const MAX_CHUNK_LINE: usize = 1024;

/// Callback for HTTP/1.1 response events.
pub trait H1ResponseHandler {
    fn status(&mut self, version: &str, code: u16, reason: &str);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, _name: &str, _value: &str) {}
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Headers done; the driver must call `set_body_mode` (or `reset` for an interim response).
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
    Done,
}

/// How the body of a response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Empty,
    Length(u64),
    Chunked,
    UntilClose,
}

impl BodyMode {
    /// Body framing for a response with `status` and `headers` (RFC 9112 section 6.3).
    pub fn for_response(status: u16, headers: &Headers) -> Result<Self> {
        if (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(BodyMode::Empty);
        }
        let chunked = headers
            .get_all("Transfer-Encoding")
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            return Ok(BodyMode::Chunked);
        }
        match headers.get("Content-Length") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(0) => Ok(BodyMode::Empty),
                Ok(n) => Ok(BodyMode::Length(n)),
                Err(_) => Err(Error::protocol(format!("invalid Content-Length {:?}", value))),
            },
            None => Ok(BodyMode::UntilClose),
        }
    }
}

/// Push parser for an HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked as
/// complete tokens are parsed. Unconsumed bytes stay in the buffer.
pub struct ResponseParser {
    state: ParseState,
    max_head_bytes: usize,
    head_bytes: usize,
    /// Bytes left in the current Content-Length body or chunk.
    remaining: u64,
    until_close: bool,
}

impl ResponseParser {
    pub fn new(max_head_bytes: usize) -> Self {
        Self {
            state: ParseState::StatusLine,
            max_head_bytes,
            head_bytes: 0,
            remaining: 0,
            until_close: false,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Expect a new response head (after an interim 1xx response).
    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.head_bytes = 0;
        self.remaining = 0;
        self.until_close = false;
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Split one CRLF-terminated line off `buf`, without the CRLF. `None` if incomplete.
    fn take_line(buf: &mut BytesMut, limit: usize, what: &str) -> Result<Option<String>> {
        let line_end = match Self::find_crlf(buf) {
            Some(n) => n,
            None if buf.len() > limit => {
                return Err(Error::protocol(format!("{} exceeds {} bytes", what, limit)))
            }
            None => return Ok(None),
        };
        if line_end + 2 > limit {
            return Err(Error::protocol(format!("{} exceeds {} bytes", what, limit)));
        }
        let line = buf.split_to(line_end + 2);
        let text = std::str::from_utf8(&line[..line_end])
            .map_err(|_| Error::protocol(format!("{} is not valid UTF-8", what)))?;
        Ok(Some(text.to_string()))
    }

    fn head_line(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        let limit = self.max_head_bytes.saturating_sub(self.head_bytes);
        let line = Self::take_line(buf, limit, "response head")?;
        if let Some(l) = &line {
            self.head_bytes += l.len() + 2;
        }
        Ok(line)
    }

    fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        handler.complete();
        self.state = ParseState::Done;
    }

    /// Consume and parse as much as possible from `buf`.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> Result<()> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line) = self.head_line(buf)? else {
                        return Ok(());
                    };
                    let (version, code, reason) = parse_status_line(&line)?;
                    handler.status(version, code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = self.head_line(buf)? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let (name, value) = parse_field(&line)?;
                    handler.header(name, value);
                }
                ParseState::HeadersComplete | ParseState::Done => return Ok(()),
                ParseState::Body => {
                    if self.until_close {
                        if !buf.is_empty() {
                            let chunk = buf.split();
                            handler.body_chunk(&chunk);
                        }
                        return Ok(());
                    }
                    let n = self.remaining.min(buf.len() as u64) as usize;
                    if n > 0 {
                        let chunk = buf.split_to(n);
                        handler.body_chunk(&chunk);
                        self.remaining -= n as u64;
                    }
                    if self.remaining > 0 {
                        return Ok(());
                    }
                    self.finish(handler);
                }
                ParseState::ChunkSize => {
                    let Some(line) = Self::take_line(buf, MAX_CHUNK_LINE, "chunk size line")?
                    else {
                        return Ok(());
                    };
                    let hex = line.split(';').next().unwrap_or("").trim();
                    let size = u64::from_str_radix(hex, 16)
                        .map_err(|_| Error::protocol(format!("invalid chunk size {:?}", hex)))?;
                    if size == 0 {
                        self.state = ParseState::ChunkTrailer;
                    } else {
                        self.remaining = size;
                        self.state = ParseState::ChunkData;
                    }
                }
                ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let n = self.remaining.min(buf.len() as u64) as usize;
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(Error::protocol("missing CRLF after chunk data"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = Self::take_line(buf, self.max_head_bytes, "chunk trailer")?
                    else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.finish(handler);
                    } else {
                        let (name, value) = parse_field(&line)?;
                        handler.trailer(name, value);
                    }
                }
            }
        }
    }

    /// Called by the driver once headers are complete.
    pub fn set_body_mode<H: H1ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        match mode {
            BodyMode::Empty => self.finish(handler),
            BodyMode::Length(n) => {
                self.remaining = n;
                self.until_close = false;
                self.state = ParseState::Body;
            }
            BodyMode::Chunked => self.state = ParseState::ChunkSize,
            BodyMode::UntilClose => {
                self.until_close = true;
                self.state = ParseState::Body;
            }
        }
    }

    /// The peer closed the connection. Completes a read-until-close body; anything else
    /// short of a complete response is an error.
    pub fn finish_at_eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> Result<()> {
        match self.state {
            ParseState::Done => Ok(()),
            ParseState::Body if self.until_close => {
                self.finish(handler);
                Ok(())
            }
            ParseState::StatusLine if self.head_bytes == 0 => Err(Error::Read(
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before response",
                ),
            )),
            state => Err(Error::protocol(format!(
                "connection closed in {:?} before response was complete",
                state
            ))),
        }
    }
}

/// `HTTP/1.1 200 OK` or `HTTP/1.1 200`.
fn parse_status_line(line: &str) -> Result<(&str, u16, &str)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(Error::protocol(format!("invalid status line {:?}", line)));
    }
    let code = parts
        .next()
        .filter(|c| c.len() == 3)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| Error::protocol(format!("invalid status code in {:?}", line)))?;
    let reason = parts.next().unwrap_or("").trim();
    Ok((version, code, reason))
}

fn parse_field(line: &str) -> Result<(&str, &str)> {
    let colon = line
        .find(':')
        .ok_or_else(|| Error::protocol(format!("malformed header line {:?}", line)))?;
    let name = line[..colon].trim();
    if name.is_empty() {
        return Err(Error::protocol("empty header name"));
    }
    Ok((name, line[colon + 1..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Events {
        code: u16,
        reason: String,
        headers: Headers,
        trailers: Vec<(String, String)>,
        body: Vec<u8>,
        complete: bool,
    }

    impl H1ResponseHandler for Events {
        fn status(&mut self, _version: &str, code: u16, reason: &str) {
            self.code = code;
            self.reason = reason.to_string();
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.append(name, value);
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.into(), value.into()));
        }
        fn complete(&mut self) {
            self.complete = true;
        }
    }

    fn drive(input: &[&[u8]]) -> Result<(Events, ResponseParser)> {
        let mut parser = ResponseParser::new(64 * 1024);
        let mut events = Events::default();
        let mut buf = BytesMut::new();
        for piece in input {
            buf.extend_from_slice(piece);
            parser.receive(&mut buf, &mut events)?;
            if parser.state() == ParseState::HeadersComplete {
                let mode = BodyMode::for_response(events.code, &events.headers)?;
                parser.set_body_mode(mode, &mut events);
                parser.receive(&mut buf, &mut events)?;
            }
        }
        Ok((events, parser))
    }

    #[test]
    fn content_length_split_across_reads() {
        let (ev, parser) = drive(&[
            b"HTTP/1.1 200 OK\r\nContent-Le",
            b"ngth: 5\r\n\r\nhel",
            b"lo",
        ])
        .unwrap();
        assert_eq!(parser.state(), ParseState::Done);
        assert_eq!(ev.code, 200);
        assert_eq!(ev.reason, "OK");
        assert_eq!(ev.body, b"hello");
        assert!(ev.complete);
    }

    #[test]
    fn chunked_with_trailer() {
        let (ev, parser) = drive(&[
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n",
            b"4\r\nWiki\r\n5;ext=1\r\npedia\r\n",
            b"0\r\nX-Checksum: abc\r\n\r\n",
        ])
        .unwrap();
        assert_eq!(parser.state(), ParseState::Done);
        assert_eq!(ev.body, b"Wikipedia");
        assert_eq!(ev.trailers, vec![("X-Checksum".into(), "abc".into())]);
    }

    #[test]
    fn no_content_has_no_body() {
        let (ev, parser) =
            drive(&[b"HTTP/1.1 204 No Content\r\nContent-Length: 10\r\n\r\n"]).unwrap();
        assert_eq!(parser.state(), ParseState::Done);
        assert!(ev.body.is_empty());
    }

    #[test]
    fn until_close_completes_at_eof() {
        let (mut ev, mut parser) =
            drive(&[b"HTTP/1.0 200 OK\r\n\r\npartial ", b"body"]).unwrap();
        assert_eq!(parser.state(), ParseState::Body);
        parser.finish_at_eof(&mut ev).unwrap();
        assert_eq!(ev.body, b"partial body");
        assert!(ev.complete);
    }

    #[test]
    fn eof_inside_length_body_is_protocol_error() {
        let (mut ev, mut parser) =
            drive(&[b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc"]).unwrap();
        assert!(matches!(
            parser.finish_at_eof(&mut ev),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn eof_before_anything_is_read_error() {
        let mut parser = ResponseParser::new(1024);
        let mut ev = Events::default();
        assert!(matches!(parser.finish_at_eof(&mut ev), Err(Error::Read(_))));
    }

    #[test]
    fn rejects_garbage_status_line() {
        assert!(matches!(
            drive(&[b"SSH-2.0-OpenSSH\r\n"]),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            drive(&[b"HTTP/1.1 20 OK\r\n"]),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn enforces_head_limit() {
        let mut parser = ResponseParser::new(32);
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nX-Long: aaaaaaaaaaaaaaaaaaaa"[..]);
        assert!(matches!(
            parser.receive(&mut buf, &mut ev),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn head_only_leaves_following_bytes() {
        let mut parser = ResponseParser::new(1024);
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n\x81\x02hi"[..]);
        parser.receive(&mut buf, &mut ev).unwrap();
        assert_eq!(parser.state(), ParseState::HeadersComplete);
        assert_eq!(ev.code, 101);
        assert_eq!(&buf[..], b"\x81\x02hi");
    }

    #[test]
    fn bad_content_length_is_rejected() {
        let mut headers = Headers::new();
        headers.set("Content-Length", "ten");
        assert!(BodyMode::for_response(200, &headers).is_err());
        headers.set("Transfer-Encoding", "gzip, chunked");
        assert_eq!(BodyMode::for_response(200, &headers).unwrap(), BodyMode::Chunked);
    }
}
