/*
 * message.rs
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

//! Application messages and control frames, and reassembly of fragmented messages.

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::websocket::frame::{
    FrameHandler, OP_BINARY, OP_CLOSE, OP_CONTINUATION, OP_PING, OP_PONG, OP_TEXT,
};

/// Complete application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

impl Message {
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        Message::Binary(b.into())
    }

    pub(crate) fn opcode(&self) -> u8 {
        match self {
            Message::Text(_) => OP_TEXT,
            Message::Binary(_) => OP_BINARY,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Control frame as seen by the control observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Ping(Bytes),
    Pong(Bytes),
    Close { code: Option<u16>, reason: String },
}

/// Normal closure status code.
pub const CLOSE_NORMAL: u16 = 1000;

impl ControlFrame {
    fn parse_close(payload: &[u8]) -> Result<Self> {
        match payload.len() {
            0 => Ok(ControlFrame::Close {
                code: None,
                reason: String::new(),
            }),
            1 => Err(Error::protocol("close frame payload of one byte")),
            _ => {
                let code = u16::from_be_bytes([payload[0], payload[1]]);
                let reason = std::str::from_utf8(&payload[2..])
                    .map_err(|_| Error::protocol("close reason is not valid UTF-8"))?;
                Ok(ControlFrame::Close {
                    code: Some(code),
                    reason: reason.to_string(),
                })
            }
        }
    }
}

/// Payload of a close frame with `code` and `reason`, truncated to the control frame limit.
pub(crate) fn close_payload(code: Option<u16>, reason: &str) -> Bytes {
    let mut out = BytesMut::new();
    if let Some(c) = code {
        out.put_u16(c);
        let mut end = reason.len().min(123);
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        out.put_slice(&reason.as_bytes()[..end]);
    }
    out.freeze()
}

/// What the read loop hands to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    Message(Message),
    Control(ControlFrame),
}

/// Collects frames into messages. Control frames may arrive between fragments.
pub(crate) struct MessageAssembler {
    max_message: usize,
    partial: Option<(u8, BytesMut)>,
    ready: VecDeque<Inbound>,
}

impl MessageAssembler {
    pub(crate) fn new(max_message: usize) -> Self {
        Self {
            max_message,
            partial: None,
            ready: VecDeque::new(),
        }
    }

    pub(crate) fn next_inbound(&mut self) -> Option<Inbound> {
        self.ready.pop_front()
    }

    fn complete(opcode: u8, payload: Bytes) -> Result<Message> {
        if opcode == OP_TEXT {
            let text = String::from_utf8(payload.to_vec())
                .map_err(|_| Error::protocol("text message is not valid UTF-8"))?;
            Ok(Message::Text(text))
        } else {
            Ok(Message::Binary(payload))
        }
    }
}

impl FrameHandler for MessageAssembler {
    fn frame(&mut self, opcode: u8, fin: bool, payload: Bytes) -> Result<()> {
        match opcode {
            OP_PING => self.ready.push_back(Inbound::Control(ControlFrame::Ping(payload))),
            OP_PONG => self.ready.push_back(Inbound::Control(ControlFrame::Pong(payload))),
            OP_CLOSE => self
                .ready
                .push_back(Inbound::Control(ControlFrame::parse_close(&payload)?)),
            OP_TEXT | OP_BINARY => {
                if self.partial.is_some() {
                    return Err(Error::protocol(
                        "data frame started while a fragmented message is open",
                    ));
                }
                if fin {
                    let message = Self::complete(opcode, payload)?;
                    self.ready.push_back(Inbound::Message(message));
                } else {
                    self.partial = Some((opcode, BytesMut::from(&payload[..])));
                }
            }
            OP_CONTINUATION => {
                let (first, mut data) = self
                    .partial
                    .take()
                    .ok_or_else(|| Error::protocol("continuation frame without a message"))?;
                if data.len() + payload.len() > self.max_message {
                    return Err(Error::protocol(format!(
                        "message exceeds {} bytes",
                        self.max_message
                    )));
                }
                data.extend_from_slice(&payload);
                if fin {
                    let message = Self::complete(first, data.freeze())?;
                    self.ready.push_back(Inbound::Message(message));
                } else {
                    self.partial = Some((first, data));
                }
            }
            other => return Err(Error::protocol(format!("unknown opcode {:#x}", other))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_fragments_around_control_frames() {
        let mut a = MessageAssembler::new(1024);
        a.frame(OP_TEXT, false, Bytes::from_static(b"hel")).unwrap();
        a.frame(OP_PING, true, Bytes::from_static(b"p")).unwrap();
        a.frame(OP_CONTINUATION, false, Bytes::from_static(b"lo ")).unwrap();
        a.frame(OP_CONTINUATION, true, Bytes::from_static(b"world")).unwrap();
        assert_eq!(
            a.next_inbound(),
            Some(Inbound::Control(ControlFrame::Ping(Bytes::from_static(b"p"))))
        );
        assert_eq!(
            a.next_inbound(),
            Some(Inbound::Message(Message::text("hello world")))
        );
        assert_eq!(a.next_inbound(), None);
    }

    #[test]
    fn rejects_bad_sequences() {
        let mut a = MessageAssembler::new(1024);
        assert!(a.frame(OP_CONTINUATION, true, Bytes::new()).is_err());

        let mut a = MessageAssembler::new(1024);
        a.frame(OP_BINARY, false, Bytes::from_static(b"x")).unwrap();
        assert!(a.frame(OP_TEXT, true, Bytes::new()).is_err());

        let mut a = MessageAssembler::new(1024);
        assert!(a.frame(OP_TEXT, true, Bytes::from_static(b"\xff")).is_err());

        let mut a = MessageAssembler::new(4);
        a.frame(OP_BINARY, false, Bytes::from_static(b"abc")).unwrap();
        assert!(a.frame(OP_CONTINUATION, true, Bytes::from_static(b"de")).is_err());
    }

    #[test]
    fn close_frames() {
        let mut a = MessageAssembler::new(1024);
        a.frame(OP_CLOSE, true, close_payload(Some(1001), "going away")).unwrap();
        a.frame(OP_CLOSE, true, Bytes::new()).unwrap();
        assert_eq!(
            a.next_inbound(),
            Some(Inbound::Control(ControlFrame::Close {
                code: Some(1001),
                reason: "going away".into()
            }))
        );
        assert_eq!(
            a.next_inbound(),
            Some(Inbound::Control(ControlFrame::Close {
                code: None,
                reason: String::new()
            }))
        );
        assert!(a.frame(OP_CLOSE, true, Bytes::from_static(b"\x03")).is_err());
    }

    #[test]
    fn close_reason_is_truncated_on_char_boundary() {
        let reason = "é".repeat(100);
        let payload = close_payload(Some(CLOSE_NORMAL), &reason);
        assert!(payload.len() <= 125);
        assert!(std::str::from_utf8(&payload[2..]).is_ok());
    }
}
