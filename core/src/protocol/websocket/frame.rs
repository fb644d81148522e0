/*
 * frame.rs
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

//! WebSocket frame format (RFC 6455 §5): parser for receive, encoder for send (with masking).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

pub const OP_CONTINUATION: u8 = 0;
pub const OP_TEXT: u8 = 1;
pub const OP_BINARY: u8 = 2;
pub const OP_CLOSE: u8 = 8;
pub const OP_PING: u8 = 9;
pub const OP_PONG: u8 = 10;

/// Control frame payloads are at most 125 bytes.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

pub(crate) fn is_control(opcode: u8) -> bool {
    opcode & 0x08 != 0
}

/// Callback for completed frames (receive path).
pub trait FrameHandler {
    fn frame(&mut self, opcode: u8, fin: bool, payload: Bytes) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Header,
    ExtendedLen2,
    ExtendedLen8,
    Payload,
}

/// Push parser for WebSocket frames (server to client: never masked).
pub struct FrameParser {
    state: FrameState,
    opcode: u8,
    fin: bool,
    payload_len: u64,
    max_payload: u64,
}

impl FrameParser {
    pub fn new(max_payload: usize) -> Self {
        Self {
            state: FrameState::Header,
            opcode: 0,
            fin: false,
            payload_len: 0,
            max_payload: max_payload as u64,
        }
    }

    fn check_len(&self) -> Result<()> {
        if is_control(self.opcode) && self.payload_len > MAX_CONTROL_PAYLOAD as u64 {
            return Err(Error::protocol("control frame payload too long"));
        }
        if self.payload_len > self.max_payload {
            return Err(Error::protocol(format!(
                "frame payload of {} bytes exceeds limit of {}",
                self.payload_len, self.max_payload
            )));
        }
        Ok(())
    }

    /// Feed bytes from the stream, dispatching every complete frame. Partial frames stay in
    /// `buf`.
    pub fn receive<H: FrameHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> Result<()> {
        loop {
            match self.state {
                FrameState::Header => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    let b0 = buf.get_u8();
                    let b1 = buf.get_u8();
                    self.fin = (b0 & 0x80) != 0;
                    self.opcode = b0 & 0x0f;
                    if b0 & 0x70 != 0 {
                        return Err(Error::protocol("reserved frame bits set"));
                    }
                    match self.opcode {
                        OP_CONTINUATION | OP_TEXT | OP_BINARY | OP_CLOSE | OP_PING | OP_PONG => {}
                        other => {
                            return Err(Error::protocol(format!("unknown opcode {:#x}", other)))
                        }
                    }
                    if is_control(self.opcode) && !self.fin {
                        return Err(Error::protocol("fragmented control frame"));
                    }
                    if b1 & 0x80 != 0 {
                        return Err(Error::protocol("server frame must not be masked"));
                    }
                    match b1 & 0x7f {
                        126 => self.state = FrameState::ExtendedLen2,
                        127 => self.state = FrameState::ExtendedLen8,
                        len7 => {
                            self.payload_len = len7 as u64;
                            self.check_len()?;
                            self.state = FrameState::Payload;
                        }
                    }
                }
                FrameState::ExtendedLen2 => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    self.payload_len = buf.get_u16() as u64;
                    self.check_len()?;
                    self.state = FrameState::Payload;
                }
                FrameState::ExtendedLen8 => {
                    if buf.len() < 8 {
                        return Ok(());
                    }
                    self.payload_len = buf.get_u64();
                    self.check_len()?;
                    self.state = FrameState::Payload;
                }
                FrameState::Payload => {
                    let need = self.payload_len as usize;
                    if buf.len() < need {
                        buf.reserve(need - buf.len());
                        return Ok(());
                    }
                    let payload = buf.split_to(need).freeze();
                    self.state = FrameState::Header;
                    handler.frame(self.opcode, self.fin, payload)?;
                }
            }
        }
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

/// Encode one final frame (client to server: always masked with `mask_key`).
pub fn encode_frame(opcode: u8, payload: &[u8], mask_key: &[u8; 4], out: &mut BytesMut) {
    let len = payload.len();
    out.reserve(14 + len);
    out.put_u8(0x80 | (opcode & 0x0f));
    if len < 126 {
        out.put_u8(0x80 | (len as u8));
    } else if len <= u16::MAX as usize {
        out.put_u8(0x80 | 126);
        out.put_u16(len as u16);
    } else {
        out.put_u8(0x80 | 127);
        out.put_u64(len as u64);
    }
    out.put_slice(mask_key);
    out.extend(payload.iter().enumerate().map(|(i, &b)| b ^ mask_key[i % 4]));
}
