/*
 * session.rs
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

//! Long-lived WebSocket session.
//!
//! Lifecycle: resolve, connect, TLS handshake (wss only), upgrade, then a read loop that runs
//! until a close frame arrives or the transport fails. Each step before the read loop is
//! bounded by `ClientOptions::ws_connect_timeout`; the read loop itself is not.
//!
//! State is `Unknown` until the upgrade succeeds, `Connected` after, `Closed` after a close
//! frame in either direction, and `Unknown` again after any failure. A session runs once;
//! reconnecting needs a new session.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::ClientConfig;

use crate::cancel::CancelSignal;
use crate::config::ClientOptions;
use crate::error::{Error, Result, Stage};
use crate::net::{self, bounded, TlsSetup, Transport};
use crate::protocol::http::h1;
use crate::protocol::websocket::frame::{
    encode_frame, FrameParser, MAX_CONTROL_PAYLOAD, OP_CLOSE, OP_PING, OP_PONG,
};
use crate::protocol::websocket::handshake;
use crate::protocol::websocket::message::{
    close_payload, ControlFrame, Inbound, Message, MessageAssembler, CLOSE_NORMAL,
};
use crate::session_cache::TlsSessionCache;
use crate::uri::{Scheme, Url};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unknown,
    Connected,
    Closed,
}

type MessageObserver = Arc<dyn Fn(Message) + Send + Sync>;
type ControlObserver = Arc<dyn Fn(&ControlFrame) + Send + Sync>;
type StateObserver = Arc<dyn Fn(ConnectionState) + Send + Sync>;

struct Inner {
    url: Url,
    /// Set at construction for wss; never changes afterwards.
    tls: Option<TlsSetup>,
    options: ClientOptions,
    state: Mutex<ConnectionState>,
    started: AtomicBool,
    close_sent: AtomicBool,
    /// Sends are serialized through this lock.
    writer: tokio::sync::Mutex<Option<WriteHalf<Transport>>>,
    on_message: RwLock<Option<MessageObserver>>,
    on_control: RwLock<Option<ControlObserver>>,
    on_state: RwLock<Option<StateObserver>>,
    cancel: CancelSignal,
}

/// Handle to one WebSocket connection. Clones share the connection.
#[derive(Clone)]
pub struct WebSocketSession {
    inner: Arc<Inner>,
}

/// Builder for a `WebSocketSession`.
pub struct WebSocketBuilder {
    url: Url,
    tls: Arc<ClientConfig>,
    options: ClientOptions,
    cache: Option<Arc<TlsSessionCache>>,
}

impl WebSocketBuilder {
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Resume TLS sessions through `cache` (wss only).
    pub fn session_cache(mut self, cache: Arc<TlsSessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> WebSocketSession {
        let tls = self.url.scheme().is_tls().then(|| match self.cache {
            Some(cache) => TlsSetup::with_cache(self.tls, cache),
            None => TlsSetup::new(self.tls),
        });
        WebSocketSession {
            inner: Arc::new(Inner {
                url: self.url,
                tls,
                options: self.options,
                state: Mutex::new(ConnectionState::Unknown),
                started: AtomicBool::new(false),
                close_sent: AtomicBool::new(false),
                writer: tokio::sync::Mutex::new(None),
                on_message: RwLock::new(None),
                on_control: RwLock::new(None),
                on_state: RwLock::new(None),
                cancel: CancelSignal::new(),
            }),
        }
    }
}

impl WebSocketSession {
    /// Session for a `ws://` or `wss://` URL. `tls` is used only for wss.
    pub fn new(url: &str, tls: Arc<ClientConfig>) -> Result<Self> {
        Ok(Self::builder(url, tls)?.build())
    }

    pub fn builder(url: &str, tls: Arc<ClientConfig>) -> Result<WebSocketBuilder> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), Scheme::Ws | Scheme::Wss) {
            return Err(Error::InvalidUrl {
                url: url.to_string(),
                reason: "WebSocket URL must use ws or wss".to_string(),
            });
        }
        Ok(WebSocketBuilder {
            url: parsed,
            tls,
            options: ClientOptions::default(),
            cache: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn is_tls(&self) -> bool {
        self.inner.tls.is_some()
    }

    /// Called on the read-loop task for every complete message.
    pub fn on_message<F>(&self, f: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        *self.inner.on_message.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(f));
    }

    /// Called on the read-loop task for every ping, pong and close frame.
    pub fn on_control<F>(&self, f: F)
    where
        F: Fn(&ControlFrame) + Send + Sync + 'static,
    {
        *self.inner.on_control.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(f));
    }

    /// Called on every state transition.
    pub fn on_state_change<F>(&self, f: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        *self.inner.on_state.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(f));
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, next)
        };
        if previous == next {
            return;
        }
        tracing::debug!(url = %self.inner.url, from = ?previous, to = ?next, "WebSocket state changed");
        let observer = self
            .inner
            .on_state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(next);
        }
    }

    fn deliver(&self, inbound: &Inbound) {
        match inbound {
            Inbound::Message(message) => {
                let observer = self
                    .inner
                    .on_message
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(observer) = observer {
                    observer(message.clone());
                }
            }
            Inbound::Control(frame) => {
                let observer = self
                    .inner
                    .on_control
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(observer) = observer {
                    observer(frame);
                }
            }
        }
    }

    fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }
        Ok(())
    }

    /// Connect, upgrade and run the read loop on the current task. Returns `Ok` once the
    /// session closes cleanly, or the first failure.
    pub async fn run(&self) -> Result<()> {
        self.start()?;
        let (reader, buf) = self.guarded(self.establish()).await?;
        self.guarded(self.read_loop(reader, buf)).await
    }

    /// Connect and upgrade, then spawn the read loop. The returned task ends when the session
    /// closes or fails.
    pub async fn connect(&self) -> Result<JoinHandle<Result<()>>> {
        self.start()?;
        let (reader, buf) = self.guarded(self.establish()).await?;
        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.guarded(this.read_loop(reader, buf)).await
        }))
    }

    /// Abort the handshake or read loop. The pending `run`/`connect` fails with
    /// `Error::Cancelled` and the state becomes `Unknown`.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Races `step` against cancellation. Any failure is terminal: state goes to `Unknown`
    /// and the write side is released.
    async fn guarded<T, F>(&self, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => Err(Error::Cancelled),
            result = step => result,
        };
        if let Err(e) = &result {
            tracing::debug!(url = %self.inner.url, error = %e, "WebSocket session failed");
            self.inner.writer.lock().await.take();
            self.set_state(ConnectionState::Unknown);
        }
        result
    }

    async fn establish(&self) -> Result<(ReadHalf<Transport>, BytesMut)> {
        let inner = &self.inner;
        let url = &inner.url;
        let host = url.host();
        let limit = inner.options.ws_connect_timeout;

        let addrs = bounded(Stage::Resolving, limit, net::resolve(host, url.port())).await?;
        let (tcp, peer) = bounded(Stage::Connecting, limit, net::connect(host, &addrs)).await?;
        let mut transport = match &inner.tls {
            Some(tls) => {
                let stream =
                    bounded(Stage::TlsHandshaking, limit, tls.handshake(host, peer, tcp)).await?;
                Transport::Tls(Box::new(stream))
            }
            None => Transport::Plain(tcp),
        };

        let mut buf = BytesMut::with_capacity(inner.options.read_buffer_size);
        bounded(Stage::Upgrading, limit, async {
            let key = handshake::generate_key()?;
            let request = handshake::build_request(url, &key, &inner.options.user_agent);
            transport.write_all(&request).await.map_err(Error::Write)?;
            transport.flush().await.map_err(Error::Write)?;
            let head = h1::read_head(
                &mut transport,
                &mut buf,
                inner.options.max_head_bytes,
                inner.options.read_buffer_size,
            )
            .await?;
            handshake::verify_response(&head, &key)
        })
        .await?;

        let (reader, writer) = tokio::io::split(transport);
        *inner.writer.lock().await = Some(writer);
        self.set_state(ConnectionState::Connected);
        Ok((reader, buf))
    }

    async fn read_loop(&self, mut reader: ReadHalf<Transport>, mut buf: BytesMut) -> Result<()> {
        let options = &self.inner.options;
        let mut parser = FrameParser::new(options.max_message_bytes);
        let mut assembler = MessageAssembler::new(options.max_message_bytes);
        loop {
            parser.receive(&mut buf, &mut assembler)?;
            while let Some(inbound) = assembler.next_inbound() {
                self.deliver(&inbound);
                match inbound {
                    Inbound::Control(ControlFrame::Ping(data)) => {
                        self.write_frame(OP_PONG, &data).await?;
                    }
                    Inbound::Control(ControlFrame::Close { code, .. }) => {
                        self.set_state(ConnectionState::Closed);
                        self.finish_close(code).await;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            buf.reserve(options.read_buffer_size);
            let n = reader.read_buf(&mut buf).await.map_err(Error::Read)?;
            if n == 0 {
                if self.current_state() == ConnectionState::Closed {
                    return Ok(());
                }
                return Err(Error::Read(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed without a close frame",
                )));
            }
        }
    }

    /// Peer sent a close frame: echo it unless we already sent ours, then release the
    /// write side.
    async fn finish_close(&self, code: Option<u16>) {
        if !self.inner.close_sent.swap(true, Ordering::AcqRel) {
            let echo = close_payload(code, "");
            if let Err(e) = self.write_frame(OP_CLOSE, &echo).await {
                tracing::trace!(error = %e, "close echo not delivered");
            }
        }
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                if !net::is_peer_closed(&e) {
                    tracing::debug!(error = %e, "WebSocket shutdown failed");
                }
            }
        }
    }

    async fn write_frame(&self, opcode: u8, payload: &[u8]) -> Result<()> {
        let mut mask_key = [0u8; 4];
        getrandom::getrandom(&mut mask_key)
            .map_err(|e| Error::Write(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        let mut out = BytesMut::new();
        encode_frame(opcode, payload, &mask_key, &mut out);

        let mut writer = self.inner.writer.lock().await;
        let stream = writer.as_mut().ok_or(Error::NotConnected)?;
        let written = async {
            stream.write_all(&out).await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = written {
            writer.take();
            drop(writer);
            self.set_state(ConnectionState::Unknown);
            return Err(Error::Write(e));
        }
        Ok(())
    }

    /// Send one message. Fails with `Error::NotConnected` unless the state is `Connected`.
    pub async fn send(&self, message: Message) -> Result<()> {
        if self.current_state() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        self.write_frame(message.opcode(), message.as_bytes()).await
    }

    /// Send a ping with `payload` (at most 125 bytes).
    pub async fn ping(&self, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(Error::protocol("ping payload exceeds the control frame limit"));
        }
        if self.current_state() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        self.write_frame(OP_PING, &payload).await
    }

    /// Send a normal close frame and move to `Closed`. The read loop ends when the peer
    /// answers. Does nothing if the session is not connected.
    pub async fn close(&self) -> Result<()> {
        self.close_with(CLOSE_NORMAL, "").await
    }

    pub async fn close_with(&self, code: u16, reason: &str) -> Result<()> {
        if self.current_state() != ConnectionState::Connected {
            return Ok(());
        }
        if !self.inner.close_sent.swap(true, Ordering::AcqRel) {
            self.write_frame(OP_CLOSE, &close_payload(Some(code), reason))
                .await?;
        }
        self.set_state(ConnectionState::Closed);
        Ok(())
    }
}

impl fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("url", &self.inner.url.to_string())
            .field("state", &self.current_state())
            .finish()
    }
}
