/*
 * websocket.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for WebSocket sessions against a scripted loopback server:
 * upgrade, message echo, ping handling, both close directions, and failures
 * during and after the handshake.
 *
 * Run with:
 *   cargo test -p tidewire_core --test websocket
 */

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::RootCertStore;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing_test::traced_test;

use tidewire_core::protocol::websocket::{
    ConnectionState, ControlFrame, Message, WebSocketSession, CLOSE_NORMAL,
};
use tidewire_core::{client_config_with_roots, ClientOptions, Error, Stage};

use common::{accept_upgrade, listener, read_client_frame, server_frame, silent_server};

const TEXT: u8 = 0x1;
const CLOSE: u8 = 0x8;
const PING: u8 = 0x9;
const PONG: u8 = 0xa;

fn session(addr: std::net::SocketAddr) -> WebSocketSession {
    WebSocketSession::new(
        &format!("ws://127.0.0.1:{}/chat", addr.port()),
        client_config_with_roots(RootCertStore::empty()),
    )
    .unwrap()
}

fn record_states(ws: &WebSocketSession) -> Arc<Mutex<Vec<ConnectionState>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    ws.on_state_change(move |s| sink.lock().unwrap().push(s));
    states
}

#[tokio::test]
async fn echo_then_server_close() {
    let (server, addr) = listener().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        let upgrade = accept_upgrade(&mut stream).await;
        assert_eq!(upgrade.request_line(), "GET /chat HTTP/1.1");
        assert_eq!(upgrade.header("Sec-WebSocket-Version").as_deref(), Some("13"));

        let (opcode, payload) = read_client_frame(&mut stream).await;
        assert_eq!(opcode, TEXT);
        stream.write_all(&server_frame(TEXT, &payload)).await.unwrap();

        let mut close = CLOSE_NORMAL.to_be_bytes().to_vec();
        close.extend_from_slice(b"bye");
        stream.write_all(&server_frame(CLOSE, &close)).await.unwrap();
        let (opcode, payload) = read_client_frame(&mut stream).await;
        assert_eq!(opcode, CLOSE);
        assert_eq!(&payload[..2], &CLOSE_NORMAL.to_be_bytes());
    });

    let ws = session(addr);
    let states = record_states(&ws);
    let (tx, mut messages) = mpsc::unbounded_channel();
    ws.on_message(move |m| {
        let _ = tx.send(m);
    });
    let closes = Arc::new(Mutex::new(Vec::new()));
    let sink = closes.clone();
    ws.on_control(move |frame| sink.lock().unwrap().push(frame.clone()));

    assert_eq!(ws.current_state(), ConnectionState::Unknown);
    let reader = ws.connect().await.unwrap();
    assert_eq!(ws.current_state(), ConnectionState::Connected);

    ws.send(Message::text("hello")).await.unwrap();
    assert_eq!(messages.recv().await.unwrap(), Message::text("hello"));

    reader.await.unwrap().unwrap();
    server.await.unwrap();
    assert_eq!(ws.current_state(), ConnectionState::Closed);
    assert_eq!(
        *states.lock().unwrap(),
        vec![ConnectionState::Connected, ConnectionState::Closed]
    );
    assert_eq!(
        *closes.lock().unwrap(),
        vec![ControlFrame::Close {
            code: Some(CLOSE_NORMAL),
            reason: "bye".to_string()
        }]
    );

    ws.close().await.unwrap();
    assert!(matches!(
        ws.send(Message::text("late")).await,
        Err(Error::NotConnected)
    ));
    assert_eq!(states.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn client_initiated_close() {
    let (server, addr) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        accept_upgrade(&mut stream).await;
        let (opcode, payload) = read_client_frame(&mut stream).await;
        assert_eq!(opcode, CLOSE);
        stream.write_all(&server_frame(CLOSE, &payload)).await.unwrap();
    });

    let ws = session(addr);
    let reader = ws.connect().await.unwrap();
    ws.close().await.unwrap();
    assert_eq!(ws.current_state(), ConnectionState::Closed);
    reader.await.unwrap().unwrap();
    assert_eq!(ws.current_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn answers_ping_with_pong() {
    let (server, addr) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        accept_upgrade(&mut stream).await;
        stream.write_all(&server_frame(PING, b"p1")).await.unwrap();
        let (opcode, payload) = read_client_frame(&mut stream).await;
        assert_eq!((opcode, payload.as_slice()), (PONG, &b"p1"[..]));
        stream.write_all(&server_frame(CLOSE, &[])).await.unwrap();
        let (opcode, payload) = read_client_frame(&mut stream).await;
        assert_eq!(opcode, CLOSE);
        assert!(payload.is_empty());
    });

    let ws = session(addr);
    let pings = Arc::new(Mutex::new(Vec::new()));
    let sink = pings.clone();
    ws.on_control(move |frame| {
        if let ControlFrame::Ping(data) = frame {
            sink.lock().unwrap().push(data.clone());
        }
    });
    ws.run().await.unwrap();
    assert_eq!(pings.lock().unwrap().len(), 1);
    assert_eq!(ws.current_state(), ConnectionState::Closed);
}

#[tokio::test]
#[traced_test]
async fn dropped_connection_is_an_error() {
    let (server, addr) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        accept_upgrade(&mut stream).await;
    });

    let ws = session(addr);
    let states = record_states(&ws);
    let err = ws.run().await.unwrap_err();
    assert!(matches!(err, Error::Read(_)), "{err:?}");
    assert_eq!(ws.current_state(), ConnectionState::Unknown);
    assert_eq!(
        *states.lock().unwrap(),
        vec![ConnectionState::Connected, ConnectionState::Unknown]
    );
    assert!(logs_contain("WebSocket state changed"));
    assert!(matches!(ws.run().await, Err(Error::AlreadyStarted)));
}

#[tokio::test]
async fn rejected_upgrade() {
    let (server, addr) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        common::read_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
    });

    let ws = session(addr);
    let states = record_states(&ws);
    let err = ws.connect().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "{err:?}");
    assert_eq!(ws.current_state(), ConnectionState::Unknown);
    assert!(states.lock().unwrap().is_empty());
}

#[tokio::test]
async fn handshake_timeout() {
    let addr = silent_server().await;
    let ws = WebSocketSession::builder(
        &format!("ws://127.0.0.1:{}/", addr.port()),
        client_config_with_roots(RootCertStore::empty()),
    )
    .unwrap()
    .options(ClientOptions::default().with_ws_connect_timeout(Duration::from_millis(200)))
    .build();
    let err = ws.run().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.stage(), Some(Stage::Upgrading));
}

#[tokio::test]
async fn cancel_during_handshake() {
    let addr = silent_server().await;
    let ws = session(addr);
    let runner = ws.clone();
    let task = tokio::spawn(async move { runner.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    ws.cancel();
    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ws.current_state(), ConnectionState::Unknown);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_arrive_as_whole_frames() {
    const SENDERS: u8 = 8;
    const SIZE: usize = 40_000;
    let (server, addr) = listener().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = server.accept().await.unwrap();
        accept_upgrade(&mut stream).await;
        let mut seen = Vec::new();
        for _ in 0..SENDERS {
            let (opcode, payload) = read_client_frame(&mut stream).await;
            assert_eq!(opcode, 0x2);
            assert_eq!(payload.len(), SIZE);
            assert!(payload.iter().all(|&b| b == payload[0]), "frames interleaved");
            seen.push(payload[0]);
        }
        stream.write_all(&server_frame(CLOSE, &[])).await.unwrap();
        read_client_frame(&mut stream).await;
        seen.sort_unstable();
        seen
    });

    let ws = session(addr);
    let reader = ws.connect().await.unwrap();
    let senders: Vec<_> = (0..SENDERS)
        .map(|i| {
            let ws = ws.clone();
            tokio::spawn(async move { ws.send(Message::binary(vec![i; SIZE])).await })
        })
        .collect();
    for sender in senders {
        sender.await.unwrap().unwrap();
    }

    assert_eq!(server.await.unwrap(), (0..SENDERS).collect::<Vec<_>>());
    reader.await.unwrap().unwrap();
    assert_eq!(ws.current_state(), ConnectionState::Closed);
}
