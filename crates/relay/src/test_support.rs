// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: fixtures, fake clients, and assertion helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::engine::connection::ConnId;
use crate::engine::invite::InviteCodes;
use crate::engine::Engine;
use crate::protocol::ServerMessage;
use crate::state::RelayState;

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// Config with defaults and an ephemeral port.
pub fn test_config() -> RelayConfig {
    RelayConfig::parse_from(["taiko-relay", "0"])
}

/// Invite codes handed out from a fixed list, cycling when exhausted.
#[derive(Debug)]
pub struct SeqCodes {
    codes: Vec<String>,
    next: AtomicUsize,
}

impl SeqCodes {
    pub fn new(codes: &[&str]) -> Self {
        Self { codes: codes.iter().map(|c| (*c).to_owned()).collect(), next: AtomicUsize::new(0) }
    }
}

impl InviteCodes for SeqCodes {
    fn generate(&self) -> String {
        if self.codes.is_empty() {
            return String::new();
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.codes.len();
        self.codes[i].clone()
    }
}

/// Engine whose invite codes come from `codes` in order.
pub fn engine_with_codes(codes: &[&str]) -> Engine {
    Engine::new(Box::new(SeqCodes::new(codes)), 64)
}

/// In-process client: a registered connection plus the receiving end of its
/// outbound queue.
pub struct TestClient {
    pub id: ConnId,
    rx: Option<mpsc::Receiver<ServerMessage>>,
}

impl TestClient {
    /// Connect to `engine` and discard the greeting snapshot.
    pub fn connect(engine: &Engine) -> Self {
        let mut client = Self::connect_raw(engine);
        client.drain();
        client
    }

    /// Connect without consuming anything from the queue.
    pub fn connect_raw(engine: &Engine) -> Self {
        let (id, rx) = engine.open();
        Self { id, rx: Some(rx) }
    }

    /// Decode and dispatch a raw text frame from this client.
    pub fn send(&self, engine: &Engine, frame: &str) {
        engine.dispatch_text(self.id, frame);
    }

    /// Everything queued for this client so far.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        if let Some(rx) = self.rx.as_mut() {
            while let Ok(msg) = rx.try_recv() {
                out.push(msg);
            }
        }
        out
    }

    /// Message types queued for this client so far.
    pub fn kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerMessage::kind).collect()
    }

    /// Drop the receiver, as a socket writer does when the peer vanishes.
    /// The connection stays registered but its channel is no longer live.
    pub fn sever(&mut self) {
        self.rx = None;
    }
}

/// Relay state over the test config, with a fresh shutdown token.
pub fn test_state(config: RelayConfig) -> Arc<RelayState> {
    Arc::new(RelayState::new(config, CancellationToken::new()))
}

/// Spawn an HTTP server on a random port for integration testing.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_http_server(
    state: Arc<RelayState>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let shutdown = state.shutdown.clone();
    let router = crate::transport::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await;
    });
    Ok((addr, handle))
}
