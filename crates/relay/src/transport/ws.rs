// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket handler for game clients.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::ErrorCode;
use crate::protocol::ServerMessage;
use crate::state::RelayState;

/// `GET /ws` and `GET /p2` — WebSocket upgrade for the multiplayer channel.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !state.config.origin_allowed(origin) {
        tracing::warn!(origin = origin.unwrap_or("-"), "websocket origin rejected");
        return ErrorCode::Forbidden.to_http_response("origin not allowed").into_response();
    }

    ws.on_upgrade(move |socket| handle_ws(socket, state)).into_response()
}

/// Per-connection WebSocket handler.
///
/// Registers the connection, spawns a writer that drains its outbound queue,
/// and feeds inbound text frames to the engine until the socket closes or
/// the server shuts down. The disconnect guard runs on every exit path.
async fn handle_ws(socket: WebSocket, state: Arc<RelayState>) {
    let engine = &state.engine;
    let (id, outbox_rx) = engine.open();
    let guard = engine.guard(id);

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(write_frames(ws_tx, outbox_rx));

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => engine.dispatch_text(id, text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(conn = %id, err = %e, "websocket read failed");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Dropping the guard removes the connection and with it the last sender,
    // which lets the writer flush and exit.
    drop(guard);
    if let Err(e) = writer.await {
        tracing::debug!(conn = %id, err = %e, "websocket writer task failed");
    }
}

/// Serialize queued messages onto the socket until the queue closes or a
/// write fails.
async fn write_frames(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = rx.recv().await {
        let text = match serde_json::to_string(&msg) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(kind = msg.kind(), err = %e, "failed to encode frame");
                continue;
            }
        };
        if ws_tx.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
    let _ = ws_tx.close().await;
}
