// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the relay.

pub mod ws;

use std::sync::Arc;

use axum::http::Uri;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ErrorCode;
use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Liveness probe
        .route("/health", get(health))
        // Multiplayer channel; `/p2` is the path the game client uses.
        .route("/ws", get(ws::ws_handler))
        .route("/p2", get(ws::ws_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    ErrorCode::NotFound.to_http_response(format!("no route for {}", uri.path()))
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
