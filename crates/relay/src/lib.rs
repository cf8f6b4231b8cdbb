// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Taiko relay: two-player matchmaking and gameplay relay for taiko-web.

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod state;
pub mod test_support;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::transport::build_router;

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &RelayConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the relay server until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, config, CancellationToken::new()).await
}

/// Serve on an already-bound listener until `shutdown` fires or a signal
/// arrives.
pub async fn serve(
    listener: TcpListener,
    config: RelayConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    spawn_signal_handler(shutdown.clone());

    let state = Arc::new(RelayState::new(config, shutdown.clone()));
    let router = build_router(state);

    tracing::info!("taiko-relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    tracing::info!("taiko-relay stopped");

    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGTERM");
                shutdown.cancel();
            }
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    tracing::info!("received SIGINT");
                    shutdown.cancel();
                }
            }
        }
    });
}
