// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::engine::Engine;

/// Shared relay state handed to every request handler.
#[derive(Debug)]
pub struct RelayState {
    pub engine: Engine,
    pub config: RelayConfig,
    /// Cancelled on process shutdown; open sockets close when it fires.
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(config: RelayConfig, shutdown: CancellationToken) -> Self {
        Self { engine: Engine::from_config(&config), config, shutdown }
    }
}
