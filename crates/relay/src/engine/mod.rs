// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Matchmaking engine: connection registry, state machine, and cleanup.
//!
//! The transport layer only talks to [`Engine`]. Each connection gets an id
//! and an outbound queue on [`Engine::open`], feeds decoded frames through
//! [`Engine::dispatch`], and is torn down by dropping its
//! [`DisconnectGuard`].

pub mod connection;
pub mod invite;
mod lifecycle;
pub mod registry;
mod router;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::protocol::{ClientMessage, LobbyInfo, ServerMessage};

use self::connection::{ConnId, Connection, Outbox};
use self::invite::{InviteCodes, RandomCodes};
use self::registry::Registry;

/// Default per-connection outbound queue depth.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Shared matchmaking context.
///
/// All registry access goes through one lock and every handler runs to
/// completion while holding it. Handlers never await; outbound frames are
/// queued with `try_send` and written by each connection's own task.
pub struct Engine {
    registry: Mutex<Registry>,
    codes: Box<dyn InviteCodes>,
    next_id: AtomicU64,
    outbox_capacity: usize,
}

impl Engine {
    pub fn new(codes: Box<dyn InviteCodes>, outbox_capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::new()),
            codes,
            next_id: AtomicU64::new(1),
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(Box::new(RandomCodes::new(config.invite_code_len)), config.outbox_capacity)
    }

    /// Register a new connection with a fresh outbound queue.
    pub fn open(&self) -> (ConnId, mpsc::Receiver<ServerMessage>) {
        let (outbox, rx) = Outbox::channel(self.outbox_capacity);
        (self.connect(outbox), rx)
    }

    /// Register a connection that delivers through `outbox`.
    ///
    /// The new connection starts `Ready` and immediately receives the
    /// current lobby snapshot.
    pub fn connect(&self, outbox: Outbox) -> ConnId {
        let id = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut reg = self.registry.lock();
        reg.add_user(Connection::new(id, outbox));
        reg.send(id, reg.snapshot_message());
        tracing::info!(conn = %id, users = reg.user_count(), "player connected");
        id
    }

    /// Route one decoded client message.
    pub fn dispatch(&self, id: ConnId, msg: ClientMessage) {
        let mut reg = self.registry.lock();
        router::route(&mut reg, self.codes.as_ref(), id, msg);
    }

    /// Decode and route one text frame. Malformed frames are dropped.
    pub fn dispatch_text(&self, id: ConnId, text: &str) {
        match ClientMessage::decode(text) {
            Some(msg) => self.dispatch(id, msg),
            None => tracing::debug!(conn = %id, len = text.len(), "malformed frame dropped"),
        }
    }

    /// Tear down a connection. Repeated calls are no-ops.
    pub fn disconnect(&self, id: ConnId) {
        let mut reg = self.registry.lock();
        lifecycle::disconnect(&mut reg, id);
    }

    /// Guard that disconnects `id` when dropped.
    pub fn guard(&self, id: ConnId) -> DisconnectGuard<'_> {
        DisconnectGuard { engine: self, id }
    }

    /// Current open public lobbies.
    pub fn snapshot(&self) -> Vec<LobbyInfo> {
        self.registry.lock().snapshot()
    }

    pub fn user_count(&self) -> usize {
        self.registry.lock().user_count()
    }

    /// Run `f` against the registry under the engine lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let reg = self.registry.lock();
        f(&reg)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Box::new(RandomCodes::default()), DEFAULT_OUTBOX_CAPACITY)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("outbox_capacity", &self.outbox_capacity)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Disconnects its connection on drop, however the owning task ends.
pub struct DisconnectGuard<'a> {
    engine: &'a Engine,
    id: ConnId,
}

impl Drop for DisconnectGuard<'_> {
    fn drop(&mut self) {
        self.engine.disconnect(self.id);
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
