// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection set, public waiting table, and invite table.
//!
//! A `Registry` is plain data. Atomicity comes from the owner: the engine
//! holds it behind one mutex and every message handler runs to completion
//! under that lock, so claim-then-remove can never hand the same lobby or
//! invite to two connections.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::engine::connection::{ConnId, Connection, PlayerState, Role};
use crate::engine::invite::InviteCodes;
use crate::protocol::{LobbyInfo, ServerMessage};

/// Attempts at drawing an invite code that is not already outstanding.
const INVITE_ATTEMPTS: usize = 16;

/// A public lobby awaiting its second player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingEntry {
    pub conn: ConnId,
    pub diff: String,
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnId, Connection>,
    /// Insertion-ordered so snapshots list lobbies oldest first.
    waiting: IndexMap<String, WaitingEntry>,
    invites: HashMap<String, ConnId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Connection set ------------------------------------------------------

    pub fn add_user(&mut self, conn: Connection) {
        self.connections.insert(conn.id, conn);
    }

    pub fn remove_user(&mut self, id: ConnId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn user_count(&self) -> usize {
        self.connections.len()
    }

    /// Idle connections with a live channel: the snapshot audience.
    pub fn ready_users(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(|c| c.state == PlayerState::Ready && c.is_live())
    }

    pub fn state_of(&self, id: ConnId) -> Option<PlayerState> {
        self.get(id).map(|c| c.state)
    }

    pub fn is_live(&self, id: ConnId) -> bool {
        self.get(id).is_some_and(Connection::is_live)
    }

    /// Queue a message for `id`. Unknown ids are skipped like dead channels.
    pub fn send(&self, id: ConnId, msg: ServerMessage) -> bool {
        match self.get(id) {
            Some(conn) => conn.send(msg),
            None => false,
        }
    }

    // -- Waiting table -------------------------------------------------------

    /// Register a public lobby. Returns `false` if the id is already taken.
    pub fn register_waiting(&mut self, lobby_id: &str, conn: ConnId, diff: &str) -> bool {
        if self.waiting.contains_key(lobby_id) {
            return false;
        }
        self.waiting.insert(lobby_id.to_owned(), WaitingEntry { conn, diff: diff.to_owned() });
        true
    }

    /// Look up and remove a lobby in one step.
    pub fn claim_waiting(&mut self, lobby_id: &str) -> Option<WaitingEntry> {
        self.waiting.shift_remove(lobby_id)
    }

    /// Remove a lobby only if `owner` still holds it.
    pub fn release_waiting(&mut self, lobby_id: &str, owner: ConnId) -> bool {
        if self.waiting.get(lobby_id).is_some_and(|e| e.conn == owner) {
            self.waiting.shift_remove(lobby_id);
            return true;
        }
        false
    }

    pub fn waiting_entry(&self, lobby_id: &str) -> Option<&WaitingEntry> {
        self.waiting.get(lobby_id)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    // -- Invite table --------------------------------------------------------

    /// Register an invite code. Returns `false` if the code is outstanding.
    pub fn register_invite(&mut self, code: &str, conn: ConnId) -> bool {
        if self.invites.contains_key(code) {
            return false;
        }
        self.invites.insert(code.to_owned(), conn);
        true
    }

    /// Look up and remove an invite in one step.
    pub fn claim_invite(&mut self, code: &str) -> Option<ConnId> {
        self.invites.remove(code)
    }

    /// Remove an invite only if `owner` still holds it.
    pub fn release_invite(&mut self, code: &str, owner: ConnId) -> bool {
        if self.invites.get(code) == Some(&owner) {
            self.invites.remove(code);
            return true;
        }
        false
    }

    /// Draw a code not currently outstanding and register it for `conn`.
    ///
    /// After [`INVITE_ATTEMPTS`] colliding draws the last candidate replaces
    /// the older entry.
    pub fn issue_invite(&mut self, codes: &dyn InviteCodes, conn: ConnId) -> String {
        let mut code = codes.generate();
        for _ in 1..INVITE_ATTEMPTS {
            if !self.invites.contains_key(&code) {
                break;
            }
            code = codes.generate();
        }
        if self.invites.insert(code.clone(), conn).is_some() {
            tracing::warn!(code = %code, "invite code space exhausted, replacing outstanding invite");
        }
        code
    }

    pub fn invite_owner(&self, code: &str) -> Option<ConnId> {
        self.invites.get(code).copied()
    }

    pub fn invite_count(&self) -> usize {
        self.invites.len()
    }

    // -- Pairing -------------------------------------------------------------

    /// Link two connections. `first` was already waiting and becomes player
    /// one; `second` triggered the pairing and becomes player two.
    pub fn pair(&mut self, first: ConnId, second: ConnId) {
        if let Some(conn) = self.get_mut(first) {
            conn.partner = Some(second);
            conn.role = Some(Role::PlayerOne);
        }
        if let Some(conn) = self.get_mut(second) {
            conn.partner = Some(first);
            conn.role = Some(Role::PlayerTwo);
        }
    }

    /// Clear the partner link on both sides. Returns the former partner if it
    /// is still registered.
    pub fn unpair(&mut self, id: ConnId) -> Option<ConnId> {
        let partner = self.get_mut(id)?.partner.take()?;
        let other = self.get_mut(partner)?;
        if other.partner == Some(id) {
            other.partner = None;
        }
        Some(partner)
    }

    /// The partner of `id`, if the link is current on both sides and the
    /// partner's channel is still open.
    pub fn live_partner(&self, id: ConnId) -> Option<ConnId> {
        let partner = self.get(id)?.partner?;
        let other = self.get(partner)?;
        (other.partner == Some(id) && other.is_live()).then_some(partner)
    }

    /// Whether every partner link is reciprocated.
    pub fn partners_symmetric(&self) -> bool {
        self.connections.values().all(|c| match c.partner {
            Some(p) => self.get(p).is_some_and(|other| other.partner == Some(c.id)),
            None => true,
        })
    }

    // -- Snapshots -----------------------------------------------------------

    /// Open public lobbies in registration order.
    pub fn snapshot(&self) -> Vec<LobbyInfo> {
        self.waiting
            .iter()
            .map(|(id, entry)| LobbyInfo { id: id.clone(), diff: entry.diff.clone() })
            .collect()
    }

    pub fn snapshot_message(&self) -> ServerMessage {
        ServerMessage::Users(self.snapshot())
    }

    /// Push the current snapshot to every idle connection. Each delivery is
    /// independent; a dead or full queue only affects its own recipient.
    pub fn broadcast_snapshot(&self) {
        let msg = self.snapshot_message();
        let mut delivered = 0usize;
        for conn in self.ready_users() {
            if conn.send(msg.clone()) {
                delivered += 1;
            }
        }
        tracing::debug!(lobbies = self.waiting.len(), delivered, "lobby snapshot broadcast");
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
