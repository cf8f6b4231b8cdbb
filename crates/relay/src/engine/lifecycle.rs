// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::engine::connection::ConnId;
use crate::engine::registry::Registry;
use crate::protocol::ServerMessage;

/// Unregister a terminated connection and repair whatever referenced it.
///
/// Safe to call more than once: after the first call the id is unknown and
/// nothing happens.
pub(crate) fn disconnect(reg: &mut Registry, id: ConnId) {
    let Some(conn) = reg.remove_user(id) else {
        return;
    };

    let mut lobby_closed = false;
    if let Some(lobby) = conn.lobby_id.as_deref() {
        lobby_closed = reg.release_waiting(lobby, id);
    }
    if let Some(code) = conn.session.as_deref() {
        if reg.release_invite(code, id) {
            tracing::debug!(conn = %id, code, "outstanding invite withdrawn");
        }
    }

    let mut partner_reset = None;
    if let Some(partner) = conn.partner {
        if let Some(other) = reg.get_mut(partner) {
            if other.partner == Some(id) {
                other.partner = None;
                if other.is_live() {
                    tracing::debug!(conn = %partner, prev = %other.state, next = "ready", "partner disconnected");
                    other.reset();
                    partner_reset = Some(partner);
                }
            }
        }
    }

    if let Some(partner) = partner_reset {
        reg.send(partner, ServerMessage::GameEnd);
        if !lobby_closed {
            reg.send(partner, reg.snapshot_message());
        }
    }
    if lobby_closed {
        reg.broadcast_snapshot();
    }

    let state = conn.state;
    tracing::info!(conn = %id, %state, users = reg.user_count(), "player disconnected");
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
