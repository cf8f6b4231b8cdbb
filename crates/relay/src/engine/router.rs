// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-state message handlers.
//!
//! Handlers run to completion under the engine lock and only queue outbound
//! messages, so every registry read and write inside one handler is atomic.
//! Messages that are unknown or not legal in the current state are dropped.

use serde_json::Value;

use crate::engine::connection::{ConnId, PlayerState, Role};
use crate::engine::invite::InviteCodes;
use crate::engine::registry::Registry;
use crate::protocol::{ClientMessage, InviteRequest, JoinRequest, ServerMessage};

/// Dispatch one decoded message from `id`.
pub(crate) fn route(reg: &mut Registry, codes: &dyn InviteCodes, id: ConnId, msg: ClientMessage) {
    let Some(state) = reg.state_of(id) else {
        return;
    };

    match state {
        PlayerState::Ready => on_ready(reg, codes, id, msg),
        PlayerState::Waiting | PlayerState::Loading | PlayerState::Loaded => {
            on_matching(reg, id, state, msg)
        }
        PlayerState::Playing => on_playing(reg, id, msg),
        PlayerState::Invite => on_invite(reg, id, msg),
        PlayerState::SongSel => on_songsel(reg, id, msg),
    }
}

fn ignored(id: ConnId, state: PlayerState, msg: &ClientMessage) {
    tracing::debug!(conn = %id, %state, kind = msg.kind(), "message ignored in current state");
}

fn set_state(reg: &mut Registry, id: ConnId, next: PlayerState) {
    if let Some(conn) = reg.get_mut(id) {
        tracing::debug!(conn = %id, prev = %conn.state, %next, "state transition");
        conn.state = next;
    }
}

fn set_profile(reg: &mut Registry, id: ConnId, name: Option<Value>, don: Option<Value>) {
    if let Some(conn) = reg.get_mut(id) {
        conn.name = name;
        conn.don = don;
    }
}

/// Reset `id` to `Ready` and sever its partner link on both sides.
/// Returns the former partner if it is still registered.
fn reset(reg: &mut Registry, id: ConnId) -> Option<ConnId> {
    let partner = reg.unpair(id);
    if let Some(conn) = reg.get_mut(id) {
        tracing::debug!(conn = %id, prev = %conn.state, next = "ready", "state reset");
        conn.reset();
    }
    partner
}

/// Tell a connection its match is over and show it the lobby list.
fn send_game_end(reg: &Registry, id: ConnId) {
    reg.send(id, ServerMessage::GameEnd);
    reg.send(id, reg.snapshot_message());
}

/// Reset a connection whose partner is gone.
fn abandon(reg: &mut Registry, id: ConnId) {
    reset(reg, id);
    send_game_end(reg, id);
}

/// End a paired match for both sides.
fn end_pair(reg: &mut Registry, id: ConnId, partner: ConnId) {
    reset(reg, id);
    reset(reg, partner);
    send_game_end(reg, id);
    send_game_end(reg, partner);
    tracing::info!(conn = %id, %partner, "match ended");
}

fn role_of(reg: &Registry, id: ConnId) -> u8 {
    reg.get(id).and_then(|c| c.role).map_or(Role::PlayerOne.number(), Role::number)
}

// -- ready -------------------------------------------------------------------

fn on_ready(reg: &mut Registry, codes: &dyn InviteCodes, id: ConnId, msg: ClientMessage) {
    match msg {
        ClientMessage::Join(req) => join_lobby(reg, id, req),
        ClientMessage::Invite(Some(InviteRequest { id: None, name, don })) => {
            set_profile(reg, id, name, don);
            issue_invite(reg, codes, id);
        }
        ClientMessage::Invite(Some(InviteRequest { id: Some(code), name, don })) => {
            set_profile(reg, id, name, don);
            accept_invite(reg, id, &code);
        }
        ClientMessage::Invite(None) => {
            reg.send(id, ServerMessage::GameEnd);
        }
        other => ignored(id, PlayerState::Ready, &other),
    }
}

fn join_lobby(reg: &mut Registry, id: ConnId, req: JoinRequest) {
    let target = req.target().map(|(lobby, diff)| (lobby.to_owned(), diff.to_owned()));
    set_profile(reg, id, req.name, req.don);
    let Some((lobby, diff)) = target else {
        tracing::debug!(conn = %id, "join without lobby id or difficulty ignored");
        return;
    };

    match reg.claim_waiting(&lobby) {
        Some(entry) if entry.conn != id && reg.is_live(entry.conn) => {
            start_public_match(reg, entry.conn, &entry.diff, id, &diff);
        }
        stale => {
            if let Some(entry) = stale {
                tracing::debug!(conn = %id, lobby = %lobby, waiter = %entry.conn, "replacing stale waiter");
            }
            reg.register_waiting(&lobby, id, &diff);
            if let Some(conn) = reg.get_mut(id) {
                conn.lobby_id = Some(lobby);
            }
            set_state(reg, id, PlayerState::Waiting);
            reg.send(id, ServerMessage::Waiting);
        }
    }

    reg.broadcast_snapshot();
}

fn start_public_match(
    reg: &mut Registry,
    waiter: ConnId,
    waiter_diff: &str,
    joiner: ConnId,
    joiner_diff: &str,
) {
    reg.pair(waiter, joiner);
    if let Some(conn) = reg.get_mut(waiter) {
        conn.lobby_id = None;
    }
    set_state(reg, waiter, PlayerState::Loading);
    set_state(reg, joiner, PlayerState::Loading);

    reg.send(
        joiner,
        ServerMessage::GameLoad {
            diff: waiter_diff.to_owned(),
            player: Role::PlayerTwo.number(),
        },
    );
    reg.send(
        waiter,
        ServerMessage::GameLoad {
            diff: joiner_diff.to_owned(),
            player: Role::PlayerOne.number(),
        },
    );
    send_names(reg, waiter, joiner);
    tracing::info!(player1 = %waiter, player2 = %joiner, "lobby match paired");
}

/// Each side learns the other's display name and avatar.
fn send_names(reg: &Registry, a: ConnId, b: ConnId) {
    if let (Some(ca), Some(cb)) = (reg.get(a), reg.get(b)) {
        cb.send(ca.name_message());
        ca.send(cb.name_message());
    }
}

fn issue_invite(reg: &mut Registry, codes: &dyn InviteCodes, id: ConnId) {
    let code = reg.issue_invite(codes, id);
    if let Some(conn) = reg.get_mut(id) {
        conn.session = Some(code.clone());
    }
    set_state(reg, id, PlayerState::Invite);
    tracing::info!(conn = %id, code = %code, "invite issued");
    reg.send(id, ServerMessage::InviteCode(code));
}

fn accept_invite(reg: &mut Registry, id: ConnId, code: &str) {
    let host = match reg.claim_invite(code) {
        Some(host) if host != id && reg.is_live(host) => host,
        claimed => {
            tracing::debug!(conn = %id, code, stale = claimed.is_some(), "invite not available");
            reg.send(id, ServerMessage::GameEnd);
            return;
        }
    };

    reg.pair(host, id);
    for conn in [host, id] {
        if let Some(c) = reg.get_mut(conn) {
            c.session = Some(code.to_owned());
        }
        set_state(reg, conn, PlayerState::Invite);
    }

    reg.send(id, ServerMessage::Session { player: Role::PlayerTwo.number() });
    reg.send(host, ServerMessage::Session { player: Role::PlayerOne.number() });
    reg.send(id, ServerMessage::InviteAck);
    send_names(reg, host, id);
    tracing::info!(player1 = %host, player2 = %id, code, "invite session paired");
}

// -- waiting / loading / loaded ----------------------------------------------

fn on_matching(reg: &mut Registry, id: ConnId, state: PlayerState, msg: ClientMessage) {
    match msg {
        ClientMessage::Leave => leave_match(reg, id),
        ClientMessage::GameStart if state == PlayerState::Loading => mark_loaded(reg, id),
        other => ignored(id, state, &other),
    }
}

fn leave_match(reg: &mut Registry, id: ConnId) {
    let Some(conn) = reg.get(id) else {
        return;
    };
    let in_session = conn.session.is_some();
    let lobby = conn.lobby_id.clone();

    if in_session {
        match reg.live_partner(id) {
            Some(partner) => {
                if let Some(conn) = reg.get_mut(id) {
                    conn.lobby_id = None;
                    conn.session_diff = None;
                }
                set_state(reg, id, PlayerState::SongSel);
                reg.send(id, ServerMessage::Left);
                reg.send(partner, ServerMessage::empty_roster());
            }
            None => abandon(reg, id),
        }
        return;
    }

    if let Some(lobby) = lobby {
        reg.release_waiting(&lobby, id);
    }
    let partner = reg.live_partner(id);
    reset(reg, id);
    if let Some(partner) = partner {
        reset(reg, partner);
        reg.send(partner, ServerMessage::GameEnd);
    }
    reg.send(id, ServerMessage::Left);
    reg.broadcast_snapshot();
}

fn mark_loaded(reg: &mut Registry, id: ConnId) {
    set_state(reg, id, PlayerState::Loaded);
    let Some(partner) = reg.live_partner(id) else {
        return;
    };
    if reg.state_of(partner) == Some(PlayerState::Loaded) {
        set_state(reg, id, PlayerState::Playing);
        set_state(reg, partner, PlayerState::Playing);
        reg.send(id, ServerMessage::GameStart);
        reg.send(partner, ServerMessage::GameStart);
        tracing::info!(conn = %id, %partner, "match started");
    }
}

// -- playing -----------------------------------------------------------------

fn on_playing(reg: &mut Registry, id: ConnId, msg: ClientMessage) {
    let Some(partner) = reg.live_partner(id) else {
        tracing::debug!(conn = %id, kind = msg.kind(), "partner gone during play");
        abandon(reg, id);
        return;
    };

    match msg {
        ClientMessage::Relay(kind, value) => {
            reg.send(partner, ServerMessage::Relay(kind, value));
        }
        ClientMessage::SongSel(_) if reg.get(id).is_some_and(|c| c.session.is_some()) => {
            for conn in [id, partner] {
                set_state(reg, conn, PlayerState::SongSel);
                reg.send(conn, ServerMessage::SongSel(None));
                reg.send(conn, ServerMessage::empty_roster());
            }
        }
        ClientMessage::GameEnd => end_pair(reg, id, partner),
        other => ignored(id, PlayerState::Playing, &other),
    }
}

// -- invite ------------------------------------------------------------------

fn on_invite(reg: &mut Registry, id: ConnId, msg: ClientMessage) {
    match msg {
        ClientMessage::Leave => leave_invite(reg, id),
        ClientMessage::SongSel(_) => {
            if reg.get(id).is_some_and(|c| c.session.is_some()) {
                if let Some(partner) = reg.live_partner(id) {
                    for conn in [id, partner] {
                        set_state(reg, conn, PlayerState::SongSel);
                        reg.send(conn, ServerMessage::SongSel(None));
                    }
                }
            }
        }
        other => ignored(id, PlayerState::Invite, &other),
    }
}

fn leave_invite(reg: &mut Registry, id: ConnId) {
    if let Some(code) = reg.get(id).and_then(|c| c.session.clone()) {
        reg.release_invite(&code, id);
    }
    let partner = reg.live_partner(id);
    reset(reg, id);
    if let Some(partner) = partner {
        reset(reg, partner);
        send_game_end(reg, partner);
    }
    reg.send(id, ServerMessage::Left);
    reg.send(id, reg.snapshot_message());
}

// -- songsel (invite sessions) -----------------------------------------------

fn on_songsel(reg: &mut Registry, id: ConnId, msg: ClientMessage) {
    let Some(partner) = reg.live_partner(id) else {
        tracing::debug!(conn = %id, kind = msg.kind(), "session partner gone");
        abandon(reg, id);
        return;
    };

    match msg {
        ClientMessage::SongSel(Some(Value::Object(mut cursor))) => {
            if reg.state_of(partner) == Some(PlayerState::SongSel) {
                cursor.insert("player".to_owned(), Value::from(role_of(reg, id)));
                let value = Value::Object(cursor);
                reg.send(id, ServerMessage::SongSel(Some(value.clone())));
                reg.send(partner, ServerMessage::SongSel(Some(value)));
            }
        }
        ClientMessage::CatJump(Some(Value::Object(mut cursor))) => {
            if reg.state_of(partner) == Some(PlayerState::SongSel) {
                cursor.insert("player".to_owned(), Value::from(role_of(reg, id)));
                let value = Value::Object(cursor);
                reg.send(id, ServerMessage::CatJump(value.clone()));
                reg.send(partner, ServerMessage::CatJump(value));
            }
        }
        ClientMessage::Join(req) => join_session_song(reg, id, partner, req),
        ClientMessage::GameEnd => end_pair(reg, id, partner),
        other => ignored(id, PlayerState::SongSel, &other),
    }
}

/// Private rendezvous on a song inside an invite session. Never touches the
/// public waiting table.
fn join_session_song(reg: &mut Registry, id: ConnId, partner: ConnId, req: JoinRequest) {
    let Some((song, diff)) = req.target() else {
        tracing::debug!(conn = %id, "session join without song id or difficulty ignored");
        return;
    };

    let partner_diff = reg.get(partner).and_then(|p| {
        let waiting_here =
            p.state == PlayerState::Waiting && p.lobby_id.as_deref() == Some(song);
        if waiting_here {
            p.session_diff.clone()
        } else {
            None
        }
    });

    match partner_diff {
        Some(partner_diff) => {
            for conn in [id, partner] {
                if let Some(c) = reg.get_mut(conn) {
                    c.lobby_id = None;
                    c.session_diff = None;
                }
                set_state(reg, conn, PlayerState::Loading);
            }
            reg.send(id, ServerMessage::GameLoad { diff: partner_diff, player: role_of(reg, id) });
            reg.send(
                partner,
                ServerMessage::GameLoad { diff: diff.to_owned(), player: role_of(reg, partner) },
            );
            tracing::info!(conn = %id, %partner, song, "session song loading");
        }
        None => {
            if let Some(conn) = reg.get_mut(id) {
                conn.lobby_id = Some(song.to_owned());
                conn.session_diff = Some(diff.to_owned());
            }
            set_state(reg, id, PlayerState::Waiting);
            reg.send(id, ServerMessage::Waiting);
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
