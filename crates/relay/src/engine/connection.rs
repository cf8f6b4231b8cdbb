// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::ServerMessage;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in the matchmaking flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Idle; receives lobby snapshots.
    Ready,
    /// Holding a lobby (public) or a session song (private) for a second player.
    Waiting,
    /// Issued an invite, or paired through one.
    Invite,
    Loading,
    Loaded,
    Playing,
    /// Shared song select inside an invite session.
    SongSel,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Waiting => "waiting",
            Self::Invite => "invite",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Playing => "playing",
            Self::SongSel => "songsel",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seat assigned at pairing time. The party already waiting is always
/// `PlayerOne`; whoever triggers the pairing is `PlayerTwo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    PlayerOne,
    PlayerTwo,
}

impl Role {
    pub fn number(self) -> u8 {
        match self {
            Self::PlayerOne => 1,
            Self::PlayerTwo => 2,
        }
    }
}

/// Sending half of a connection's outbound queue.
///
/// Delivery never blocks and never fails toward the caller: a closed queue
/// means the socket writer is gone, a full queue means the client is not
/// draining. Both drop the message for this recipient only.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<ServerMessage>,
}

impl Outbox {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { tx }
    }

    /// Create an outbox together with the receiver a writer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Whether the receiving side still exists.
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a message. Returns whether it was accepted.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                tracing::warn!(kind = msg.kind(), "outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(msg)) => {
                tracing::debug!(kind = msg.kind(), "outbound queue closed, dropping message");
                false
            }
        }
    }
}

/// Per-client session record.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnId,
    pub state: PlayerState,
    pub outbox: Outbox,
    pub name: Option<Value>,
    /// Opaque avatar customization chosen by the client.
    pub don: Option<Value>,
    /// Lobby or session song id while `Waiting`.
    pub lobby_id: Option<String>,
    /// Difficulty picked for a session rendezvous while `Waiting`.
    pub session_diff: Option<String>,
    /// Invite code of the private session this connection belongs to.
    pub session: Option<String>,
    pub role: Option<Role>,
    /// Paired connection. Resolve through the registry on every use.
    pub partner: Option<ConnId>,
}

impl Connection {
    pub fn new(id: ConnId, outbox: Outbox) -> Self {
        Self {
            id,
            state: PlayerState::Ready,
            outbox,
            name: None,
            don: None,
            lobby_id: None,
            session_diff: None,
            session: None,
            role: None,
            partner: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.outbox.is_live()
    }

    pub fn send(&self, msg: ServerMessage) -> bool {
        self.outbox.send(msg)
    }

    /// `name` message describing this connection, sent to its opponent.
    pub fn name_message(&self) -> ServerMessage {
        ServerMessage::Name { name: self.name.clone(), don: self.don.clone() }
    }

    /// Return to `Ready`, dropping lobby and session bookkeeping.
    ///
    /// The partner link is left alone; callers unpair through the registry
    /// so both sides change together.
    pub fn reset(&mut self) {
        self.state = PlayerState::Ready;
        self.lobby_id = None;
        self.session_diff = None;
        self.session = None;
        self.role = None;
    }
}
