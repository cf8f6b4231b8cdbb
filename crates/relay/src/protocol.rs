// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the multiplayer channel.
//!
//! Every frame in both directions is a JSON envelope `{"type": ..., "value": ...}`
//! where `value` is optional. Client frames are decoded leniently: anything
//! that does not fit the envelope, or a known type whose value has the wrong
//! shape, decodes to `None` and is dropped by the caller. Unknown types decode
//! to [`ClientMessage::Unknown`] so routing can ignore them explicitly.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// One open public lobby, as listed in a `users` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyInfo {
    pub id: String,
    pub diff: String,
}

/// Gameplay event kinds relayed verbatim between paired players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    Note,
    Drumroll,
    Branch,
    GameResults,
}

impl RelayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Drumroll => "drumroll",
            Self::Branch => "branch",
            Self::GameResults => "gameresults",
        }
    }

    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "note" => Some(Self::Note),
            "drumroll" => Some(Self::Drumroll),
            "branch" => Some(Self::Branch),
            "gameresults" => Some(Self::GameResults),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// `join` payload: request a public lobby (or a session song) by id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
    /// Display name, forwarded to the opponent as given.
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub don: Option<Value>,
}

impl JoinRequest {
    /// Lobby id and difficulty, if both are present and non-empty.
    pub fn target(&self) -> Option<(&str, &str)> {
        let id = self.id.as_deref().filter(|s| !s.is_empty())?;
        let diff = self.diff.as_deref().filter(|s| !s.is_empty())?;
        Some((id, diff))
    }
}

/// `invite` payload: `id: null` asks for a new code, `id: "<code>"` accepts one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub id: Option<String>,
    /// Display name, forwarded to the opponent as given.
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub don: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Option<Value>,
}

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinRequest),
    /// `None` when the frame carried no value at all.
    Invite(Option<InviteRequest>),
    Leave,
    GameStart,
    GameEnd,
    SongSel(Option<Value>),
    CatJump(Option<Value>),
    Relay(RelayKind, Option<Value>),
    Unknown(String),
}

impl ClientMessage {
    /// Decode a text frame. Returns `None` for malformed input.
    pub fn decode(text: &str) -> Option<Self> {
        let Envelope { kind, value } = serde_json::from_str(text).ok()?;

        let msg = match kind.as_str() {
            "join" => match value {
                Some(v) => Self::Join(serde_json::from_value(v).ok()?),
                None => Self::Join(JoinRequest::default()),
            },
            "invite" => match value {
                Some(v) => Self::Invite(Some(serde_json::from_value(v).ok()?)),
                None => Self::Invite(None),
            },
            "leave" => Self::Leave,
            "gamestart" => Self::GameStart,
            "gameend" => Self::GameEnd,
            "songsel" => Self::SongSel(value),
            "catjump" => Self::CatJump(value),
            other => match RelayKind::parse(other) {
                Some(relay) => Self::Relay(relay, value),
                None => Self::Unknown(kind),
            },
        };
        Some(msg)
    }

    /// Wire type name, for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Join(_) => "join",
            Self::Invite(_) => "invite",
            Self::Leave => "leave",
            Self::GameStart => "gamestart",
            Self::GameEnd => "gameend",
            Self::SongSel(_) => "songsel",
            Self::CatJump(_) => "catjump",
            Self::Relay(kind, _) => kind.as_str(),
            Self::Unknown(kind) => kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// A frame pushed to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Open public lobbies.
    Users(Vec<LobbyInfo>),
    Waiting,
    GameLoad { diff: String, player: u8 },
    /// Display name and avatar of the opponent.
    Name { name: Option<Value>, don: Option<Value> },
    /// Freshly issued invite code.
    InviteCode(String),
    /// Acknowledges a successful invite claim.
    InviteAck,
    Session { player: u8 },
    GameEnd,
    GameStart,
    Left,
    SongSel(Option<Value>),
    CatJump(Value),
    Relay(RelayKind, Option<Value>),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Users(_) => "users",
            Self::Waiting => "waiting",
            Self::GameLoad { .. } => "gameload",
            Self::Name { .. } => "name",
            Self::InviteCode(_) | Self::InviteAck => "invite",
            Self::Session { .. } => "session",
            Self::GameEnd => "gameend",
            Self::GameStart => "gamestart",
            Self::Left => "left",
            Self::SongSel(_) => "songsel",
            Self::CatJump(_) => "catjump",
            Self::Relay(kind, _) => kind.as_str(),
        }
    }

    /// An empty roster, which paired clients read as "the peer left".
    pub fn empty_roster() -> Self {
        Self::Users(Vec::new())
    }

    fn has_value(&self) -> bool {
        !matches!(
            self,
            Self::Waiting
                | Self::InviteAck
                | Self::GameEnd
                | Self::GameStart
                | Self::Left
                | Self::SongSel(None)
                | Self::Relay(_, None)
        )
    }
}

#[derive(Serialize)]
struct GameLoadValue<'a> {
    diff: &'a str,
    player: u8,
}

#[derive(Serialize)]
struct NameValue<'a> {
    name: &'a Option<Value>,
    don: &'a Option<Value>,
}

#[derive(Serialize)]
struct SessionValue {
    player: u8,
}

impl Serialize for ServerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.has_value() { 2 } else { 1 };
        let mut st = serializer.serialize_struct("Envelope", len)?;
        st.serialize_field("type", self.kind())?;
        match self {
            Self::Users(lobbies) => st.serialize_field("value", lobbies)?,
            Self::GameLoad { diff, player } => {
                st.serialize_field("value", &GameLoadValue { diff, player: *player })?
            }
            Self::Name { name, don } => st.serialize_field("value", &NameValue { name, don })?,
            Self::InviteCode(code) => st.serialize_field("value", code)?,
            Self::Session { player } => {
                st.serialize_field("value", &SessionValue { player: *player })?
            }
            Self::SongSel(Some(v)) | Self::CatJump(v) | Self::Relay(_, Some(v)) => {
                st.serialize_field("value", v)?
            }
            Self::Waiting
            | Self::InviteAck
            | Self::GameEnd
            | Self::GameStart
            | Self::Left
            | Self::SongSel(None)
            | Self::Relay(_, None) => {}
        }
        st.end()
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
