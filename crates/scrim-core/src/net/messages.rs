use serde::{Deserialize, Serialize};

use crate::player::Player;
use crate::room::{Phase, RoomState};

use super::validate::Issue;

/// Events a client may send, tagged by wire event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "ping")]
    Ping(PingMsg),
    #[serde(rename = "create")]
    Create(CreateMsg),
    #[serde(rename = "join")]
    Join(JoinMsg),
    #[serde(rename = "setReady")]
    SetReady(SetReadyMsg),
}

/// Events the server may send, tagged by wire event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "pong")]
    Pong(PongMsg),
    #[serde(rename = "created")]
    Created(CreatedMsg),
    #[serde(rename = "joined")]
    Joined(JoinedMsg),
    #[serde(rename = "players")]
    Players(PlayersMsg),
    #[serde(rename = "state")]
    State(RoomState),
    #[serde(rename = "tick")]
    Tick(TickMsg),
    #[serde(rename = "rejected:badPayload")]
    BadPayload(BadPayloadMsg),
    #[serde(rename = "rejected:notFound")]
    NotFound(NotFoundMsg),
    #[serde(rename = "rejected:full")]
    Full(FullMsg),
    #[serde(rename = "rejected:started")]
    Started(StartedMsg),
}

/// Connectivity probe, echoed back verbatim in `pong`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMsg {
    pub hello: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMsg {
    pub host_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReadyMsg {
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongMsg {
    pub echo: PingMsg,
    pub server_time: u64,
}

/// Reply to the host after room creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedMsg {
    pub code: String,
    pub player: Player,
}

/// Join confirmation carrying the completed player record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedMsg {
    pub code: String,
    pub player: Player,
}

/// Roster broadcast sent after any membership or readiness change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayersMsg {
    pub roster: Vec<Player>,
    pub state: RoomState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMsg {
    pub tick: u64,
}

/// Rejection for a recognized event whose payload failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadPayloadMsg {
    pub event: String,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundMsg {
    /// Kind of thing that was missing, currently always "room".
    pub what: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullMsg {
    pub code: String,
    pub max: u8,
}

/// Late-join rejection: the room has left the lobby phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedMsg {
    pub code: String,
    pub phase: Phase,
}
