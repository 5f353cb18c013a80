//! Wire protocol events exchanged with game clients.

use serde::{Deserialize, Serialize};

use crate::transport::ConnectionId;

/// Combat inputs a client can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Block,
    Attack,
    Special,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    /// Join a fight, creating it if the id is unknown
    Join {
        fight_id: String,
        fighter_id: String,
        display_name: Option<String>,
        character: String,
    },

    /// Combat input for an active fight
    Action {
        fight_id: String,
        fighter_id: String,
        action: ActionKind,
        attack_type: String,
        damage: u32,
        #[serde(default)]
        blocking: bool,
    },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    /// First fighter is in, fight stays open for an opponent
    WaitingForOpponent,

    /// Both seats filled; payload describes the recipient's opponent
    FightStart {
        opponent_name: String,
        opponent_character: String,
        is_host: bool,
    },

    /// The opponent landed an action on the recipient
    OpponentAction {
        action: ActionKind,
        attack_type: String,
        damage: u32,
    },

    /// The recipient's action connected
    DamageDealt { damage: u32, opponent_health: u32 },

    /// Fight decided by knockout
    FightOver { winner: bool, opponent_health: u32 },

    /// The opponent's connection dropped
    OpponentLeft,

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

/// A join as delivered by the transport layer.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub fight_id: String,
    pub fighter_id: String,
    pub display_name: Option<String>,
    pub character: String,
    pub connection: ConnectionId,
}

/// A combat action as delivered by the transport layer.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub fight_id: String,
    pub fighter_id: String,
    pub action: ActionKind,
    pub attack_type: String,
    pub damage: u32,
    pub blocking: bool,
}
