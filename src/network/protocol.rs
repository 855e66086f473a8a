//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is JSON shaped as `{"type": ..., "body": {...}}`;
//! server messages additionally carry an RFC 3339 `eventTime`.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::events::{CardType, RAIL_COUNT};

/// Errors produced while validating inbound messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not valid JSON, or does not match any message schema.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// `eventTime` is not an RFC 3339 timestamp.
    #[error("invalid eventTime {0:?}")]
    InvalidEventTime(String),

    /// Rail index outside 0..=6.
    #[error("rail index {0} out of range")]
    RailIndexOutOfRange(u8),

    /// Life outside 0..=100.
    #[error("life {0} out of range")]
    LifeOutOfRange(u32),
}

/// Maximum life a player can have.
pub const MAX_LIFE: u32 = 100;

/// Validated rail index (0-6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RailIndex(u8);

impl RailIndex {
    /// Create a rail index, rejecting values past the last rail.
    pub fn new(index: u8) -> Result<Self, ProtocolError> {
        if (index as usize) < RAIL_COUNT {
            Ok(Self(index))
        } else {
            Err(ProtocolError::RailIndexOutOfRange(index))
        }
    }

    /// Raw index.
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RailIndex {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RailIndex::new(value)
    }
}

impl From<RailIndex> for u8 {
    fn from(index: RailIndex) -> u8 {
        index.0
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ServerMessage {
    /// A player connected to the room.
    Connected(ConnectedBody),
    /// The match began.
    GameStarted(GameStartedBody),
    /// A player's life changed.
    LifeChanged(LifeChangedBody),
    /// A new rail branched on a target's board.
    RailCreated(RailCreatedBody),
    /// A rail merged back into its parent.
    RailMerged(RailMergedBody),
    /// A sabotage was placed on a target's rail.
    BlockCreated(BlockCreatedBody),
    /// The server confirmed a sabotage repair.
    BlockCanceled(BlockSettledBody),
    /// The server confirmed a sabotage crash.
    BlockCrashed(BlockSettledBody),
    /// A player is out.
    GameOverred(GameOverredBody),
}

impl ServerMessage {
    /// Message type name as on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected(_) => "connected",
            ServerMessage::GameStarted(_) => "gameStarted",
            ServerMessage::LifeChanged(_) => "lifeChanged",
            ServerMessage::RailCreated(_) => "railCreated",
            ServerMessage::RailMerged(_) => "railMerged",
            ServerMessage::BlockCreated(_) => "blockCreated",
            ServerMessage::BlockCanceled(_) => "blockCanceled",
            ServerMessage::BlockCrashed(_) => "blockCrashed",
            ServerMessage::GameOverred(_) => "gameOverred",
        }
    }
}

/// `connected` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedBody {
    /// Player that connected.
    pub player_id: String,
}

/// Player entry in `gameStarted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Player identifier.
    pub id: String,
    /// Starting life.
    pub life: u32,
}

/// Card entry in `gameStarted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEntry {
    /// Card instance identifier.
    pub id: String,
    /// Card type name.
    #[serde(rename = "type")]
    pub kind: String,
}

/// `gameStarted` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartedBody {
    /// Everyone in the match.
    pub players: Vec<PlayerInfo>,
    /// Local player's hand.
    pub cards: Vec<CardEntry>,
}

/// `lifeChanged` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeChangedBody {
    /// Player whose life changed.
    pub player_id: String,
    /// Card that caused it, if any.
    pub card_type: Option<CardType>,
    /// Life after the change (0-100).
    pub new_life: u32,
}

/// `railCreated` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailCreatedBody {
    /// Rail that appears.
    pub new_rail: RailIndex,
    /// Rail it branches from.
    pub parent_rail: RailIndex,
    /// Player who played the card.
    pub attacker_id: String,
    /// Board owner.
    pub target_id: String,
    /// Card played.
    pub card_type: CardType,
}

/// `railMerged` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailMergedBody {
    /// Rail that disappears.
    pub child_rail: RailIndex,
    /// Rail it merges into.
    pub parent_rail: RailIndex,
    /// Board owner.
    pub player_id: String,
    /// Card played.
    pub card_type: CardType,
}

/// `blockCreated` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCreatedBody {
    /// Player who played the card.
    pub attacker_id: String,
    /// Board owner.
    pub target_id: String,
    /// Card played.
    pub card_type: CardType,
    /// Rail that gets blocked.
    pub rail_index: RailIndex,
    /// Seconds from the train reaching the block until it crashes.
    pub delay: u32,
    /// Damage on crash.
    pub attack: u32,
}

/// `blockCanceled` / `blockCrashed` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSettledBody {
    /// Board owner.
    pub target_id: String,
    /// Rail that was blocked.
    pub rail: RailIndex,
    /// Card involved, if any.
    pub card_type: Option<CardType>,
}

/// `gameOverred` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverredBody {
    /// Player who is out.
    pub player_id: String,
}

#[derive(Deserialize)]
struct RawInbound {
    #[serde(rename = "eventTime")]
    event_time: String,
    #[serde(flatten)]
    message: ServerMessage,
}

/// A validated server message with its parsed timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Server event time (Unix epoch milliseconds).
    pub event_time: i64,
    /// Message payload.
    pub message: ServerMessage,
}

impl InboundMessage {
    /// Wrap a payload with its event time.
    pub fn new(event_time: i64, message: ServerMessage) -> Self {
        Self {
            event_time,
            message,
        }
    }

    /// Parse and validate a JSON frame.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        let raw: RawInbound = serde_json::from_str(s)?;
        let event_time = DateTime::parse_from_rfc3339(&raw.event_time)
            .map_err(|_| ProtocolError::InvalidEventTime(raw.event_time.clone()))?
            .timestamp_millis();

        if let ServerMessage::LifeChanged(body) = &raw.message {
            if body.new_life > MAX_LIFE {
                return Err(ProtocolError::LifeOutOfRange(body.new_life));
            }
        }

        Ok(Self {
            event_time,
            message: raw.message,
        })
    }
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Ask the server to start the match.
    GameStartEvent {},
    /// Report a life change.
    LifeEvent(LifeEventBody),
    /// Play a card against a target.
    CardEvent(CardEventBody),
    /// Report how a sabotage on our board ended.
    BlockEvent(BlockEventBody),
}

/// Life change direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifeEventKind {
    /// Took damage
    Damaged,
    /// Regenerated
    Heal,
}

/// `lifeEvent` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEventBody {
    /// Direction.
    #[serde(rename = "type")]
    pub kind: LifeEventKind,
    /// Amount.
    pub diff: u32,
}

/// `cardEvent` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEventBody {
    /// Card instance identifier.
    pub id: String,
    /// Player the card targets.
    pub target_id: String,
    /// Card type.
    #[serde(rename = "type")]
    pub kind: CardType,
}

/// Sabotage result reported by the board owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockEventKind {
    /// Repaired in time
    Canceled,
    /// Deadline passed
    Crashed,
}

/// `blockEvent` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEventBody {
    /// Result.
    #[serde(rename = "type")]
    pub kind: BlockEventKind,
    /// Card that placed the sabotage.
    pub card_type: Option<CardType>,
    /// Rail that was blocked.
    pub rail_index: RailIndex,
}

impl ClientMessage {
    /// Sabotage result message.
    pub fn block_event(kind: BlockEventKind, card_type: Option<CardType>, rail_index: RailIndex) -> Self {
        Self::BlockEvent(BlockEventBody {
            kind,
            card_type,
            rail_index,
        })
    }

    /// Life change message.
    pub fn life_event(kind: LifeEventKind, diff: u32) -> Self {
        Self::LifeEvent(LifeEventBody { kind, diff })
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
