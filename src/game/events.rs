//! Rail Events
//!
//! Pending rail effects, their resolution guard, relation history,
//! and the board events reported from each tick.

use serde::{Deserialize, Serialize};

use crate::core::clock::Millis;
use crate::core::schedule::ScheduledQueue;
use crate::game::sabotage::{Difficulty, SabotageOutcome};

/// Number of rails on every board.
pub const RAIL_COUNT: usize = 7;

/// Rail that starts the train's lineage.
pub const ROOT_RAIL: u8 = 3;

/// Card catalog as sent over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardType {
    /// Yolo
    Yolo,
    /// Galaxy Brain
    GalaxyBrain,
    /// Open Sourcerer
    OpenSourcerer,
    /// Refactoring
    Refactoring,
    /// Pair Extraordinaire
    PairExtraordinaire,
    /// LGTM
    Lgtm,
    /// Pull Shark
    PullShark,
    /// Starstruck
    Starstruck,
    /// No card
    None,
}

impl CardType {
    /// Stable numeric tag for state hashing.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Who played the card that produced an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    /// Attacking player's id
    pub attacker_name: String,
    /// Card that was played
    pub card_type: CardType,
}

/// A pending effect on one rail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RailEvent {
    /// This rail branches off `from_index`.
    Branched {
        /// Parent rail
        from_index: u8,
        /// Card that caused it
        card_info: CardInfo,
    },
    /// This rail merges into `to_index`.
    Merged {
        /// Rail merged into
        to_index: u8,
        /// Card that caused it
        card_info: CardInfo,
    },
    /// An obstruction must be repaired before `delay` seconds pass.
    Sabotage {
        /// Damage dealt on crash
        attack: u32,
        /// Crash window in seconds
        delay: u32,
        /// Repair tier
        difficulty: Difficulty,
        /// Card that placed it
        card_info: CardInfo,
    },
}

impl RailEvent {
    /// Card metadata carried by every variant.
    pub fn card_info(&self) -> &CardInfo {
        match self {
            RailEvent::Branched { card_info, .. }
            | RailEvent::Merged { card_info, .. }
            | RailEvent::Sabotage { card_info, .. } => card_info,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RailEvent::Branched { .. } => "branched",
            RailEvent::Merged { .. } => "merged",
            RailEvent::Sabotage { .. } => "sabotage",
        }
    }
}

/// Sequence number of an event within its rail.
pub type EventId = u64;

/// Deferred work a rail hands to its schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RailNotification {
    /// The active event resolved a while ago; let the next one start.
    Unblock(EventId),
}

/// A queued or active event plus its one-shot resolution guard.
#[derive(Clone, Debug)]
pub struct EventLog {
    id: EventId,
    event: RailEvent,
    resolved_at: Option<Millis>,
}

impl EventLog {
    /// Wrap an event.
    pub fn new(id: EventId, event: RailEvent) -> Self {
        Self {
            id,
            event,
            resolved_at: None,
        }
    }

    /// Sequence number.
    #[inline]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The wrapped event.
    #[inline]
    pub fn event(&self) -> &RailEvent {
        &self.event
    }

    /// When the event resolved.
    #[inline]
    pub fn resolved_at(&self) -> Option<Millis> {
        self.resolved_at
    }

    /// Mark resolved and schedule the unblock notification `notify_delay`
    /// later on the simulation clock.
    ///
    /// Returns `false` (and schedules nothing) if already resolved.
    pub fn resolve(
        &mut self,
        now: Millis,
        notify_delay: Millis,
        schedule: &mut ScheduledQueue<RailNotification>,
    ) -> bool {
        if self.resolved_at.is_some() {
            return false;
        }
        self.resolved_at = Some(now);
        schedule.schedule(now.saturating_add(notify_delay), RailNotification::Unblock(self.id));
        true
    }
}

/// Append-only lineage history of a rail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationRecord {
    /// The root rail exists from the start
    Initialized,
    /// Branched off `from_index` at `timing`
    Branched {
        /// Parent rail
        from_index: u8,
        /// When the train reached the branch
        timing: Millis,
    },
    /// Merged into `to_index` at `timing`
    Merged {
        /// Rail merged into
        to_index: u8,
        /// When the train reached the merge
        timing: Millis,
    },
}

/// Something that happened on a board during a tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoardEventData {
    /// An event left the queue and now occupies the rail
    EventActivated {
        /// Rail index
        rail: u8,
        /// Activated event
        event_id: EventId,
        /// `branched`, `merged` or `sabotage`
        kind: String,
        /// When the train reaches it
        reached_at: Millis,
    },
    /// The active event's window closed
    EventResolved {
        /// Rail index
        rail: u8,
        /// Resolved event
        event_id: EventId,
    },
    /// The rail accepts its next event again
    RailUnblocked {
        /// Rail index
        rail: u8,
        /// Event that held the rail
        event_id: EventId,
    },
    /// A sabotage was repaired or crashed
    SabotageSettled {
        /// Rail index
        rail: u8,
        /// How it ended
        outcome: SabotageOutcome,
    },
    /// The regeneration button completed
    Regenerated {
        /// Life requested
        heal: u32,
    },
}

/// A board event with timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardEvent {
    /// Simulation time the event happened
    pub at: Millis,
    /// Owner of the board
    pub owner: String,
    /// Event data
    pub data: BoardEventData,
}

impl BoardEvent {
    /// Create a new event.
    pub fn new(at: Millis, owner: impl Into<String>, data: BoardEventData) -> Self {
        Self {
            at,
            owner: owner.into(),
            data,
        }
    }
}
