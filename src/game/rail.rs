//! Rail Resolver
//!
//! Per-rail state machine. Routed events queue up in arrival order and
//! become active one at a time; each active event holds the rail until
//! its timing window closes (branch/merge) or its sabotage settles.
//!
//! ## Tick order
//!
//! 1. Deliver due unblock notifications
//! 2. Resolve the active event if its window closed
//! 3. Sabotage race (repair progress vs crash deadline, per `TieBreak`)
//! 4. If still blocking, stop
//! 5. Pop and activate the next queued event

use tracing::{debug, info, trace};

use crate::core::clock::{ClockTick, Millis};
use crate::core::hash::StateHasher;
use crate::core::queue::OrderedQueue;
use crate::core::schedule::ScheduledQueue;
use crate::game::events::{
    BoardEvent, BoardEventData, CardInfo, EventId, EventLog, RailEvent, RailNotification,
    RelationRecord, ROOT_RAIL,
};
use crate::game::sabotage::{Difficulty, SabotageOutcome, SabotageState};
use crate::network::client::Outbox;
use crate::network::protocol::{BlockEventKind, ClientMessage, RailIndex, ServerMessage};

/// Rail geometry in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RailLayout {
    /// Visible rail length (train travel per scroll)
    pub height: u32,
    /// Rail width
    pub width: u32,
    /// Gap between neighbouring rails
    pub gap_x: u32,
}

impl Default for RailLayout {
    fn default() -> Self {
        Self {
            height: 800,
            width: 36,
            gap_x: 36,
        }
    }
}

/// Which side of the sabotage race is checked first when both land
/// in the same tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Repair progress is applied before the crash deadline is checked.
    #[default]
    RepairFirst,
    /// The crash deadline is checked before repair progress is applied.
    CrashFirst,
}

/// Timing parameters shared by every rail of a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RailConfig {
    /// Rail geometry
    pub layout: RailLayout,
    /// Train speed in px/s
    pub train_speed: u32,
    /// Delay between an event resolving and the rail accepting the next one
    pub notify_delay: Millis,
    /// Same-tick repair/crash policy
    pub tie_break: TieBreak,
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            layout: RailLayout::default(),
            train_speed: 40,
            notify_delay: 1000,
            tie_break: TieBreak::RepairFirst,
        }
    }
}

impl RailConfig {
    /// Time for the train to cover `px` pixels.
    ///
    /// Speed is treated as at least 1 px/s.
    #[inline]
    pub fn travel_ms(&self, px: u64) -> Millis {
        px * 1000 / self.train_speed.max(1) as u64
    }

    /// Time for the train to traverse the whole rail once.
    #[inline]
    pub fn scroll_ms(&self) -> Millis {
        self.travel_ms(self.layout.height as u64)
    }

    /// Time for the train to move sideways between two rails.
    pub fn lateral_ms(&self, from: u8, to: u8) -> Millis {
        let pitch = (self.layout.gap_x + self.layout.width) as u64;
        self.travel_ms(pitch * from.abs_diff(to) as u64)
    }

    /// When an event arriving at `now` reaches the train, aligned down to
    /// the scroll grid.
    pub fn reached_timing(&self, now: Millis) -> Millis {
        let scroll = self.scroll_ms().max(1);
        let reached = now + scroll;
        reached / scroll * scroll
    }
}

/// The event currently holding the rail.
#[derive(Clone, Debug)]
pub struct ActiveEvent {
    /// The event and its resolution guard
    pub log: EventLog,
    /// Window end for branch/merge; `None` for sabotage
    pub resolve_timing: Option<Millis>,
}

/// One rail of a board.
pub struct Rail {
    owner_id: String,
    index: RailIndex,
    config: RailConfig,
    outbox: Option<Outbox>,

    relation_log: Vec<RelationRecord>,
    sabotage: Option<SabotageState>,
    event_queue: OrderedQueue<EventLog>,

    blocking: Option<EventId>,
    active: Option<ActiveEvent>,
    crash_timing: Option<Millis>,
    schedule: ScheduledQueue<RailNotification>,
    /// Local settlements the server has not confirmed yet
    unconfirmed: u32,

    next_event_id: EventId,
    last_now: Millis,
    events: Vec<BoardEvent>,
}

impl Rail {
    /// Create a rail.
    ///
    /// Rails given an outbox are interactive: their owner repairs
    /// sabotages locally and the outcome is reported to the server.
    pub fn new(owner_id: impl Into<String>, index: RailIndex, config: RailConfig, outbox: Option<Outbox>) -> Self {
        let relation_log = if index.get() == ROOT_RAIL {
            vec![RelationRecord::Initialized]
        } else {
            Vec::new()
        };

        Self {
            owner_id: owner_id.into(),
            index,
            config,
            outbox,
            relation_log,
            sabotage: None,
            event_queue: OrderedQueue::new(),
            blocking: None,
            active: None,
            crash_timing: None,
            schedule: ScheduledQueue::new(),
            unconfirmed: 0,
            next_event_id: 0,
            last_now: 0,
            events: Vec::new(),
        }
    }

    // =========================================================================
    // ROUTING
    // =========================================================================

    /// Offer a server message to this rail.
    ///
    /// Only messages whose target player and rail index both match are
    /// accepted; everything else is dropped silently. Returns whether the
    /// message applied to this rail.
    pub fn route(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::RailCreated(body) => {
                if !self.targets(&body.target_id, body.new_rail) {
                    return false;
                }
                self.enqueue(RailEvent::Branched {
                    from_index: body.parent_rail.get(),
                    card_info: CardInfo {
                        attacker_name: body.attacker_id.clone(),
                        card_type: body.card_type,
                    },
                });
                true
            }
            ServerMessage::RailMerged(body) => {
                if !self.targets(&body.player_id, body.child_rail) {
                    return false;
                }
                self.enqueue(RailEvent::Merged {
                    to_index: body.parent_rail.get(),
                    card_info: CardInfo {
                        attacker_name: body.player_id.clone(),
                        card_type: body.card_type,
                    },
                });
                true
            }
            ServerMessage::BlockCreated(body) => {
                if !self.targets(&body.target_id, body.rail_index) {
                    return false;
                }
                self.enqueue(RailEvent::Sabotage {
                    attack: body.attack,
                    delay: body.delay,
                    difficulty: Difficulty::from_delay_secs(body.delay),
                    card_info: CardInfo {
                        attacker_name: body.attacker_id.clone(),
                        card_type: body.card_type,
                    },
                });
                true
            }
            ServerMessage::BlockCanceled(body) => {
                if !self.targets(&body.target_id, body.rail) {
                    return false;
                }
                self.confirm_sabotage(SabotageOutcome::Repaired);
                true
            }
            ServerMessage::BlockCrashed(body) => {
                if !self.targets(&body.target_id, body.rail) {
                    return false;
                }
                self.confirm_sabotage(SabotageOutcome::Crashed);
                true
            }
            ServerMessage::Connected(_)
            | ServerMessage::GameStarted(_)
            | ServerMessage::LifeChanged(_)
            | ServerMessage::GameOverred(_) => false,
        }
    }

    fn targets(&self, player_id: &str, index: RailIndex) -> bool {
        let hit = player_id == self.owner_id && index == self.index;
        if !hit {
            trace!(
                "Rail {}/{} ignoring event for {}/{}",
                self.owner_id,
                self.index.get(),
                player_id,
                index.get()
            );
        }
        hit
    }

    /// Queue an event behind any already pending.
    pub fn enqueue(&mut self, event: RailEvent) -> EventId {
        let id = self.next_event_id;
        self.next_event_id += 1;
        debug!(
            "Rail {}/{} queued {} #{} ({} pending)",
            self.owner_id,
            self.index.get(),
            event.kind(),
            id,
            self.event_queue.len() + 1
        );
        self.event_queue.push_back(EventLog::new(id, event));
        id
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advance the rail to `clock.now`.
    pub fn tick(&mut self, clock: ClockTick) {
        let now = clock.now;
        self.last_now = now;

        // 1. Deferred unblocks
        for notification in self.schedule.drain_due(now) {
            match notification {
                RailNotification::Unblock(id) => {
                    if self.blocking == Some(id) {
                        self.blocking = None;
                        self.push_event(now, BoardEventData::RailUnblocked {
                            rail: self.index.get(),
                            event_id: id,
                        });
                    }
                }
            }
        }

        // 2. Branch/merge window closed
        let window_closed = matches!(
            &self.active,
            Some(ActiveEvent { resolve_timing: Some(at), .. }) if *at <= now
        );
        if window_closed {
            self.resolve_active(now);
        }

        // 3. Sabotage race
        match self.config.tie_break {
            TieBreak::RepairFirst => {
                self.advance_repair(clock.delta, now);
                self.check_crash(now);
            }
            TieBreak::CrashFirst => {
                self.check_crash(now);
                self.advance_repair(clock.delta, now);
            }
        }

        // 4. One active event at a time
        if self.blocking.is_some() {
            return;
        }

        // 5. Next event
        if let Some(log) = self.event_queue.pop_front() {
            self.activate(log, now);
        }
    }

    fn advance_repair(&mut self, delta: Millis, now: Millis) {
        let outcome = match self.sabotage.as_mut() {
            Some(sabotage) => sabotage.tick(delta),
            None => None,
        };
        if let Some(outcome) = outcome {
            self.on_sabotage_settled(outcome, now);
            self.unconfirmed += 1;
        }
    }

    fn check_crash(&mut self, now: Millis) {
        let Some(at) = self.crash_timing else {
            return;
        };
        if at > now {
            return;
        }
        self.crash_timing = None;
        let outcome = match self.sabotage.as_mut() {
            Some(sabotage) => sabotage.trigger_crash(),
            None => None,
        };
        if let Some(outcome) = outcome {
            self.on_sabotage_settled(outcome, now);
            self.unconfirmed += 1;
        }
    }

    /// Server-side settlement. Never reports back to the server.
    ///
    /// Confirmations carry no sabotage identity and arrive in settlement
    /// order, so each one first pays off a sabotage that already settled
    /// locally; only the rest settle the current sabotage.
    fn confirm_sabotage(&mut self, outcome: SabotageOutcome) {
        if self.unconfirmed > 0 {
            self.unconfirmed -= 1;
            trace!(
                "Rail {}/{} server confirmed an earlier {:?}",
                self.owner_id,
                self.index.get(),
                outcome
            );
            return;
        }
        let settled = match self.sabotage.as_mut() {
            Some(sabotage) => sabotage.confirm(outcome),
            None => None,
        };
        if let Some(outcome) = settled {
            self.on_sabotage_settled(outcome, self.last_now);
        }
    }

    fn on_sabotage_settled(&mut self, outcome: SabotageOutcome, now: Millis) {
        info!(
            "Rail {}/{} sabotage {:?} at {}",
            self.owner_id,
            self.index.get(),
            outcome,
            now
        );
        self.crash_timing = None;
        self.push_event(now, BoardEventData::SabotageSettled {
            rail: self.index.get(),
            outcome,
        });
        self.resolve_active(now);
    }

    fn resolve_active(&mut self, now: Millis) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if active.log.resolve(now, self.config.notify_delay, &mut self.schedule) {
            self.push_event(now, BoardEventData::EventResolved {
                rail: self.index.get(),
                event_id: active.log.id(),
            });
        }
    }

    fn activate(&mut self, log: EventLog, now: Millis) {
        assert!(
            self.blocking.is_none(),
            "rail {}/{} activated event #{} while #{:?} still blocks",
            self.owner_id,
            self.index.get(),
            log.id(),
            self.blocking
        );

        self.sabotage = None;
        self.crash_timing = None;
        self.blocking = Some(log.id());

        let reached = self.config.reached_timing(now);
        let resolve_timing = match log.event() {
            RailEvent::Branched { from_index, .. } => {
                self.relation_log.push(RelationRecord::Branched {
                    from_index: *from_index,
                    timing: reached,
                });
                Some(reached + self.config.lateral_ms(self.index.get(), *from_index))
            }
            RailEvent::Merged { to_index, .. } => {
                self.relation_log.push(RelationRecord::Merged {
                    to_index: *to_index,
                    timing: reached,
                });
                Some(reached + self.config.lateral_ms(self.index.get(), *to_index))
            }
            RailEvent::Sabotage {
                attack,
                delay,
                difficulty,
                card_info,
            } => {
                let mut sabotage = SabotageState::new(reached, *attack, *difficulty, card_info.clone());
                if let Some(outbox) = &self.outbox {
                    self.wire_outcomes(&mut sabotage, outbox.clone());
                }
                self.sabotage = Some(sabotage);
                self.crash_timing = Some(reached + *delay as Millis * 1000);
                None
            }
        };

        debug!(
            "Rail {}/{} activated {} #{} at {} (reached {}, resolves {:?})",
            self.owner_id,
            self.index.get(),
            log.event().kind(),
            log.id(),
            now,
            reached,
            resolve_timing
        );
        self.push_event(now, BoardEventData::EventActivated {
            rail: self.index.get(),
            event_id: log.id(),
            kind: log.event().kind().to_string(),
            reached_at: reached,
        });
        self.active = Some(ActiveEvent { log, resolve_timing });
    }

    fn wire_outcomes(&self, sabotage: &mut SabotageState, outbox: Outbox) {
        let index = self.index;
        let card_type = Some(sabotage.card_info().card_type);

        let repaired_outbox = outbox.clone();
        sabotage.set_repaired_handler(Box::new(move || {
            repaired_outbox.send(ClientMessage::block_event(BlockEventKind::Canceled, card_type, index));
        }));
        sabotage.set_crashed_handler(Box::new(move || {
            outbox.send(ClientMessage::block_event(BlockEventKind::Crashed, card_type, index));
        }));
    }

    fn push_event(&mut self, at: Millis, data: BoardEventData) {
        self.events.push(BoardEvent::new(at, self.owner_id.as_str(), data));
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Repair button pressed. Returns `false` if there is nothing to repair.
    pub fn press_start(&mut self) -> bool {
        match self.sabotage.as_mut() {
            Some(sabotage) if sabotage.outcome().is_none() => {
                sabotage.on_press_start();
                true
            }
            _ => false,
        }
    }

    /// Repair button released.
    pub fn press_end(&mut self) {
        if let Some(sabotage) = self.sabotage.as_mut() {
            sabotage.on_press_end();
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Drain events produced since the last call.
    pub fn take_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Board owner.
    #[inline]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Position on the board.
    #[inline]
    pub fn index(&self) -> RailIndex {
        self.index
    }

    /// Whether sabotage outcomes are reported to the server.
    #[inline]
    pub fn is_interactive(&self) -> bool {
        self.outbox.is_some()
    }

    /// Lineage history.
    pub fn relation_log(&self) -> &[RelationRecord] {
        &self.relation_log
    }

    /// Current obstruction, settled or not.
    pub fn sabotage(&self) -> Option<&SabotageState> {
        self.sabotage.as_ref()
    }

    /// Whether an event holds the rail.
    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.blocking.is_some()
    }

    /// The event currently holding the rail, until it resolves.
    pub fn active_event(&self) -> Option<&ActiveEvent> {
        self.active.as_ref()
    }

    /// Armed crash deadline.
    #[inline]
    pub fn crash_timing(&self) -> Option<Millis> {
        self.crash_timing
    }

    /// Number of events waiting to start.
    #[inline]
    pub fn queue_len(&self) -> usize {
        self.event_queue.len()
    }

    /// Compact encoding of the relation log.
    pub fn relation_snapshot(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(&self.relation_log)
    }

    /// Feed this rail's observable state into a hasher.
    pub fn hash_into(&self, hasher: &mut StateHasher) -> Result<(), bincode::Error> {
        hasher.update_u8(self.index.get());
        hasher.update_bytes(&self.relation_snapshot()?);
        hasher.update_bool(self.blocking.is_some());
        hasher.update_u32(self.event_queue.len() as u32);
        for log in self.event_queue.iter() {
            let tag = match log.event() {
                RailEvent::Branched { .. } => 0,
                RailEvent::Merged { .. } => 1,
                RailEvent::Sabotage { .. } => 2,
            };
            hasher.update_u8(tag);
            hasher.update_u8(log.event().card_info().card_type.as_u8());
        }
        if let Some(sabotage) = &self.sabotage {
            hasher.update_u8(sabotage.card_info().card_type.as_u8());
        }
        let outcome = match self.sabotage.as_ref().and_then(SabotageState::outcome) {
            None => 0,
            Some(SabotageOutcome::Repaired) => 1,
            Some(SabotageOutcome::Crashed) => 2,
        };
        hasher.update_u8(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::CardType;
    use crate::network::protocol::{
        BlockCreatedBody, BlockSettledBody, RailCreatedBody, RailMergedBody,
    };
    use tokio::sync::mpsc::UnboundedReceiver;

    fn idx(i: u8) -> RailIndex {
        RailIndex::new(i).unwrap()
    }

    fn at(now: Millis, delta: Millis) -> ClockTick {
        ClockTick { now, delta }
    }

    fn rail_created(target: &str, new_rail: u8, parent: u8) -> ServerMessage {
        ServerMessage::RailCreated(RailCreatedBody {
            new_rail: idx(new_rail),
            parent_rail: idx(parent),
            attacker_id: "bob".to_string(),
            target_id: target.to_string(),
            card_type: CardType::OpenSourcerer,
        })
    }

    fn rail_merged(player: &str, child: u8, parent: u8) -> ServerMessage {
        ServerMessage::RailMerged(RailMergedBody {
            child_rail: idx(child),
            parent_rail: idx(parent),
            player_id: player.to_string(),
            card_type: CardType::Refactoring,
        })
    }

    fn block_created(target: &str, rail: u8, delay: u32, attack: u32) -> ServerMessage {
        ServerMessage::BlockCreated(BlockCreatedBody {
            attacker_id: "bob".to_string(),
            target_id: target.to_string(),
            card_type: CardType::Yolo,
            rail_index: idx(rail),
            delay,
            attack,
        })
    }

    fn interactive_rail(index: u8, config: RailConfig) -> (Rail, UnboundedReceiver<ClientMessage>) {
        let (outbox, rx) = Outbox::channel();
        (Rail::new("alice", idx(index), config, Some(outbox)), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ClientMessage>) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_timing_math() {
        let config = RailConfig::default();
        assert_eq!(config.scroll_ms(), 20_000);
        assert_eq!(config.lateral_ms(0, 3), 5_400);
        assert_eq!(config.lateral_ms(6, 5), 1_800);
        assert_eq!(config.reached_timing(0), 20_000);
        assert_eq!(config.reached_timing(5_000), 20_000);
        assert_eq!(config.reached_timing(19_999), 20_000);
        assert_eq!(config.reached_timing(20_000), 40_000);
    }

    #[test]
    fn test_root_rail_initialized() {
        let root = Rail::new("alice", idx(ROOT_RAIL), RailConfig::default(), None);
        assert_eq!(root.relation_log(), &[RelationRecord::Initialized]);
        let other = Rail::new("alice", idx(0), RailConfig::default(), None);
        assert!(other.relation_log().is_empty());
    }

    #[test]
    fn test_branch_window() {
        let mut rail = Rail::new("alice", idx(0), RailConfig::default(), None);
        assert!(rail.route(&rail_created("alice", 0, 3)));
        assert_eq!(rail.queue_len(), 1);

        rail.tick(at(0, 0));
        assert!(rail.is_blocking());
        assert_eq!(rail.queue_len(), 0);
        assert_eq!(rail.active_event().unwrap().resolve_timing, Some(25_400));
        assert_eq!(
            rail.relation_log(),
            &[RelationRecord::Branched { from_index: 3, timing: 20_000 }]
        );

        rail.tick(at(25_399, 16));
        assert!(rail.active_event().is_some());

        rail.tick(at(25_400, 1));
        assert!(rail.active_event().is_none());
        let log_len = rail.relation_log().len();
        assert_eq!(log_len, 1);

        // Unblocks one notify delay later
        rail.tick(at(26_399, 16));
        assert!(rail.is_blocking());
        rail.tick(at(26_400, 1));
        assert!(!rail.is_blocking());

        let kinds: Vec<BoardEventData> = rail.take_events().into_iter().map(|e| e.data).collect();
        assert!(matches!(kinds[0], BoardEventData::EventActivated { event_id: 0, .. }));
        assert_eq!(kinds[1], BoardEventData::EventResolved { rail: 0, event_id: 0 });
        assert_eq!(kinds[2], BoardEventData::RailUnblocked { rail: 0, event_id: 0 });
    }

    #[test]
    fn test_merge_window_uses_peer() {
        let mut rail = Rail::new("alice", idx(5), RailConfig::default(), None);
        assert!(rail.route(&rail_merged("alice", 5, 3)));
        rail.tick(at(1_000, 16));
        assert_eq!(rail.active_event().unwrap().resolve_timing, Some(20_000 + 3_600));
        assert_eq!(
            rail.relation_log(),
            &[RelationRecord::Merged { to_index: 3, timing: 20_000 }]
        );
    }

    #[test]
    fn test_misrouted_events_dropped() {
        let mut rail = Rail::new("alice", idx(0), RailConfig::default(), None);
        assert!(!rail.route(&rail_created("carol", 0, 3)));
        assert!(!rail.route(&rail_created("alice", 1, 3)));
        assert!(!rail.route(&rail_merged("carol", 0, 3)));
        assert!(!rail.route(&block_created("alice", 2, 12, 10)));
        assert_eq!(rail.queue_len(), 0);
    }

    #[test]
    fn test_fifo_one_active_at_a_time() {
        let mut rail = Rail::new("alice", idx(2), RailConfig::default(), None);
        rail.route(&rail_created("alice", 2, 3));
        rail.route(&rail_merged("alice", 2, 1));
        rail.route(&rail_created("alice", 2, 0));
        assert_eq!(rail.queue_len(), 3);

        let mut activated = Vec::new();
        let mut since_unblock = 0;
        let mut now = 0;
        while now <= 200_000 {
            rail.tick(at(now, 100));
            for event in rail.take_events() {
                match event.data {
                    BoardEventData::EventActivated { event_id, .. } => {
                        since_unblock += 1;
                        assert_eq!(since_unblock, 1, "second activation before unblock at {}", now);
                        activated.push(event_id);
                    }
                    BoardEventData::RailUnblocked { .. } => since_unblock = 0,
                    _ => {}
                }
            }
            if rail.active_event().is_some() {
                assert!(rail.is_blocking());
            }
            now += 100;
        }

        assert_eq!(activated, vec![0, 1, 2]);
        let peers: Vec<u8> = rail
            .relation_log()
            .iter()
            .map(|r| match r {
                RelationRecord::Branched { from_index, .. } => *from_index,
                RelationRecord::Merged { to_index, .. } => *to_index,
                RelationRecord::Initialized => u8::MAX,
            })
            .collect();
        assert_eq!(peers, vec![3, 1, 0]);
        assert!(!rail.is_blocking());
    }

    #[test]
    fn test_sabotage_repaired_before_deadline() {
        let (mut rail, mut rx) = interactive_rail(1, RailConfig::default());
        rail.route(&block_created("alice", 1, 12, 10));

        rail.tick(at(5_000, 16));
        assert_eq!(rail.crash_timing(), Some(32_000));
        let sabotage = rail.sabotage().unwrap();
        assert_eq!(sabotage.difficulty(), Difficulty::Normal);
        assert_eq!(sabotage.timing(), 20_000);
        assert_eq!(sabotage.attack(), 10);
        assert!(rail.active_event().unwrap().resolve_timing.is_none());

        assert!(rail.press_start());
        let mut now = 5_000;
        while now < 8_000 {
            now += 16;
            rail.tick(at(now, 16));
        }
        assert_eq!(rail.sabotage().unwrap().outcome(), Some(SabotageOutcome::Repaired));

        // Deadline passes without a second outcome
        while now < 40_000 {
            now += 16;
            rail.tick(at(now, 16));
        }
        assert_eq!(
            drain(&mut rx),
            vec![ClientMessage::block_event(BlockEventKind::Canceled, Some(CardType::Yolo), idx(1))]
        );
        assert!(!rail.is_blocking());
    }

    #[test]
    fn test_sabotage_crashes_without_repair() {
        let (mut rail, mut rx) = interactive_rail(1, RailConfig::default());
        rail.route(&block_created("alice", 1, 12, 10));

        let mut now = 5_000;
        rail.tick(at(now, 16));
        while now < 31_984 {
            now += 16;
            rail.tick(at(now, 16));
        }
        assert!(drain(&mut rx).is_empty());

        rail.tick(at(32_000, 16));
        assert_eq!(rail.sabotage().unwrap().outcome(), Some(SabotageOutcome::Crashed));

        // Late repair is ignored
        rail.press_start();
        for _ in 0..300 {
            now += 16;
            rail.tick(at(now, 16));
        }
        assert_eq!(
            drain(&mut rx),
            vec![ClientMessage::block_event(BlockEventKind::Crashed, Some(CardType::Yolo), idx(1))]
        );
    }

    fn same_tick_race(tie_break: TieBreak) -> (SabotageOutcome, Vec<ClientMessage>) {
        let config = RailConfig {
            tie_break,
            ..RailConfig::default()
        };
        let (mut rail, mut rx) = interactive_rail(4, config);
        // delay 4s -> 1000ms repair, crash at 24_000
        rail.route(&block_created("alice", 4, 4, 3));
        rail.tick(at(0, 0));
        assert_eq!(rail.crash_timing(), Some(24_000));

        rail.press_start();
        rail.tick(at(23_000, 1_000));
        assert!(rail.sabotage().unwrap().outcome().is_none());

        // Repair crosses 1000ms and the deadline hits in the same tick
        rail.tick(at(24_000, 1_000));
        (rail.sabotage().unwrap().outcome().unwrap(), drain(&mut rx))
    }

    #[test]
    fn test_tie_break_repair_first() {
        let (outcome, sent) = same_tick_race(TieBreak::RepairFirst);
        assert_eq!(outcome, SabotageOutcome::Repaired);
        assert_eq!(
            sent,
            vec![ClientMessage::block_event(BlockEventKind::Canceled, Some(CardType::Yolo), idx(4))]
        );
    }

    #[test]
    fn test_tie_break_crash_first() {
        let (outcome, sent) = same_tick_race(TieBreak::CrashFirst);
        assert_eq!(outcome, SabotageOutcome::Crashed);
        assert_eq!(
            sent,
            vec![ClientMessage::block_event(BlockEventKind::Crashed, Some(CardType::Yolo), idx(4))]
        );
    }

    #[test]
    fn test_server_confirmation_unblocks_opponent_rail() {
        let mut rail = Rail::new("bob", idx(6), RailConfig::default(), None);
        assert!(!rail.is_interactive());
        rail.route(&block_created("bob", 6, 20, 30));
        rail.tick(at(100, 16));
        assert!(rail.is_blocking());

        let canceled = ServerMessage::BlockCanceled(BlockSettledBody {
            target_id: "bob".to_string(),
            rail: idx(6),
            card_type: Some(CardType::Yolo),
        });
        assert!(rail.route(&canceled));
        assert_eq!(rail.sabotage().unwrap().outcome(), Some(SabotageOutcome::Repaired));
        assert!(rail.active_event().is_none());
        assert_eq!(rail.crash_timing(), None);

        rail.tick(at(1_100, 16));
        assert!(!rail.is_blocking());
    }

    #[test]
    fn test_late_confirmation_spares_next_sabotage() {
        let mut rail = Rail::new("bob", idx(3), RailConfig::default(), None);
        rail.route(&block_created("bob", 3, 4, 5));
        rail.route(&block_created("bob", 3, 4, 5));

        rail.tick(at(0, 0));
        rail.tick(at(24_000, 16)); // first crashes on its own deadline
        rail.tick(at(25_000, 16)); // second activates
        assert_eq!(rail.active_event().unwrap().log.id(), 1);
        assert_eq!(rail.crash_timing(), Some(44_000));

        let crashed = ServerMessage::BlockCrashed(BlockSettledBody {
            target_id: "bob".to_string(),
            rail: idx(3),
            card_type: Some(CardType::Yolo),
        });

        // Belongs to the first sabotage
        assert!(rail.route(&crashed));
        assert!(rail.sabotage().unwrap().outcome().is_none());
        assert_eq!(rail.crash_timing(), Some(44_000));
        assert!(rail.active_event().is_some());

        // Settles the second
        assert!(rail.route(&crashed));
        assert_eq!(rail.sabotage().unwrap().outcome(), Some(SabotageOutcome::Crashed));
        assert_eq!(rail.crash_timing(), None);
    }

    #[test]
    fn test_queued_card_types_change_hash() {
        let hash = |card_type: CardType| {
            let mut rail = Rail::new("bob", idx(1), RailConfig::default(), None);
            rail.route(&ServerMessage::RailCreated(RailCreatedBody {
                new_rail: idx(1),
                parent_rail: idx(3),
                attacker_id: "alice".to_string(),
                target_id: "bob".to_string(),
                card_type,
            }));
            let mut hasher = StateHasher::for_game_state();
            rail.hash_into(&mut hasher).unwrap();
            hasher.finalize()
        };
        assert_eq!(hash(CardType::Lgtm), hash(CardType::Lgtm));
        assert_ne!(hash(CardType::Lgtm), hash(CardType::PullShark));
    }

    #[test]
    fn test_server_confirmation_does_not_echo() {
        let (mut rail, mut rx) = interactive_rail(0, RailConfig::default());
        rail.route(&block_created("alice", 0, 12, 10));
        rail.tick(at(0, 0));

        let crashed = ServerMessage::BlockCrashed(BlockSettledBody {
            target_id: "alice".to_string(),
            rail: idx(0),
            card_type: None,
        });
        rail.route(&crashed);
        assert_eq!(rail.sabotage().unwrap().outcome(), Some(SabotageOutcome::Crashed));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_next_event_replaces_settled_sabotage() {
        let mut rail = Rail::new("alice", idx(0), RailConfig::default(), None);
        rail.route(&block_created("alice", 0, 4, 1));
        rail.route(&rail_created("alice", 0, 1));

        rail.tick(at(0, 0));
        assert!(rail.sabotage().is_some());
        assert_eq!(rail.queue_len(), 1);

        rail.tick(at(24_000, 16)); // crash
        rail.tick(at(25_000, 16)); // unblock + activate branch
        assert!(rail.sabotage().is_none());
        assert!(matches!(
            rail.active_event().unwrap().log.event(),
            RailEvent::Branched { from_index: 1, .. }
        ));
    }

    #[test]
    #[should_panic(expected = "still blocks")]
    fn test_activate_while_blocking_panics() {
        let mut rail = Rail::new("alice", idx(0), RailConfig::default(), None);
        rail.route(&rail_created("alice", 0, 3));
        rail.tick(at(0, 0));
        let extra = EventLog::new(99, rail.active_event().unwrap().log.event().clone());
        rail.activate(extra, 1);
    }

    #[test]
    fn test_relation_snapshot_roundtrip() {
        let mut rail = Rail::new("alice", idx(3), RailConfig::default(), None);
        rail.route(&rail_created("alice", 3, 2));
        rail.tick(at(0, 0));
        let bytes = rail.relation_snapshot().unwrap();
        let decoded: Vec<RelationRecord> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, rail.relation_log());
    }
}
