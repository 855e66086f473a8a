//! Game State
//!
//! Local and opponent boards, the simulation clock and message dispatch.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::core::clock::{BoardClock, Millis};
use crate::core::hash::{StateHash, StateHasher};
use crate::game::board::{Board, RegenConfig};
use crate::game::events::{BoardEvent, CardType};
use crate::game::rail::{RailConfig, RailLayout, TieBreak};
use crate::network::client::Outbox;
use crate::network::protocol::{
    CardEntry, CardEventBody, ClientMessage, InboundMessage, RailIndex, ServerMessage,
};

// =============================================================================
// CONFIG
// =============================================================================

/// Configuration for the client simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameConfig {
    /// Rail timing shared by every board
    pub rail: RailConfig,
    /// Regeneration button on the local board
    pub regen: RegenConfig,
    /// Largest frame delta fed to the simulation
    pub max_frame_delta: Millis,
    /// Frame loop rate
    pub tick_rate: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rail: RailConfig::default(),
            regen: RegenConfig::default(),
            max_frame_delta: 100,
            tick_rate: 60,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl GameConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let layout = RailLayout {
            height: env_parse("RAIL_CLASH_RAIL_HEIGHT").unwrap_or(defaults.rail.layout.height),
            width: env_parse("RAIL_CLASH_RAIL_WIDTH").unwrap_or(defaults.rail.layout.width),
            gap_x: env_parse("RAIL_CLASH_RAIL_GAP").unwrap_or(defaults.rail.layout.gap_x),
        };
        let tie_break = match std::env::var("RAIL_CLASH_TIE_BREAK").as_deref() {
            Ok("crash-first") => TieBreak::CrashFirst,
            Ok("repair-first") => TieBreak::RepairFirst,
            _ => defaults.rail.tie_break,
        };

        Self {
            rail: RailConfig {
                layout,
                train_speed: env_parse("RAIL_CLASH_TRAIN_SPEED")
                    .filter(|speed: &u32| *speed > 0)
                    .unwrap_or(defaults.rail.train_speed),
                notify_delay: env_parse("RAIL_CLASH_NOTIFY_DELAY_MS").unwrap_or(defaults.rail.notify_delay),
                tie_break,
            },
            regen: RegenConfig {
                hold_ms: env_parse("RAIL_CLASH_REGEN_HOLD_MS").unwrap_or(defaults.regen.hold_ms),
                heal: env_parse("RAIL_CLASH_REGEN_HEAL").unwrap_or(defaults.regen.heal),
            },
            max_frame_delta: env_parse("RAIL_CLASH_MAX_FRAME_DELTA_MS").unwrap_or(defaults.max_frame_delta),
            tick_rate: env_parse("RAIL_CLASH_TICK_RATE")
                .filter(|rate: &u32| *rate > 0)
                .unwrap_or(defaults.tick_rate),
        }
    }
}

// =============================================================================
// TICK RESULT
// =============================================================================

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Simulation time after the tick
    pub now: Millis,
    /// Events generated this tick, local board first
    pub events: Vec<BoardEvent>,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Everything the client simulates.
pub struct GameState {
    config: GameConfig,
    clock: BoardClock,
    outbox: Outbox,

    local_id: Option<String>,
    local: Option<Board>,
    opponents: BTreeMap<String, Board>,

    cards: Vec<CardEntry>,
    started: bool,
    game_over_players: Vec<String>,
    last_event_time: Option<i64>,
}

impl GameState {
    /// Create an empty game; boards appear as the server announces players.
    pub fn new(config: GameConfig, outbox: Outbox) -> Self {
        Self {
            config,
            clock: BoardClock::new(config.max_frame_delta),
            outbox,
            local_id: None,
            local: None,
            opponents: BTreeMap::new(),
            cards: Vec::new(),
            started: false,
            game_over_players: Vec::new(),
            last_event_time: None,
        }
    }

    /// Apply one server message.
    pub fn handle_message(&mut self, inbound: InboundMessage) {
        self.last_event_time = Some(inbound.event_time);
        let message = inbound.message;

        match &message {
            ServerMessage::Connected(body) => {
                if self.local_id.is_none() {
                    info!("Connected as {}", body.player_id);
                    self.local_id = Some(body.player_id.clone());
                    self.local = Some(Board::new(
                        body.player_id.as_str(),
                        self.config.rail,
                        self.config.regen,
                        Some(self.outbox.clone()),
                    ));
                } else {
                    debug!("Player {} connected", body.player_id);
                }
            }
            ServerMessage::GameStarted(body) => {
                info!("Game started with {} players", body.players.len());
                self.started = true;
                self.cards = body.cards.clone();
                for player in &body.players {
                    if self.local_id.as_deref() == Some(player.id.as_str()) {
                        if let Some(local) = self.local.as_mut() {
                            local.set_life(player.life);
                        }
                        continue;
                    }
                    let (rail, regen) = (self.config.rail, self.config.regen);
                    self.opponents
                        .entry(player.id.clone())
                        .or_insert_with(|| Board::new(player.id.as_str(), rail, regen, None))
                        .set_life(player.life);
                }
            }
            ServerMessage::GameOverred(body) => {
                if let Some(board) = self.board_mut(&body.player_id) {
                    board.set_game_over();
                }
                if !self.game_over_players.contains(&body.player_id) {
                    self.game_over_players.push(body.player_id.clone());
                }
            }
            ServerMessage::LifeChanged(body) => self.route_to(&body.player_id, &message),
            ServerMessage::RailCreated(body) => self.route_to(&body.target_id, &message),
            ServerMessage::RailMerged(body) => self.route_to(&body.player_id, &message),
            ServerMessage::BlockCreated(body) => self.route_to(&body.target_id, &message),
            ServerMessage::BlockCanceled(body) | ServerMessage::BlockCrashed(body) => {
                self.route_to(&body.target_id, &message)
            }
        }
    }

    fn route_to(&mut self, player_id: &str, message: &ServerMessage) {
        match self.board_mut(player_id) {
            Some(board) => {
                if !board.route(message) {
                    debug!("{} for {} applied to no rail", message.kind(), player_id);
                }
            }
            None => warn!("{} for unknown player {}", message.kind(), player_id),
        }
    }

    fn board_mut(&mut self, player_id: &str) -> Option<&mut Board> {
        if self.local_id.as_deref() == Some(player_id) {
            return self.local.as_mut();
        }
        self.opponents.get_mut(player_id)
    }

    /// Advance the simulation by a frame delta.
    pub fn tick(&mut self, delta: Millis) -> TickResult {
        let clock = self.clock.advance(delta);
        let mut result = TickResult {
            now: clock.now,
            events: Vec::new(),
        };

        for board in self.boards_mut() {
            board.tick(clock);
            result.events.extend(board.take_events());
        }

        result
    }

    fn boards_mut(&mut self) -> impl Iterator<Item = &mut Board> {
        self.local.iter_mut().chain(self.opponents.values_mut())
    }

    // =========================================================================
    // LOCAL INPUT
    // =========================================================================

    /// Repair button pressed on one of our rails.
    pub fn press_start(&mut self, rail: RailIndex) -> bool {
        match self.local.as_mut() {
            Some(board) => board.press_start(rail),
            None => false,
        }
    }

    /// Repair button released.
    pub fn press_end(&mut self, rail: RailIndex) {
        if let Some(board) = self.local.as_mut() {
            board.press_end(rail);
        }
    }

    /// Regeneration button pressed.
    pub fn regen_press_start(&mut self) {
        if let Some(board) = self.local.as_mut() {
            board.regen_press_start();
        }
    }

    /// Regeneration button released.
    pub fn regen_press_end(&mut self) {
        if let Some(board) = self.local.as_mut() {
            board.regen_press_end();
        }
    }

    /// Ask the server to start the match.
    pub fn start_game(&self) {
        self.outbox.send(ClientMessage::GameStartEvent {});
    }

    /// Play a card from the hand against a target.
    ///
    /// Returns `false` if the card is not in hand.
    pub fn send_card(&mut self, card_id: &str, target_id: &str, card_type: CardType) -> bool {
        let Some(position) = self.cards.iter().position(|card| card.id == card_id) else {
            warn!("Card {} is not in hand", card_id);
            return false;
        };
        self.cards.remove(position);
        self.outbox.send(ClientMessage::CardEvent(CardEventBody {
            id: card_id.to_string(),
            target_id: target_id.to_string(),
            kind: card_type,
        }));
        true
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Our player id, once connected.
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    /// Our board, once connected.
    pub fn local_board(&self) -> Option<&Board> {
        self.local.as_ref()
    }

    /// One opponent's board.
    pub fn opponent(&self, player_id: &str) -> Option<&Board> {
        self.opponents.get(player_id)
    }

    /// Opponent boards in player id order.
    pub fn opponents(&self) -> impl Iterator<Item = &Board> {
        self.opponents.values()
    }

    /// Cards in hand.
    pub fn cards(&self) -> &[CardEntry] {
        &self.cards
    }

    /// Whether `gameStarted` arrived.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Players that are out, in the order they went out.
    pub fn game_over_players(&self) -> &[String] {
        &self.game_over_players
    }

    /// Server time of the last message, epoch ms.
    pub fn last_event_time(&self) -> Option<i64> {
        self.last_event_time
    }

    /// Average frame rate over the last second.
    pub fn average_fps(&self) -> Option<f64> {
        self.clock.average_fps()
    }

    /// Hash every board's observable state.
    pub fn compute_hash(&self) -> Result<StateHash, bincode::Error> {
        let mut hasher = StateHasher::for_game_state();
        hasher.update_u64(self.clock.now());
        if let Some(local) = &self.local {
            local.state_hash_into(&mut hasher)?;
        }
        for board in self.opponents.values() {
            board.state_hash_into(&mut hasher)?;
        }
        Ok(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::BoardEventData;
    use crate::game::sabotage::SabotageOutcome;
    use crate::network::protocol::{
        BlockCreatedBody, BlockSettledBody, ConnectedBody, GameOverredBody, GameStartedBody,
        PlayerInfo, RailCreatedBody,
    };
    use tokio::sync::mpsc::UnboundedReceiver;

    fn idx(i: u8) -> RailIndex {
        RailIndex::new(i).unwrap()
    }

    fn inbound(message: ServerMessage) -> InboundMessage {
        InboundMessage::new(1_709_294_400_000, message)
    }

    fn started_game() -> (GameState, UnboundedReceiver<ClientMessage>) {
        let (outbox, rx) = Outbox::channel();
        let mut game = GameState::new(GameConfig::default(), outbox);
        game.handle_message(inbound(ServerMessage::Connected(ConnectedBody {
            player_id: "alice".to_string(),
        })));
        game.handle_message(inbound(ServerMessage::GameStarted(GameStartedBody {
            players: vec![
                PlayerInfo { id: "alice".to_string(), life: 100 },
                PlayerInfo { id: "bob".to_string(), life: 90 },
                PlayerInfo { id: "carol".to_string(), life: 100 },
            ],
            cards: vec![CardEntry { id: "c1".to_string(), kind: "yolo".to_string() }],
        })));
        (game, rx)
    }

    fn block(target: &str, rail: u8) -> ServerMessage {
        ServerMessage::BlockCreated(BlockCreatedBody {
            attacker_id: "bob".to_string(),
            target_id: target.to_string(),
            card_type: CardType::Yolo,
            rail_index: idx(rail),
            delay: 12,
            attack: 10,
        })
    }

    fn drain(rx: &mut UnboundedReceiver<ClientMessage>) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_connected_creates_local_board_once() {
        let (mut game, _rx) = started_game();
        assert_eq!(game.local_id(), Some("alice"));
        assert!(game.local_board().unwrap().is_interactive());

        game.handle_message(inbound(ServerMessage::Connected(ConnectedBody {
            player_id: "dave".to_string(),
        })));
        assert_eq!(game.local_id(), Some("alice"));
    }

    #[test]
    fn test_game_started_creates_opponents() {
        let (game, _rx) = started_game();
        assert!(game.is_started());
        let ids: Vec<&str> = game.opponents().map(|b| b.owner_id()).collect();
        assert_eq!(ids, vec!["bob", "carol"]);
        assert_eq!(game.opponent("bob").unwrap().life(), 90);
        assert!(!game.opponent("bob").unwrap().is_interactive());
        assert_eq!(game.cards().len(), 1);
    }

    #[test]
    fn test_messages_reach_target_board() {
        let (mut game, _rx) = started_game();
        game.handle_message(inbound(ServerMessage::RailCreated(RailCreatedBody {
            new_rail: idx(4),
            parent_rail: idx(3),
            attacker_id: "alice".to_string(),
            target_id: "carol".to_string(),
            card_type: CardType::PullShark,
        })));
        assert_eq!(game.opponent("carol").unwrap().rail(idx(4)).queue_len(), 1);
        assert_eq!(game.opponent("bob").unwrap().rail(idx(4)).queue_len(), 0);
        assert_eq!(game.local_board().unwrap().rail(idx(4)).queue_len(), 0);
    }

    #[test]
    fn test_local_repair_reports_canceled() {
        let (mut game, mut rx) = started_game();
        game.handle_message(inbound(block("alice", 2)));
        game.tick(16);
        assert!(game.press_start(idx(2)));

        let mut settled = Vec::new();
        for _ in 0..200 {
            for event in game.tick(16).events {
                if let BoardEventData::SabotageSettled { rail, outcome } = event.data {
                    settled.push((rail, outcome));
                }
            }
        }
        assert_eq!(settled, vec![(2, SabotageOutcome::Repaired)]);
        assert_eq!(
            drain(&mut rx),
            vec![ClientMessage::block_event(
                crate::network::protocol::BlockEventKind::Canceled,
                Some(CardType::Yolo),
                idx(2),
            )]
        );
    }

    #[test]
    fn test_opponent_sabotage_settled_by_server() {
        let (mut game, mut rx) = started_game();
        game.handle_message(inbound(block("bob", 0)));
        game.tick(16);
        assert!(game.opponent("bob").unwrap().rail(idx(0)).is_blocking());

        game.handle_message(inbound(ServerMessage::BlockCanceled(BlockSettledBody {
            target_id: "bob".to_string(),
            rail: idx(0),
            card_type: Some(CardType::Yolo),
        })));
        for _ in 0..20 {
            game.tick(100);
        }
        assert!(!game.opponent("bob").unwrap().rail(idx(0)).is_blocking());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_game_overred_marks_board() {
        let (mut game, _rx) = started_game();
        game.handle_message(inbound(ServerMessage::GameOverred(GameOverredBody {
            player_id: "carol".to_string(),
        })));
        game.handle_message(inbound(ServerMessage::GameOverred(GameOverredBody {
            player_id: "carol".to_string(),
        })));
        assert!(game.opponent("carol").unwrap().is_game_over());
        assert_eq!(game.game_over_players(), &["carol".to_string()]);
    }

    #[test]
    fn test_send_card_and_start() {
        let (mut game, mut rx) = started_game();
        game.start_game();
        assert!(game.send_card("c1", "bob", CardType::Yolo));
        assert!(!game.send_card("c1", "bob", CardType::Yolo));
        assert!(game.cards().is_empty());

        let sent = drain(&mut rx);
        assert_eq!(sent[0], ClientMessage::GameStartEvent {});
        assert_eq!(
            sent[1],
            ClientMessage::CardEvent(CardEventBody {
                id: "c1".to_string(),
                target_id: "bob".to_string(),
                kind: CardType::Yolo,
            })
        );
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn test_tick_clamps_delta() {
        let (mut game, _rx) = started_game();
        assert_eq!(game.tick(16).now, 16);
        assert_eq!(game.tick(5_000).now, 116);
    }

    #[test]
    fn test_hash_deterministic() {
        let run = || {
            let (mut game, _rx) = started_game();
            game.handle_message(inbound(block("bob", 1)));
            game.handle_message(inbound(block("alice", 5)));
            game.press_start(idx(5));
            for _ in 0..300 {
                game.tick(16);
            }
            game.compute_hash().unwrap()
        };
        assert_eq!(run(), run());

        let (game, _rx) = started_game();
        assert_ne!(game.compute_hash().unwrap(), run());
    }
}
