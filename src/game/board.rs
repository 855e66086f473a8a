//! Player Board
//!
//! Seven rails, a life total and (on the local board) the regeneration
//! button. Messages fan out to every rail; each rail keeps only its own.

use tracing::{debug, info};

use crate::core::clock::{ClockTick, Millis};
use crate::core::hash::StateHasher;
use crate::game::events::{BoardEvent, BoardEventData, RAIL_COUNT};
use crate::game::press::PressProgress;
use crate::game::rail::{Rail, RailConfig};
use crate::network::client::Outbox;
use crate::network::protocol::{ClientMessage, LifeEventKind, RailIndex, ServerMessage, MAX_LIFE};

/// Regeneration button settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegenConfig {
    /// Hold time for one heal
    pub hold_ms: Millis,
    /// Life restored per completed hold
    pub heal: u32,
}

impl Default for RegenConfig {
    fn default() -> Self {
        Self {
            hold_ms: 1000,
            heal: 5,
        }
    }
}

/// One player's board.
pub struct Board {
    owner_id: String,
    rails: Vec<Rail>,
    life: u32,
    max_life: u32,
    regen: Option<PressProgress>,
    regen_heal: u32,
    outbox: Option<Outbox>,
    game_over: bool,
    events: Vec<BoardEvent>,
}

impl Board {
    /// Create a board.
    ///
    /// With an outbox the board is the local player's: its rails report
    /// sabotage outcomes and it carries the regeneration button.
    pub fn new(owner_id: impl Into<String>, rail_config: RailConfig, regen: RegenConfig, outbox: Option<Outbox>) -> Self {
        let owner_id = owner_id.into();
        let rails = (0..RAIL_COUNT as u8)
            .filter_map(|i| RailIndex::new(i).ok())
            .map(|index| Rail::new(owner_id.as_str(), index, rail_config, outbox.clone()))
            .collect();

        let regen_button = outbox.as_ref().map(|_| {
            let mut button = PressProgress::new(Some(regen.hold_ms));
            button.set_pressed_handler(Box::new(|button: &mut PressProgress| button.reset()));
            button
        });

        Self {
            owner_id,
            rails,
            life: MAX_LIFE,
            max_life: MAX_LIFE,
            regen: regen_button,
            regen_heal: regen.heal,
            outbox,
            game_over: false,
            events: Vec::new(),
        }
    }

    /// Offer a server message to the board. Returns whether anything applied.
    pub fn route(&mut self, message: &ServerMessage) -> bool {
        if let ServerMessage::LifeChanged(body) = message {
            if body.player_id != self.owner_id {
                return false;
            }
            debug!("{} life {} -> {}", self.owner_id, self.life, body.new_life);
            self.life = body.new_life.min(self.max_life);
            return true;
        }

        let mut applied = false;
        for rail in &mut self.rails {
            applied |= rail.route(message);
        }
        applied
    }

    /// Advance every rail, in index order, then the regeneration button.
    pub fn tick(&mut self, clock: ClockTick) {
        for rail in &mut self.rails {
            rail.tick(clock);
            self.events.extend(rail.take_events());
        }

        if self.game_over {
            return;
        }
        let completed = match self.regen.as_mut() {
            Some(regen) => regen.tick(clock.delta),
            None => false,
        };
        if !completed {
            return;
        }
        // A hold at full life re-arms without asking for a heal
        if self.life >= self.max_life {
            debug!("{} regenerated at full life", self.owner_id);
            return;
        }
        if let Some(outbox) = &self.outbox {
            outbox.send(ClientMessage::life_event(LifeEventKind::Heal, self.regen_heal));
        }
        info!("{} regenerated {}", self.owner_id, self.regen_heal);
        self.events.push(BoardEvent::new(
            clock.now,
            self.owner_id.as_str(),
            BoardEventData::Regenerated { heal: self.regen_heal },
        ));
    }

    /// Repair button pressed on `rail`. Only the local board repairs.
    pub fn press_start(&mut self, rail: RailIndex) -> bool {
        if !self.is_interactive() || self.game_over {
            return false;
        }
        self.rails[rail.get() as usize].press_start()
    }

    /// Repair button released on `rail`.
    pub fn press_end(&mut self, rail: RailIndex) {
        self.rails[rail.get() as usize].press_end();
    }

    /// Regeneration button pressed.
    pub fn regen_press_start(&mut self) {
        if self.game_over {
            return;
        }
        if let Some(regen) = self.regen.as_mut() {
            regen.on_press_start();
        }
    }

    /// Regeneration button released.
    pub fn regen_press_end(&mut self) {
        if let Some(regen) = self.regen.as_mut() {
            regen.on_press_end();
        }
    }

    /// Player is out; stops regeneration and repairs.
    pub fn set_game_over(&mut self) {
        if !self.game_over {
            info!("{} is out", self.owner_id);
            self.game_over = true;
            if let Some(regen) = self.regen.as_mut() {
                regen.on_press_end();
            }
        }
    }

    /// Set life directly (game start).
    pub fn set_life(&mut self, life: u32) {
        self.life = life.min(self.max_life);
    }

    /// Drain events produced since the last call.
    pub fn take_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Board owner.
    #[inline]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// All rails in index order.
    pub fn rails(&self) -> &[Rail] {
        &self.rails
    }

    /// One rail.
    pub fn rail(&self, index: RailIndex) -> &Rail {
        &self.rails[index.get() as usize]
    }

    /// Current life.
    #[inline]
    pub fn life(&self) -> u32 {
        self.life
    }

    /// Life cap.
    #[inline]
    pub fn max_life(&self) -> u32 {
        self.max_life
    }

    /// Regeneration button, local board only.
    pub fn regen(&self) -> Option<&PressProgress> {
        self.regen.as_ref()
    }

    /// Whether this is the local player's board.
    #[inline]
    pub fn is_interactive(&self) -> bool {
        self.regen.is_some()
    }

    /// Whether the owner is out.
    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Feed this board's observable state into a hasher.
    pub fn state_hash_into(&self, hasher: &mut StateHasher) -> Result<(), bincode::Error> {
        hasher.update_str(&self.owner_id);
        hasher.update_u32(self.life);
        hasher.update_u32(self.max_life);
        hasher.update_bool(self.game_over);
        for rail in &self.rails {
            rail.hash_into(hasher)?;
        }
        Ok(())
    }
}
