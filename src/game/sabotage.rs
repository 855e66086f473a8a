//! Rail Sabotage
//!
//! An obstruction on a rail that the owner repairs by holding a button
//! before the crash deadline. Repair and crash race; the first one wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::clock::Millis;
use crate::game::events::CardInfo;
use crate::game::press::PressProgress;

/// Hold time needed to repair each difficulty tier (index = level - 1).
pub const REPAIR_TIMES_MS: [Millis; 5] = [1000, 1500, 2000, 2500, 3000];

/// Seconds of crash window that make up one difficulty tier.
pub const DELAY_SECS_PER_DIFFICULTY: u32 = 4;

/// Repair difficulty (Tier 1-5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Difficulty {
    /// Tier 1: 1.0s hold
    Trivial = 1,
    /// Tier 2: 1.5s hold
    Easy = 2,
    /// Tier 3: 2.0s hold
    Normal = 3,
    /// Tier 4: 2.5s hold
    Hard = 4,
    /// Tier 5: 3.0s hold
    Brutal = 5,
}

impl Difficulty {
    /// Hold time needed to repair.
    #[inline]
    pub fn repair_time_ms(self) -> Millis {
        REPAIR_TIMES_MS[self as usize - 1]
    }

    /// Numeric tier (1-5).
    #[inline]
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Get difficulty from tier (1-5).
    pub fn from_level(level: u8) -> Option<Difficulty> {
        match level {
            1 => Some(Difficulty::Trivial),
            2 => Some(Difficulty::Easy),
            3 => Some(Difficulty::Normal),
            4 => Some(Difficulty::Hard),
            5 => Some(Difficulty::Brutal),
            _ => None,
        }
    }

    /// Derive the tier from a sabotage's crash window.
    ///
    /// Longer windows come from stronger cards and take longer to fix;
    /// every `DELAY_SECS_PER_DIFFICULTY` seconds is one tier, clamped to 1-5.
    pub fn from_delay_secs(delay: u32) -> Difficulty {
        let level = (delay / DELAY_SECS_PER_DIFFICULTY).clamp(1, 5) as u8;
        match Difficulty::from_level(level) {
            Some(difficulty) => difficulty,
            None => unreachable!("level clamped to 1..=5"),
        }
    }
}

/// Kind of obstruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SabotageKind {
    /// Broken track
    Broken,
}

/// How a sabotage ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SabotageOutcome {
    /// Fixed before the deadline
    Repaired,
    /// Deadline passed first
    Crashed,
}

/// One-shot outcome handler.
pub type OutcomeHandler = Box<dyn FnOnce() + Send>;

/// Obstruction state for one rail.
pub struct SabotageState {
    kind: SabotageKind,
    timing: Millis,
    attack: u32,
    difficulty: Difficulty,
    card_info: CardInfo,
    repair: PressProgress,
    repaired_handler: Option<OutcomeHandler>,
    crashed_handler: Option<OutcomeHandler>,
    outcome: Option<SabotageOutcome>,
}

impl fmt::Debug for SabotageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SabotageState")
            .field("kind", &self.kind)
            .field("timing", &self.timing)
            .field("attack", &self.attack)
            .field("difficulty", &self.difficulty)
            .field("repair", &self.repair)
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl SabotageState {
    /// Create a sabotage that the train reaches at `timing`.
    pub fn new(timing: Millis, attack: u32, difficulty: Difficulty, card_info: CardInfo) -> Self {
        Self {
            kind: SabotageKind::Broken,
            timing,
            attack,
            difficulty,
            card_info,
            repair: PressProgress::new(Some(difficulty.repair_time_ms())),
            repaired_handler: None,
            crashed_handler: None,
            outcome: None,
        }
    }

    /// Install the handler run when repair wins.
    pub fn set_repaired_handler(&mut self, handler: OutcomeHandler) {
        if self.outcome.is_none() {
            self.repaired_handler = Some(handler);
        }
    }

    /// Install the handler run when the crash deadline wins.
    pub fn set_crashed_handler(&mut self, handler: OutcomeHandler) {
        if self.outcome.is_none() {
            self.crashed_handler = Some(handler);
        }
    }

    /// Crash deadline reached.
    ///
    /// Returns the outcome if this call settled the sabotage.
    pub fn trigger_crash(&mut self) -> Option<SabotageOutcome> {
        self.settle(SabotageOutcome::Crashed)
    }

    /// Repair hold completed.
    ///
    /// Returns the outcome if this call settled the sabotage.
    pub fn trigger_repair(&mut self) -> Option<SabotageOutcome> {
        self.settle(SabotageOutcome::Repaired)
    }

    /// Outcome decided elsewhere (server confirmation).
    ///
    /// Settles without running either handler.
    pub fn confirm(&mut self, outcome: SabotageOutcome) -> Option<SabotageOutcome> {
        self.repaired_handler = None;
        self.crashed_handler = None;
        self.settle(outcome)
    }

    fn settle(&mut self, outcome: SabotageOutcome) -> Option<SabotageOutcome> {
        if self.outcome.is_some() {
            return None;
        }
        self.outcome = Some(outcome);

        let handler = match outcome {
            SabotageOutcome::Repaired => self.repaired_handler.take(),
            SabotageOutcome::Crashed => self.crashed_handler.take(),
        };
        self.repaired_handler = None;
        self.crashed_handler = None;

        if let Some(handler) = handler {
            handler();
        }
        Some(outcome)
    }

    /// Advance repair progress; completion settles as repaired.
    pub fn tick(&mut self, delta: Millis) -> Option<SabotageOutcome> {
        if self.repair.tick(delta) {
            self.trigger_repair()
        } else {
            None
        }
    }

    /// Repair button pressed.
    pub fn on_press_start(&mut self) {
        self.repair.on_press_start();
    }

    /// Repair button released.
    pub fn on_press_end(&mut self) {
        self.repair.on_press_end();
    }

    /// Repair progress (0.0 - 1.0+).
    pub fn progress(&self) -> f64 {
        self.repair.progress().unwrap_or(0.0)
    }

    /// Settled outcome, if any.
    #[inline]
    pub fn outcome(&self) -> Option<SabotageOutcome> {
        self.outcome
    }

    /// Kind of obstruction.
    #[inline]
    pub fn kind(&self) -> SabotageKind {
        self.kind
    }

    /// When the train reaches the obstruction.
    #[inline]
    pub fn timing(&self) -> Millis {
        self.timing
    }

    /// Damage dealt on crash.
    #[inline]
    pub fn attack(&self) -> u32 {
        self.attack
    }

    /// Repair difficulty.
    #[inline]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Card that placed the obstruction.
    #[inline]
    pub fn card_info(&self) -> &CardInfo {
        &self.card_info
    }
}
