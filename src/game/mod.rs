//! Game Logic Module
//!
//! Board simulation. Deterministic given messages and frame deltas.
//!
//! ## Module Structure
//!
//! - `press`: Press-and-hold progress
//! - `sabotage`: Repair difficulty and the repair/crash race
//! - `events`: Rail events, relation history, board events
//! - `rail`: Per-rail event resolver
//! - `board`: Seven rails, life, regeneration
//! - `state`: Local and opponent boards, message dispatch

pub mod press;
pub mod sabotage;
pub mod events;
pub mod rail;
pub mod board;
pub mod state;

// Re-export key types
pub use press::PressProgress;
pub use sabotage::{Difficulty, SabotageOutcome, SabotageState};
pub use events::{BoardEvent, BoardEventData, CardType, RailEvent, RelationRecord};
pub use rail::{Rail, RailConfig, RailLayout, TieBreak};
pub use board::{Board, RegenConfig};
pub use state::{GameConfig, GameState, TickResult};
