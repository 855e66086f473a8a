//! # Rail Clash Client Core
//!
//! Deterministic rail event engine for the Rail Clash client: seven rails
//! per board, event queues that resolve one at a time against a scrolling
//! train, sabotage repair races and the WebSocket protocol that feeds them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RAIL CLASH CLIENT                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── queue.rs    - Double-ended ordered queue                │
//! │  ├── clock.rs    - Simulation clock and frame-rate window    │
//! │  ├── schedule.rs - Time-ordered deferred notifications       │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Board simulation (deterministic)          │
//! │  ├── press.rs    - Press-and-hold progress                   │
//! │  ├── sabotage.rs - Repair vs crash race                      │
//! │  ├── events.rs   - Rail events and relation history          │
//! │  ├── rail.rs     - Per-rail event resolver                   │
//! │  ├── board.rs    - Seven rails, life and regeneration        │
//! │  └── state.rs    - Boards, clock and message dispatch        │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── protocol.rs - Message types                             │
//! │  └── client.rs   - WebSocket client and outbox               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules never read the wall clock:
//! - Time is integer milliseconds advanced only by `BoardClock`
//! - Deferred work runs off `ScheduledQueue`, not timers
//! - No HashMap (uses BTreeMap for sorted iteration)
//!
//! Given the same messages and frame deltas, every board ends in the
//! **same state hash**.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::clock::{BoardClock, ClockTick, Millis};
pub use crate::core::queue::OrderedQueue;
pub use crate::game::board::Board;
pub use crate::game::rail::{Rail, RailConfig, TieBreak};
pub use crate::game::state::{GameConfig, GameState, TickResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
