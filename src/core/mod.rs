//! Core deterministic primitives.
//!
//! Containers and timekeeping driven only by the simulation clock.

pub mod queue;
pub mod clock;
pub mod schedule;
pub mod hash;

// Re-export core types
pub use queue::OrderedQueue;
pub use clock::{BoardClock, ClockTick, Millis};
pub use schedule::ScheduledQueue;
pub use hash::{StateHash, StateHasher};
