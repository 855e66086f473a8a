//! Network Layer
//!
//! WebSocket client for the game server.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod client;

pub use protocol::{ClientMessage, InboundMessage, ProtocolError, RailIndex, ServerMessage};
pub use client::{connect, Connection, ConnectionConfig, Outbox, TransportError};
