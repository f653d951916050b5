//! Snakepit Core - multi-player snake arena engine and round coordinator
//!
//! This library has two halves:
//! 1. **Engine** ([`grid`], [`engine`]): a pure, deterministic arena.
//!    `Arena::advance` consumes one direction per slot and returns the next
//!    arena; nothing else can change it.
//! 2. **Coordination** ([`registry`], [`broadcaster`], [`coordinator`]): the
//!    waiting room, message fan-out and the round lifecycle state machine,
//!    generic over [`snakepit_env::ArenaContext`] so it runs on either a
//!    real or a virtual clock.
//!
//! Transports plug in through the [`Participant`] and [`Observer`] traits.

pub mod grid;
pub mod engine;
pub mod protocol;
pub mod participant;
pub mod registry;
pub mod broadcaster;
pub mod coordinator;

// Re-export key types for convenience
pub use grid::{Apple, Arena, Direction, ParseDirectionError, Position, Snake};
pub use engine::{apple_seed, place_apple, ArenaConfig, RoundOutcome};
pub use protocol::{ClientMessage, PlayerView, RoundState, ServerMessage};
pub use participant::{validate_identity, DirectionCell, Observer, Participant, Seat, Spectator};
pub use registry::{AdmissionError, ParticipantRegistry, RosterWatch};
pub use broadcaster::Broadcaster;
pub use coordinator::{ConfigError, RoundConfig, RoundCoordinator, RoundPhase, RoundSummary, StopHandle};
