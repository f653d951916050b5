//! Participant and observer capabilities.
//!
//! The coordinator only ever talks to recipients through these two traits,
//! so a live network connection and a test double are interchangeable:
//!
//! - [`Observer`]: can receive a [`ServerMessage`]
//! - [`Participant`]: an observer that also has an identity and steers a snake
//!
//! [`Seat`] and [`Spectator`] are the channel-backed implementations used by
//! in-process transports and the simulation harness.

use crate::grid::Direction;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::AdmissionError;
use snakepit_env::EnvError;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Longest accepted identity, in Unicode scalar values.
pub const MAX_IDENTITY_CHARS: usize = 16;

/// Anything the broadcaster can push messages to.
pub trait Observer: Send + Sync + 'static {
    /// Delivers one message.
    ///
    /// Must not block: implementations queue the message and return. An
    /// error only affects this recipient.
    fn deliver(&self, message: &ServerMessage) -> Result<(), EnvError>;
}

/// A connected player that controls one snake per round.
pub trait Participant: Observer {
    /// Display identity, unique among connected participants.
    fn id(&self) -> &str;

    /// Last direction the player asked for. Called once per tick by the
    /// coordinator and must return immediately.
    fn direction(&self) -> Direction;
}

/// Checks a display identity: 1 to 16 characters, not all whitespace.
///
/// `&str` is valid UTF-8 by construction, so text validity is already
/// guaranteed by the type.
pub fn validate_identity(id: &str) -> Result<(), AdmissionError> {
    let chars = id.chars().count();
    if chars == 0 || chars > MAX_IDENTITY_CHARS || id.trim().is_empty() {
        return Err(AdmissionError::InvalidIdentity(id.to_string()));
    }
    Ok(())
}

/// Lock-free single-value direction cell.
///
/// Written by a connection task, read by the tick loop; neither side ever
/// waits on the other.
#[derive(Debug)]
pub struct DirectionCell(AtomicU8);

impl DirectionCell {
    pub fn new(initial: Direction) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> Direction {
        let raw = self.0.load(Ordering::Acquire);
        match Direction::from_u8(raw) {
            Some(direction) => direction,
            None => unreachable!("direction cell holds invalid value {raw}"),
        }
    }

    pub fn store(&self, direction: Direction) {
        self.0.store(direction as u8, Ordering::Release);
    }
}

impl Default for DirectionCell {
    fn default() -> Self {
        Self::new(Direction::North)
    }
}

/// A participant backed by an unbounded channel.
///
/// The transport (or a simulated bot) owns the receiving half and forwards
/// whatever arrives; inbound intent updates go through [`Seat::steer`].
#[derive(Debug)]
pub struct Seat {
    id: String,
    direction: DirectionCell,
    outbox: mpsc::UnboundedSender<ServerMessage>,
}

impl Seat {
    /// Creates a seat for `id`, returning it with the stream of messages
    /// pushed to it.
    pub fn new(
        id: impl Into<String>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<ServerMessage>), AdmissionError> {
        let id = id.into();
        validate_identity(&id)?;

        let (outbox, inbox) = mpsc::unbounded_channel();
        let seat = Arc::new(Self {
            id,
            direction: DirectionCell::default(),
            outbox,
        });
        Ok((seat, inbox))
    }

    /// Records a new intended direction.
    pub fn steer(&self, direction: Direction) {
        self.direction.store(direction);
    }

    /// Applies an inbound client message.
    pub fn apply(&self, message: ClientMessage) {
        match message {
            ClientMessage::Direction { direction } => self.steer(direction),
        }
    }

    /// True once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }
}

impl Observer for Seat {
    fn deliver(&self, message: &ServerMessage) -> Result<(), EnvError> {
        self.outbox
            .send(message.clone())
            .map_err(|_| EnvError::disconnected(&self.id))
    }
}

impl Participant for Seat {
    fn id(&self) -> &str {
        &self.id
    }

    fn direction(&self) -> Direction {
        self.direction.load()
    }
}

/// A passive, channel-backed observer.
#[derive(Debug)]
pub struct Spectator {
    outbox: mpsc::UnboundedSender<ServerMessage>,
}

impl Spectator {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        (Arc::new(Self { outbox }), inbox)
    }
}

impl Observer for Spectator {
    fn deliver(&self, message: &ServerMessage) -> Result<(), EnvError> {
        self.outbox
            .send(message.clone())
            .map_err(|_| EnvError::disconnected("spectator"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rules() {
        assert!(validate_identity("alice").is_ok());
        assert!(validate_identity("🐍🐍🐍🐍🐍🐍🐍🐍🐍🐍🐍🐍🐍🐍🐍🐍").is_ok());
        assert!(validate_identity("").is_err());
        assert!(validate_identity("   ").is_err());
        assert!(validate_identity("seventeen-chars!!").is_err());
    }

    #[test]
    fn test_direction_cell_defaults_north() {
        let cell = DirectionCell::default();
        assert_eq!(cell.load(), Direction::North);
        cell.store(Direction::West);
        assert_eq!(cell.load(), Direction::West);
    }

    #[test]
    fn test_seat_steering_and_delivery() {
        let (seat, mut rx) = Seat::new("bot-1").unwrap();
        assert_eq!(seat.direction(), Direction::North);

        seat.apply(ClientMessage::Direction {
            direction: Direction::South,
        });
        assert_eq!(seat.direction(), Direction::South);

        seat.deliver(&ServerMessage::RoundPreparation {}).unwrap();
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::RoundPreparation {});
    }

    #[test]
    fn test_seat_reports_disconnect() {
        let (seat, rx) = Seat::new("gone").unwrap();
        drop(rx);
        assert!(seat.is_closed());
        let err = seat.deliver(&ServerMessage::waiting(1, 2)).unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_seat_rejects_bad_identity() {
        assert!(matches!(
            Seat::new(""),
            Err(AdmissionError::InvalidIdentity(_))
        ));
    }
}
