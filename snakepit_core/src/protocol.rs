//! Messages exchanged with participants and observers.
//!
//! The transport is out of scope here, but every outbound push is exactly
//! one [`ServerMessage`] and every inbound intent update is one
//! [`ClientMessage`]. Both encode as externally tagged JSON:
//!
//! ```text
//! {"waiting":{"current_players":1,"required_players":2}}
//! {"round_preparation":{}}
//! {"round_state":{"width":50,"height":25,"players":[...],"apple":{"location":{"x":3,"y":9}}}}
//! {"round_over":{"winner":"alice"}}
//! {"direction":{"direction":"north"}}
//! ```

use crate::grid::{Apple, Arena, Direction, Position};
use crate::participant::Participant;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A server-to-client push. Exactly one variant per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    /// Not enough participants yet
    Waiting {
        current_players: usize,
        required_players: usize,
    },

    /// Enough participants; the round starts after the grace period
    RoundPreparation {},

    /// Snapshot of the arena during an active round
    RoundState(RoundState),

    /// Round finished; `winner` is `None` when nobody survived
    RoundOver { winner: Option<String> },
}

/// Arena snapshot as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    pub width: i32,
    pub height: i32,
    pub players: Vec<PlayerView>,
    pub apple: Apple,
}

/// One roster slot in a [`RoundState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,

    /// Body pieces, head first; empty once the snake is dead
    pub pieces: Vec<Position>,
}

impl RoundState {
    /// Builds the client view of `arena` for the given roster.
    ///
    /// # Panics
    /// If the roster and arena disagree on the number of slots.
    pub fn from_arena(arena: &Arena, roster: &[Arc<dyn Participant>]) -> Self {
        assert_eq!(
            roster.len(),
            arena.snakes.len(),
            "roster and arena slot counts differ"
        );

        let players = roster
            .iter()
            .zip(&arena.snakes)
            .map(|(participant, snake)| PlayerView {
                name: participant.id().to_string(),
                pieces: if snake.alive {
                    snake.pieces.clone()
                } else {
                    Vec::new()
                },
            })
            .collect();

        Self {
            width: arena.width,
            height: arena.height,
            players,
            apple: arena.apple,
        }
    }

    /// Finds a player's view by name.
    pub fn player(&self, name: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.name == name)
    }
}

impl ServerMessage {
    pub fn waiting(current_players: usize, required_players: usize) -> Self {
        Self::Waiting {
            current_players,
            required_players,
        }
    }

    pub fn round_state(arena: &Arena, roster: &[Arc<dyn Participant>]) -> Self {
        Self::RoundState(RoundState::from_arena(arena, roster))
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Waiting { .. } => "waiting",
            ServerMessage::RoundPreparation {} => "round_preparation",
            ServerMessage::RoundState(_) => "round_state",
            ServerMessage::RoundOver { .. } => "round_over",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A client-to-server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the participant's last-known direction
    Direction { direction: Direction },
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Snake;
    use crate::participant::Seat;

    #[test]
    fn test_waiting_wire_shape() {
        let json = ServerMessage::waiting(1, 2).to_json().unwrap();
        assert_eq!(json, r#"{"waiting":{"current_players":1,"required_players":2}}"#);
        assert_eq!(
            ServerMessage::RoundPreparation {}.to_json().unwrap(),
            r#"{"round_preparation":{}}"#
        );
        assert_eq!(
            ServerMessage::RoundOver { winner: None }.to_json().unwrap(),
            r#"{"round_over":{"winner":null}}"#
        );
    }

    #[test]
    fn test_client_direction_parses() {
        let msg = ClientMessage::from_json(r#"{"direction":{"direction":"east"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Direction {
                direction: Direction::East
            }
        );
        assert!(ClientMessage::from_json(r#"{"direction":{"direction":"up"}}"#).is_err());
    }

    #[test]
    fn test_round_state_hides_dead_bodies() {
        let (alice, _rx_a) = Seat::new("alice").unwrap();
        let (bob, _rx_b) = Seat::new("bob").unwrap();
        let roster: Vec<Arc<dyn Participant>> = vec![alice, bob];

        let mut dead = Snake::new(Position::new(4, 4), 2);
        dead.alive = false;
        let arena = Arena {
            width: 8,
            height: 8,
            snakes: vec![Snake::new(Position::new(1, 1), 2), dead],
            apple: Apple {
                location: Position::new(6, 6),
            },
        };

        let state = RoundState::from_arena(&arena, &roster);
        assert_eq!(state.player("alice").unwrap().pieces, vec![Position::new(1, 1)]);
        assert!(state.player("bob").unwrap().pieces.is_empty());
        assert_eq!(state.apple.location, Position::new(6, 6));

        let json = ServerMessage::RoundState(state).to_json().unwrap();
        assert!(json.starts_with(r#"{"round_state":{"width":8,"height":8,"players":[{"name":"alice""#));
        assert!(json.contains(r#""apple":{"location":{"x":6,"y":6}}"#));
    }
}
