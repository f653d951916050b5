//! The grid model - positions, directions, snakes and the arena snapshot.
//!
//! These are plain value types. The only behaviour here is the pair of
//! predicates the engine leans on: bounds checks and body occupancy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A cell on the arena grid.
///
/// Positions are signed so that a head stepping off the board can still be
/// represented (and recognised as out of bounds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the neighbouring cell one step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True if the cell lies inside `[0, width) x [0, height)`.
    pub fn is_inside(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.x < width && self.y >= 0 && self.y < height
    }
}

/// Heading requested for a snake. North is towards `y = 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    #[default]
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    /// All four headings, in wire order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit delta applied to a position.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// The heading pointing the other way.
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Decodes the `repr(u8)` discriminant.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown direction name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid direction: {0:?}")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north" => Ok(Direction::North),
            "east" => Ok(Direction::East),
            "south" => Ok(Direction::South),
            "west" => Ok(Direction::West),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

/// A participant's avatar in the arena.
///
/// `pieces[0]` is the head; the tail is last. A dead snake keeps its final
/// pieces for display but takes no further part in collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snake {
    pub alive: bool,

    /// Length the body grows towards; grows by one per apple eaten
    pub target_length: usize,

    pub pieces: Vec<Position>,
}

impl Snake {
    /// Creates a live, single-piece snake that will grow to `target_length`.
    pub fn new(head: Position, target_length: usize) -> Self {
        let mut pieces = Vec::with_capacity(target_length.max(1));
        pieces.push(head);
        Self {
            alive: true,
            target_length,
            pieces,
        }
    }

    /// Current head position.
    pub fn head(&self) -> Position {
        self.pieces[0]
    }

    /// Returns true if any body piece sits on `pos`.
    pub fn has_segment_at(&self, pos: Position) -> bool {
        self.pieces.iter().any(|piece| *piece == pos)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

/// The single item on the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apple {
    pub location: Position,
}

impl Apple {
    pub fn is_at(&self, pos: Position) -> bool {
        self.location == pos
    }
}

/// One self-contained snapshot of the board.
///
/// Slot `i` of `snakes` belongs to roster slot `i` for the whole round.
/// Cloning an arena is a full deep copy; no two arenas share storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arena {
    pub width: i32,
    pub height: i32,
    pub snakes: Vec<Snake>,
    pub apple: Apple,
}

impl Arena {
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.is_inside(self.width, self.height)
    }

    /// Returns true if any *alive* snake occupies `pos`.
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.snakes
            .iter()
            .any(|snake| snake.alive && snake.has_segment_at(pos))
    }

    /// Slots of the snakes still alive, in slot order.
    pub fn alive_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.snakes
            .iter()
            .enumerate()
            .filter(|(_, snake)| snake.alive)
            .map(|(slot, _)| slot)
    }

    pub fn alive_count(&self) -> usize {
        self.snakes.iter().filter(|snake| snake.alive).count()
    }

    pub fn cell_count(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_follows_compass() {
        let origin = Position::new(5, 5);
        assert_eq!(origin.step(Direction::North), Position::new(5, 4));
        assert_eq!(origin.step(Direction::East), Position::new(6, 5));
        assert_eq!(origin.step(Direction::South), Position::new(5, 6));
        assert_eq!(origin.step(Direction::West), Position::new(4, 5));
    }

    #[test]
    fn test_bounds_are_half_open() {
        assert!(Position::new(0, 0).is_inside(3, 2));
        assert!(Position::new(2, 1).is_inside(3, 2));
        assert!(!Position::new(3, 1).is_inside(3, 2));
        assert!(!Position::new(0, 2).is_inside(3, 2));
        assert!(!Position::new(-1, 0).is_inside(3, 2));
    }

    #[test]
    fn test_direction_text_roundtrip() {
        for dir in Direction::ALL {
            assert_eq!(dir.as_str().parse::<Direction>(), Ok(dir));
            assert_eq!(Direction::from_u8(dir as u8), Some(dir));
        }
        assert!("up".parse::<Direction>().is_err());
        assert_eq!(Direction::from_u8(4), None);
    }

    #[test]
    fn test_direction_json_is_lowercase() {
        let json = serde_json::to_string(&Direction::West).unwrap();
        assert_eq!(json, "\"west\"");
        let back: Direction = serde_json::from_str("\"south\"").unwrap();
        assert_eq!(back, Direction::South);
    }

    #[test]
    fn test_snake_occupancy() {
        let mut snake = Snake::new(Position::new(1, 1), 3);
        snake.pieces.push(Position::new(1, 2));
        assert!(snake.has_segment_at(Position::new(1, 2)));
        assert!(!snake.has_segment_at(Position::new(2, 2)));
        assert_eq!(snake.head(), Position::new(1, 1));
    }

    #[test]
    fn test_dead_snakes_do_not_occupy() {
        let mut dead = Snake::new(Position::new(0, 0), 1);
        dead.alive = false;
        let arena = Arena {
            width: 4,
            height: 4,
            snakes: vec![dead, Snake::new(Position::new(2, 2), 1)],
            apple: Apple::default(),
        };
        assert!(!arena.is_occupied(Position::new(0, 0)));
        assert!(arena.is_occupied(Position::new(2, 2)));
        assert_eq!(arena.alive_slots().collect::<Vec<_>>(), vec![1]);
    }
}
