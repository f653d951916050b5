//! The simulation engine - one deterministic tick of the arena.
//!
//! `Arena::advance` is a pure function: it deep-copies the input, resolves
//! every snake's move on the copy and returns it. Collisions are settled in
//! two independent passes that can only ever add deaths:
//!
//! ```text
//!   pass 1 (slot order)            pass 2
//!   ┌──────────────────────┐       ┌──────────────────────────┐
//!   │ grow / shift body     │       │ planned head on any       │
//!   │ wall? -> dead         │  ──►  │ post-shift body piece     │
//!   │ same head? -> both    │       │ -> dead                   │
//!   │ swapped heads? -> both│       └──────────────────────────┘
//!   └──────────────────────┘
//! ```
//!
//! Apple placement is seeded from the alive heads only, so replaying the
//! same moves always drops the apple in the same cell.

use crate::grid::{Apple, Arena, Direction, Position, Snake};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Parameters for building the opening arena of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub width: i32,
    pub height: i32,

    /// Number of roster slots (one snake each)
    pub snake_count: usize,

    /// Length every snake grows to before eating anything
    pub initial_length: usize,
}

/// Result of checking whether a round is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    /// Two or more snakes are still alive
    Ongoing,

    /// Everyone died (possibly on the same tick)
    NoWinner,

    /// Exactly one snake is left, in this slot
    Winner(usize),
}

impl RoundOutcome {
    pub fn is_completed(&self) -> bool {
        !matches!(self, RoundOutcome::Ongoing)
    }

    /// Winner slot with `-1` meaning "nobody".
    pub fn winner_slot(&self) -> i64 {
        match self {
            RoundOutcome::Winner(slot) => *slot as i64,
            _ => -1,
        }
    }

    pub fn winner(&self) -> Option<usize> {
        match self {
            RoundOutcome::Winner(slot) => Some(*slot),
            _ => None,
        }
    }
}

impl Arena {
    /// Builds the opening arena.
    ///
    /// Snakes sit evenly spaced on the horizontal centre line, each one
    /// piece long with `initial_length` as its growth target.
    ///
    /// # Panics
    /// If fewer than two snakes are requested, if there are more snakes than
    /// columns, or if the board leaves no free cell for the apple. These are
    /// caller bugs, not user input.
    pub fn new(config: &ArenaConfig) -> Self {
        assert!(config.snake_count >= 2, "snake_count < 2");
        assert!(
            config.snake_count as i64 <= config.width as i64,
            "snake_count > width"
        );
        assert!(config.height > 0, "height must be positive");
        assert!(
            (config.width as usize) * (config.height as usize) > config.snake_count,
            "no free cell left for the apple"
        );

        let count = config.snake_count as i32;
        let spacing = config.width / count;
        let offset = spacing / 2;
        let centre_line = config.height / 2;

        let snakes: Vec<Snake> = (0..count)
            .map(|i| {
                Snake::new(
                    Position::new(offset + spacing * i, centre_line),
                    config.initial_length,
                )
            })
            .collect();

        let location = place_apple(config.width, config.height, &snakes)
            .unwrap_or_default();

        Self {
            width: config.width,
            height: config.height,
            snakes,
            apple: Apple { location },
        }
    }

    /// Advances the arena by one tick and returns the new snapshot.
    ///
    /// `directions[i]` steers slot `i`; dead slots ignore their entry.
    ///
    /// # Panics
    /// If `directions.len()` differs from the number of snakes.
    pub fn advance(&self, directions: &[Direction]) -> Arena {
        assert_eq!(
            directions.len(),
            self.snakes.len(),
            "one direction per snake slot is required"
        );

        let mut next = self.clone();
        let max_length = next
            .snakes
            .iter()
            .map(|s| s.target_length.max(s.pieces.len()))
            .max()
            .unwrap_or(1);

        // Post-shift body pieces -> owning slot
        let mut tails: HashMap<Position, usize> =
            HashMap::with_capacity(next.snakes.len() * (max_length + 1));
        // (old head, new head) -> slot, for swap detection
        let mut head_pairs: HashMap<(Position, Position), usize> =
            HashMap::with_capacity(next.snakes.len());
        // new head -> slot, survivors so far
        let mut planned_heads: HashMap<Position, usize> =
            HashMap::with_capacity(next.snakes.len());
        let mut ate_apple = false;

        for slot in 0..next.snakes.len() {
            if !next.snakes[slot].alive {
                continue;
            }

            let snake = &mut next.snakes[slot];
            let old_head = snake.head();
            let new_head = old_head.step(directions[slot]);

            if self.apple.is_at(new_head) {
                snake.target_length += 1;
                ate_apple = true;
            }
            if snake.pieces.len() < snake.target_length {
                snake.pieces.push(Position::default());
            }
            for i in (1..snake.pieces.len()).rev() {
                snake.pieces[i] = snake.pieces[i - 1];
                tails.insert(snake.pieces[i], slot);
            }
            snake.pieces[0] = new_head;

            if !new_head.is_inside(next.width, next.height) {
                next.snakes[slot].alive = false;
            } else if let Some(&other) = planned_heads.get(&new_head) {
                next.snakes[slot].alive = false;
                next.snakes[other].alive = false;
            } else if let Some(&other) = head_pairs.get(&(new_head, old_head)) {
                next.snakes[slot].alive = false;
                next.snakes[other].alive = false;
            } else {
                head_pairs.insert((old_head, new_head), slot);
                planned_heads.insert(new_head, slot);
            }
        }

        for (head, slot) in &planned_heads {
            if tails.contains_key(head) {
                next.snakes[*slot].alive = false;
            }
        }

        if ate_apple {
            if let Some(location) = place_apple(next.width, next.height, &next.snakes) {
                next.apple.location = location;
            }
        }

        next
    }

    /// Reports whether the round is over and who (if anyone) won.
    pub fn is_completed(&self) -> RoundOutcome {
        let mut alive = self.alive_slots();
        match (alive.next(), alive.next()) {
            (None, _) => RoundOutcome::NoWinner,
            (Some(slot), None) => RoundOutcome::Winner(slot),
            (Some(_), Some(_)) => RoundOutcome::Ongoing,
        }
    }

    /// Slot of the single longest alive snake, `None` on a tie or when
    /// nobody is alive.
    pub fn longest_snake(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        let mut tied = false;

        for slot in self.alive_slots() {
            let len = self.snakes[slot].pieces.len();
            match best {
                Some((_, best_len)) if len == best_len => tied = true,
                Some((_, best_len)) if len < best_len => {}
                _ => {
                    best = Some((slot, len));
                    tied = false;
                }
            }
        }

        if tied {
            None
        } else {
            best.map(|(slot, _)| slot)
        }
    }
}

/// Folds the alive head positions (dead slots count as `(0, 0)`) into a
/// 64-bit checksum, in slot order.
pub fn apple_seed(snakes: &[Snake]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for snake in snakes {
        let (x, y) = if snake.alive {
            let head = snake.head();
            (head.x as u64, head.y as u64)
        } else {
            (0, 0)
        };
        for word in [x, y] {
            hash = (hash.rotate_left(5) ^ word).wrapping_mul(0x517cc1b727220a95);
        }
    }
    hash
}

/// Picks a cell not covered by any alive snake.
///
/// The generator is seeded from [`apple_seed`], so the result depends only
/// on where the alive heads (and bodies) are. Returns `None` when the alive
/// snakes cover every cell.
pub fn place_apple(width: i32, height: i32, snakes: &[Snake]) -> Option<Position> {
    let occupied: HashSet<Position> = snakes
        .iter()
        .filter(|snake| snake.alive)
        .flat_map(|snake| snake.pieces.iter().copied())
        .filter(|pos| pos.is_inside(width, height))
        .collect();

    let cells = (width.max(0) as usize) * (height.max(0) as usize);
    if occupied.len() >= cells {
        return None;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(apple_seed(snakes));
    loop {
        let candidate = Position::new(rng.gen_range(0..width), rng.gen_range(0..height));
        if !occupied.contains(&candidate) {
            return Some(candidate);
        }
    }
}
