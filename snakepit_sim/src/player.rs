//! Simulated players - bot participants that steer from broadcast frames.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use snakepit_core::{
    Direction, Participant, ParticipantRegistry, Position, RoundState, Seat, ServerMessage,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// How a bot picks its next direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Always the same direction, whatever happens
    Fixed(Direction),

    /// Keeps going, occasionally turns; avoids obvious crashes
    RandomWalk,

    /// Heads for the apple along the shortest free step
    AppleSeeker,
}

/// What a bot saw before it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerReport {
    pub name: String,
    /// Round-state frames received
    pub frames_seen: u64,
    /// Rounds it saw finish
    pub rounds_seen: u64,
    /// Left the registry on its own
    pub left: bool,
}

/// Chance per frame that a random walker turns.
const TURN_PROBABILITY: f64 = 0.25;

/// A bot driving one [`Seat`].
pub struct SimulatedPlayer {
    seat: Arc<Seat>,
    inbox: mpsc::UnboundedReceiver<ServerMessage>,
    registry: Arc<ParticipantRegistry>,
    strategy: Strategy,
    rng: ChaCha8Rng,
    leave_after_frames: Option<u64>,
    report: PlayerReport,
}

impl SimulatedPlayer {
    pub fn new(
        seat: Arc<Seat>,
        inbox: mpsc::UnboundedReceiver<ServerMessage>,
        registry: Arc<ParticipantRegistry>,
        strategy: Strategy,
        seed: u64,
    ) -> Self {
        if let Strategy::Fixed(direction) = strategy {
            seat.steer(direction);
        }
        let report = PlayerReport {
            name: seat.id().to_string(),
            frames_seen: 0,
            rounds_seen: 0,
            left: false,
        };
        Self {
            seat,
            inbox,
            registry,
            strategy,
            rng: ChaCha8Rng::seed_from_u64(seed),
            leave_after_frames: None,
            report,
        }
    }

    /// Disconnects after seeing `frames` round-state frames.
    pub fn leave_after(mut self, frames: u64) -> Self {
        self.leave_after_frames = Some(frames);
        self
    }

    pub fn name(&self) -> &str {
        &self.report.name
    }

    /// The report of a bot that never got to play.
    pub fn into_report(self) -> PlayerReport {
        self.report
    }

    /// Consumes pushed messages until `shutdown` flips or the bot leaves.
    /// Messages already queued are handled before shutdown is noticed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PlayerReport {
        loop {
            let message = tokio::select! {
                biased;
                message = self.inbox.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match message {
                ServerMessage::RoundState(state) => {
                    self.report.frames_seen += 1;
                    let next = self.choose(&state);
                    self.seat.steer(next);

                    if self
                        .leave_after_frames
                        .is_some_and(|limit| self.report.frames_seen >= limit)
                    {
                        debug!("{} leaving after {} frames", self.report.name, self.report.frames_seen);
                        self.registry.remove(self.seat.id());
                        self.report.left = true;
                        break;
                    }
                }
                ServerMessage::RoundOver { .. } => self.report.rounds_seen += 1,
                ServerMessage::Waiting { .. } | ServerMessage::RoundPreparation {} => {}
            }
        }
        self.report
    }

    /// Picks the next direction for the given frame.
    pub fn choose(&mut self, state: &RoundState) -> Direction {
        let heading = self.seat.direction();
        let Some(head) = state
            .player(self.seat.id())
            .and_then(|view| view.pieces.first().copied())
        else {
            // Dead or not in this round
            return heading;
        };

        match self.strategy {
            Strategy::Fixed(direction) => direction,
            Strategy::RandomWalk => {
                let mut preferred = heading;
                if self.rng.gen_bool(TURN_PROBABILITY) {
                    let turns = perpendicular(heading);
                    preferred = turns[self.rng.gen_range(0..turns.len())];
                }
                first_free(state, head, heading, std::iter::once(preferred))
            }
            Strategy::AppleSeeker => {
                let target = state.apple.location;
                let mut options = Direction::ALL;
                options.sort_by_key(|d| manhattan(head.step(*d), target));
                first_free(state, head, heading, options)
            }
        }
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let sender_alive = rx.wait_for(|stop| *stop).await.is_ok();
    if !sender_alive {
        std::future::pending::<()>().await;
    }
}

fn perpendicular(direction: Direction) -> [Direction; 2] {
    match direction {
        Direction::North | Direction::South => [Direction::East, Direction::West],
        Direction::East | Direction::West => [Direction::North, Direction::South],
    }
}

fn manhattan(a: Position, b: Position) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// True if stepping onto `pos` would crash into a wall or any body.
fn is_blocked(state: &RoundState, pos: Position) -> bool {
    !pos.is_inside(state.width, state.height)
        || state.players.iter().any(|p| p.pieces.contains(&pos))
}

/// First of `preferred` that is neither a reversal nor blocked, falling back
/// to any free direction, then to `heading`.
fn first_free(
    state: &RoundState,
    head: Position,
    heading: Direction,
    preferred: impl IntoIterator<Item = Direction>,
) -> Direction {
    preferred
        .into_iter()
        .chain(Direction::ALL)
        .filter(|d| *d != heading.opposite())
        .find(|d| !is_blocked(state, head.step(*d)))
        .unwrap_or(heading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{prop_assert, prop_assert_eq, prop_assert_ne, proptest};
    use snakepit_core::{Apple, Observer, PlayerView};

    fn state(pieces: Vec<Position>, apple: Position) -> RoundState {
        RoundState {
            width: 10,
            height: 10,
            players: vec![PlayerView {
                name: "bot".to_string(),
                pieces,
            }],
            apple: Apple { location: apple },
        }
    }

    fn player(strategy: Strategy) -> SimulatedPlayer {
        let (seat, inbox) = Seat::new("bot").unwrap();
        let registry = Arc::new(ParticipantRegistry::new(2, 10));
        SimulatedPlayer::new(seat, inbox, registry, strategy, 1)
    }

    #[test]
    fn test_fixed_strategy_steers_immediately() {
        let bot = player(Strategy::Fixed(Direction::East));
        assert_eq!(bot.seat.direction(), Direction::East);
    }

    #[test]
    fn test_seeker_moves_towards_apple() {
        let mut bot = player(Strategy::AppleSeeker);
        bot.seat.steer(Direction::East);
        let frame = state(vec![Position::new(2, 5)], Position::new(8, 5));
        assert_eq!(bot.choose(&frame), Direction::East);

        let frame = state(vec![Position::new(2, 5)], Position::new(2, 9));
        assert_eq!(bot.choose(&frame), Direction::South);
    }

    #[test]
    fn test_seeker_never_reverses_into_its_neck() {
        let mut bot = player(Strategy::AppleSeeker);
        bot.seat.steer(Direction::East);
        // Apple straight behind
        let frame = state(
            vec![Position::new(5, 5), Position::new(4, 5)],
            Position::new(1, 5),
        );
        let choice = bot.choose(&frame);
        assert_ne!(choice, Direction::West);
        assert!(!is_blocked(&frame, Position::new(5, 5).step(choice)));
    }

    #[test]
    fn test_random_walk_avoids_wall() {
        let mut bot = player(Strategy::RandomWalk);
        bot.seat.steer(Direction::North);
        let frame = state(vec![Position::new(5, 0)], Position::new(9, 9));
        for _ in 0..20 {
            let choice = bot.choose(&frame);
            assert_ne!(choice, Direction::North);
            assert_ne!(choice, Direction::South);
        }
    }

    #[test]
    fn test_dead_bot_keeps_heading() {
        let mut bot = player(Strategy::AppleSeeker);
        bot.seat.steer(Direction::West);
        let frame = state(Vec::new(), Position::new(0, 0));
        assert_eq!(bot.choose(&frame), Direction::West);
    }

    proptest! {
        #[test]
        fn prop_seeker_takes_a_free_cell_when_one_exists(
            hx in 0i32..10, hy in 0i32..10,
            ax in 0i32..10, ay in 0i32..10,
            heading in 0u8..4,
            walls in proptest::collection::vec((0i32..10, 0i32..10), 0..30),
        ) {
            let mut bot = player(Strategy::AppleSeeker);
            let heading = Direction::from_u8(heading).unwrap();
            bot.seat.steer(heading);

            let head = Position::new(hx, hy);
            let mut frame = state(vec![head], Position::new(ax, ay));
            frame.players.push(PlayerView {
                name: "wall".to_string(),
                pieces: walls
                    .into_iter()
                    .map(|(x, y)| Position::new(x, y))
                    .filter(|p| *p != head)
                    .collect(),
            });

            let free_exists = Direction::ALL
                .iter()
                .any(|d| *d != heading.opposite() && !is_blocked(&frame, head.step(*d)));
            let choice = bot.choose(&frame);
            if free_exists {
                prop_assert!(!is_blocked(&frame, head.step(choice)));
                prop_assert_ne!(choice, heading.opposite());
            } else {
                prop_assert_eq!(choice, heading);
            }
        }
    }

    #[tokio::test]
    async fn test_bot_leaves_after_frames() {
        let registry = Arc::new(ParticipantRegistry::new(2, 10));
        let (seat, inbox) = Seat::new("quitter").unwrap();
        registry.add(seat.clone()).unwrap();
        let bot = SimulatedPlayer::new(seat.clone(), inbox, registry.clone(), Strategy::RandomWalk, 3)
            .leave_after(2);

        let frame = RoundState {
            width: 10,
            height: 10,
            players: vec![PlayerView {
                name: "quitter".to_string(),
                pieces: vec![Position::new(5, 5)],
            }],
            apple: Apple {
                location: Position::new(0, 0),
            },
        };
        for _ in 0..3 {
            seat.deliver(&ServerMessage::RoundState(frame.clone())).unwrap();
        }

        let (_tx, shutdown) = watch::channel(false);
        let report = bot.run(shutdown).await;
        assert!(report.left);
        assert_eq!(report.frames_seen, 2);
        assert!(!registry.contains("quitter"));
    }
}
