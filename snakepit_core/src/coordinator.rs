//! Round Coordinator - drives the arena lifecycle with environment context.
//!
//! # Lifecycle
//!
//! ```text
//!             registry change
//!            ┌──────────────┐
//!            ▼              │ below minimum
//!   ┌───────────────────┐───┘
//!   │ WaitingForPlayers │◄──────────────────────────────┐
//!   └─────────┬─────────┘                               │
//!             │ minimum reached                         │
//!   ┌─────────▼─────────┐  dropped below minimum        │
//!   │     PreRound      │───────────────────────────────┤
//!   └─────────┬─────────┘                               │
//!             │ grace period over, roster snapshotted   │
//!   ┌─────────▼─────────┐                               │
//!   │      Active       │  tick: poll → advance → send  │
//!   └─────────┬─────────┘                               │
//!             │ at most one snake alive                 │
//!   ┌─────────▼─────────┐  post-round pause             │
//!   │     RoundOver     │───────────────────────────────┘
//!   └───────────────────┘
//! ```
//!
//! A stop request is observed at the two wait points (waiting for players,
//! pre-round grace). A round that has started always plays out.
//!
//! # Usage
//!
//! ```ignore
//! use snakepit_core::{RoundConfig, RoundCoordinator, Broadcaster};
//! use snakepit_env::TokioContext;
//!
//! let config = RoundConfig::default();
//! let registry = Arc::new(config.registry());
//! let coordinator = RoundCoordinator::new(config, TokioContext::shared(), registry, Arc::new(Broadcaster::new()));
//! let stop = coordinator.stop_handle();
//! coordinator.run().await;
//! ```

use crate::broadcaster::Broadcaster;
use crate::engine::{ArenaConfig, RoundOutcome};
use crate::grid::{Arena, Direction};
use crate::participant::Participant;
use crate::protocol::ServerMessage;
use crate::registry::{ParticipantRegistry, RosterWatch};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use snakepit_env::ArenaContext;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Configuration for the round coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Participants needed before a round can start
    pub minimum_participants: usize,

    /// Grace period between reaching the minimum and starting
    pub pre_round_wait: Duration,

    /// Pause after a round before waiting for players again
    pub post_round_wait: Duration,

    /// Duration of one simulation tick
    pub round_tick: Duration,

    /// Board width; height is derived as `width / 2`
    pub board_width: i32,

    /// Length every snake grows to at the start of a round
    pub initial_length: usize,

    /// Shuffle roster order each round so nobody always gets the same spot
    pub shuffle_roster: bool,

    /// Cut a round off after this many ticks (0 = never); the longest
    /// snake wins a cut-off round
    pub max_round_ticks: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            minimum_participants: 2,
            pre_round_wait: Duration::from_secs(2),
            post_round_wait: Duration::from_secs(2),
            round_tick: Duration::from_millis(200),
            board_width: 50,
            initial_length: 5,
            shuffle_roster: true,
            max_round_ticks: 0,
        }
    }
}

/// Rejected coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("minimum_participants must be at least 2 (got {0})")]
    TooFewParticipants(usize),

    #[error("board_width must be at least 2 (got {0})")]
    BoardTooNarrow(i32),

    #[error("minimum_participants ({0}) exceeds board width ({1})")]
    MinimumExceedsBoard(usize, i32),

    #[error("round_tick must be non-zero")]
    ZeroTick,

    #[error("initial_length must be at least 1")]
    ZeroLength,
}

impl RoundConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_minimum_participants(mut self, minimum: usize) -> Self {
        self.minimum_participants = minimum;
        self
    }

    pub fn with_waits(mut self, pre_round: Duration, post_round: Duration) -> Self {
        self.pre_round_wait = pre_round;
        self.post_round_wait = post_round;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.round_tick = tick;
        self
    }

    pub fn with_board_width(mut self, width: i32) -> Self {
        self.board_width = width;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle_roster = shuffle;
        self
    }

    pub fn with_max_round_ticks(mut self, ticks: u64) -> Self {
        self.max_round_ticks = ticks;
        self
    }

    /// Derived board height (never below 2 rows).
    pub fn board_height(&self) -> i32 {
        (self.board_width / 2).max(2)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_participants < 2 {
            return Err(ConfigError::TooFewParticipants(self.minimum_participants));
        }
        if self.board_width < 2 {
            return Err(ConfigError::BoardTooNarrow(self.board_width));
        }
        if self.minimum_participants as i64 > self.board_width as i64 {
            return Err(ConfigError::MinimumExceedsBoard(
                self.minimum_participants,
                self.board_width,
            ));
        }
        if self.round_tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if self.initial_length == 0 {
            return Err(ConfigError::ZeroLength);
        }
        Ok(())
    }

    /// Builds a registry sized for this configuration: at most one
    /// participant per board column.
    pub fn registry(&self) -> ParticipantRegistry {
        ParticipantRegistry::new(self.minimum_participants, self.board_width.max(0) as usize)
    }

    fn arena_config(&self, snake_count: usize) -> ArenaConfig {
        ArenaConfig {
            width: self.board_width,
            height: self.board_height(),
            snake_count,
            initial_length: self.initial_length,
        }
    }
}

/// Where the coordinator currently is in the round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    WaitingForPlayers,
    PreRound,
    Active,
    RoundOver,
    /// The run loop has exited
    Stopped,
}

/// What happened in one finished round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// Round number, starting at 0
    pub round: u64,

    /// Ticks simulated
    pub ticks: u64,

    /// Roster identities in slot order
    pub roster: Vec<String>,

    pub outcome: RoundOutcome,

    /// Identity of the winning participant, if any
    pub winner: Option<String>,

    /// Arena as it stood on the last tick
    pub final_arena: Arena,
}

/// One-shot, idempotent stop request shared between tasks.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests the coordinator to stop at its next wait point.
    pub fn stop(&self) {
        if !self.tx.send_replace(true) {
            info!("Stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolves once a stop has been requested.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    let sender_alive = rx.wait_for(|stopped| *stopped).await.is_ok();
    if !sender_alive {
        std::future::pending::<()>().await;
    }
}

/// The round coordinator.
///
/// Generic over the context implementation, so the same lifecycle runs on
/// the production clock or on a virtual one.
pub struct RoundCoordinator<Ctx: ArenaContext> {
    config: RoundConfig,
    context: Arc<Ctx>,
    registry: Arc<ParticipantRegistry>,
    broadcaster: Arc<Broadcaster>,
    stop: StopHandle,
    phase: watch::Sender<RoundPhase>,
    rounds_completed: watch::Sender<u64>,
}

impl<Ctx: ArenaContext> RoundCoordinator<Ctx> {
    /// Creates a coordinator.
    ///
    /// # Panics
    /// If `config` fails [`RoundConfig::validate`].
    pub fn new(
        config: RoundConfig,
        context: Arc<Ctx>,
        registry: Arc<ParticipantRegistry>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid round configuration: {e}");
        }
        if registry.capacity() > config.board_width as usize {
            warn!(
                "Registry capacity {} exceeds board width {}; large rosters will be truncated",
                registry.capacity(),
                config.board_width
            );
        }

        let (phase, _) = watch::channel(RoundPhase::WaitingForPlayers);
        let (rounds_completed, _) = watch::channel(0);

        Self {
            config,
            context,
            registry,
            broadcaster,
            stop: StopHandle::new(),
            phase,
            rounds_completed,
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ParticipantRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Handle for requesting a stop from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn phase(&self) -> RoundPhase {
        *self.phase.borrow()
    }

    /// Follows phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<RoundPhase> {
        self.phase.subscribe()
    }

    /// Follows the number of finished rounds.
    pub fn subscribe_rounds(&self) -> watch::Receiver<u64> {
        self.rounds_completed.subscribe()
    }

    fn set_phase(&self, phase: RoundPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!("Phase {:?} -> {:?}", previous, phase);
        }
    }

    /// Runs the lifecycle until a stop is requested.
    ///
    /// Returns a summary of every round played.
    pub async fn run(&self) -> Vec<RoundSummary> {
        let mut stop_rx = self.stop.subscribe();
        let mut roster_watch = self.registry.watch();
        let mut summaries = Vec::new();
        let mut round = 0u64;

        info!(
            "Coordinator started (minimum={}, board={}x{}, seed={})",
            self.config.minimum_participants,
            self.config.board_width,
            self.config.board_height(),
            self.context.seed()
        );

        loop {
            if !self.wait_for_players(&mut roster_watch, &mut stop_rx).await {
                break;
            }

            let roster = match self.pre_round(&mut stop_rx, round).await {
                PreRound::Ready(roster) => roster,
                PreRound::Retry => continue,
                PreRound::Stop => break,
            };

            let summary = self.play_round(round, roster).await;
            self.finish_round(&summary).await;
            summaries.push(summary);
            round += 1;
        }

        self.set_phase(RoundPhase::Stopped);
        info!("Coordinator stopped after {} round(s)", summaries.len());
        summaries
    }

    /// Blocks until the registry reaches the minimum. Returns `false` if a
    /// stop was requested instead.
    async fn wait_for_players(
        &self,
        roster_watch: &mut RosterWatch,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            if self.stop.is_stopped() {
                return false;
            }

            let members = self.registry.acknowledge(roster_watch);
            let required = self.config.minimum_participants;
            if members.len() >= required {
                return true;
            }

            self.set_phase(RoundPhase::WaitingForPlayers);
            debug!("Waiting for players ({}/{})", members.len(), required);
            self.broadcaster
                .broadcast(ServerMessage::waiting(members.len(), required), &members);

            tokio::select! {
                biased;
                _ = stop_requested(stop_rx) => return false,
                changed = roster_watch.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Announces the round, waits out the grace period and snapshots the
    /// roster.
    async fn pre_round(&self, stop_rx: &mut watch::Receiver<bool>, round: u64) -> PreRound {
        self.set_phase(RoundPhase::PreRound);
        let members = self.registry.snapshot();
        self.broadcaster
            .broadcast(ServerMessage::RoundPreparation {}, &members);

        tokio::select! {
            biased;
            _ = stop_requested(stop_rx) => return PreRound::Stop,
            _ = self.context.sleep(self.config.pre_round_wait) => {}
        }

        let mut roster = self.registry.snapshot();
        if roster.len() < self.config.minimum_participants {
            info!(
                "Round {} called off: {} participant(s) left during grace period",
                round,
                roster.len()
            );
            return PreRound::Retry;
        }

        let columns = self.config.board_width as usize;
        if roster.len() > columns {
            warn!("Roster of {} truncated to {} slots", roster.len(), columns);
            roster.truncate(columns);
        }

        if self.config.shuffle_roster {
            let mut rng = ChaCha8Rng::seed_from_u64(self.context.derive_seed(round));
            roster.shuffle(&mut rng);
        }

        PreRound::Ready(roster)
    }

    /// Runs the tick loop until the round is decided.
    async fn play_round(&self, round: u64, roster: Vec<Arc<dyn Participant>>) -> RoundSummary {
        self.set_phase(RoundPhase::Active);
        let names: Vec<String> = roster.iter().map(|p| p.id().to_string()).collect();
        info!("Round {} started: {}", round, names.join(", "));

        let mut arena = Arena::new(&self.config.arena_config(roster.len()));
        self.broadcaster
            .broadcast(ServerMessage::round_state(&arena, &roster), &roster);

        let mut directions = vec![Direction::North; roster.len()];
        let mut ticks = 0u64;
        // Fixed-period schedule; slow ticks do not push later ones back
        let mut next_tick = self.context.now();

        let outcome = loop {
            next_tick += self.config.round_tick;
            let now = self.context.now();
            self.context.sleep(next_tick.saturating_sub(now)).await;

            for (slot, participant) in roster.iter().enumerate() {
                directions[slot] = participant.direction();
            }
            arena = arena.advance(&directions);
            ticks += 1;

            self.broadcaster
                .broadcast(ServerMessage::round_state(&arena, &roster), &roster);

            let outcome = arena.is_completed();
            if outcome.is_completed() {
                break outcome;
            }

            if self.config.max_round_ticks > 0 && ticks >= self.config.max_round_ticks {
                debug!("Round {} hit the {} tick limit", round, ticks);
                break match arena.longest_snake() {
                    Some(slot) => RoundOutcome::Winner(slot),
                    None => RoundOutcome::NoWinner,
                };
            }
        };

        let winner = outcome.winner().map(|slot| names[slot].clone());
        match &winner {
            Some(name) => info!("Round {} won by {} after {} ticks", round, name, ticks),
            None => info!("Round {} ended with no winner after {} ticks", round, ticks),
        }

        let summary = RoundSummary {
            round,
            ticks,
            roster: names,
            outcome,
            winner,
            final_arena: arena,
        };

        self.set_phase(RoundPhase::RoundOver);
        self.broadcaster.broadcast(
            ServerMessage::RoundOver {
                winner: summary.winner.clone(),
            },
            &roster,
        );
        summary
    }

    async fn finish_round(&self, summary: &RoundSummary) {
        self.rounds_completed.send_modify(|n| *n += 1);
        debug!("Round {} over, pausing {:?}", summary.round, self.config.post_round_wait);
        self.context.sleep(self.config.post_round_wait).await;
    }
}

enum PreRound {
    Ready(Vec<Arc<dyn Participant>>),
    Retry,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{Seat, Spectator};
    use snakepit_env::TokioContext;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn test_config() -> RoundConfig {
        RoundConfig::default()
            .with_waits(Duration::from_secs(1), Duration::from_secs(1))
            .with_tick(Duration::from_millis(100))
            .with_shuffle(false)
    }

    fn coordinator(config: RoundConfig) -> Arc<RoundCoordinator<TokioContext>> {
        let registry = Arc::new(config.registry());
        Arc::new(RoundCoordinator::new(
            config,
            TokioContext::shared(),
            registry,
            Arc::new(Broadcaster::new()),
        ))
    }

    async fn next_round_over(rx: &mut UnboundedReceiver<ServerMessage>) -> (Vec<ServerMessage>, Option<String>) {
        let mut seen = Vec::new();
        while let Some(msg) = rx.recv().await {
            if let ServerMessage::RoundOver { winner } = &msg {
                return (seen, winner.clone());
            }
            seen.push(msg);
        }
        panic!("channel closed before round over");
    }

    #[test]
    fn test_round_config_default() {
        let config = RoundConfig::default();
        assert_eq!(config.minimum_participants, 2);
        assert_eq!(config.board_width, 50);
        assert_eq!(config.board_height(), 25);
        assert_eq!(config.initial_length, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_config_validation() {
        assert_eq!(
            RoundConfig::default().with_minimum_participants(1).validate(),
            Err(ConfigError::TooFewParticipants(1))
        );
        assert_eq!(
            RoundConfig::default().with_board_width(1).validate(),
            Err(ConfigError::BoardTooNarrow(1))
        );
        assert_eq!(
            RoundConfig::default()
                .with_board_width(4)
                .with_minimum_participants(5)
                .validate(),
            Err(ConfigError::MinimumExceedsBoard(5, 4))
        );
        assert_eq!(
            RoundConfig::default().with_tick(Duration::ZERO).validate(),
            Err(ConfigError::ZeroTick)
        );
    }

    #[test]
    fn test_round_config_from_partial_json() {
        let config: RoundConfig =
            serde_json::from_str(r#"{"minimum_participants":3,"board_width":20}"#).unwrap();
        assert_eq!(config.minimum_participants, 3);
        assert_eq!(config.board_height(), 10);
        assert_eq!(config.initial_length, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_until_minimum() {
        let coord = coordinator(test_config());
        let (alice, mut rx) = Seat::new("alice").unwrap();
        coord.registry().add(alice).unwrap();

        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        // Admission notice, then the coordinator's own waiting broadcast
        assert_eq!(rx.recv().await.unwrap(), ServerMessage::waiting(1, 2));
        assert_eq!(rx.recv().await.unwrap(), ServerMessage::waiting(1, 2));
        assert_eq!(coord.phase(), RoundPhase::WaitingForPlayers);

        coord.stop_handle().stop();
        let summaries = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("stop while waiting must be prompt")
            .unwrap();
        assert!(summaries.is_empty());
        assert_eq!(coord.phase(), RoundPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_round_with_winner() {
        let coord = coordinator(test_config());
        let (alice, _alice_rx) = Seat::new("alice").unwrap();
        let (bob, mut bob_rx) = Seat::new("bob").unwrap();
        bob.steer(Direction::West);
        coord.registry().add(alice).unwrap();
        coord.registry().add(bob).unwrap();

        let (spectator, mut spectator_rx) = Spectator::new();
        coord.broadcaster().subscribe(spectator);

        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        let (seen, winner) = next_round_over(&mut bob_rx).await;
        assert_eq!(winner.as_deref(), Some("bob"));
        coord.stop_handle().stop();

        assert!(seen.contains(&ServerMessage::RoundPreparation {}));
        let states: Vec<_> = seen
            .iter()
            .filter_map(|m| match m {
                ServerMessage::RoundState(state) => Some(state),
                _ => None,
            })
            .collect();
        // Opening snapshot plus 13 ticks for alice to leave the 25-row board
        assert_eq!(states.len(), 14);
        let last = states.last().unwrap();
        assert!(last.player("alice").unwrap().pieces.is_empty());
        assert!(!last.player("bob").unwrap().pieces.is_empty());

        let (_, spectator_winner) = next_round_over(&mut spectator_rx).await;
        assert_eq!(spectator_winner.as_deref(), Some("bob"));

        let summaries = handle.await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].ticks, 13);
        assert_eq!(summaries[0].outcome, RoundOutcome::Winner(1));
        assert_eq!(summaries[0].roster, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(*coord.subscribe_rounds().borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_during_grace_returns_to_waiting() {
        let coord = coordinator(test_config());
        let (alice, _alice_rx) = Seat::new("alice").unwrap();
        let (bob, mut bob_rx) = Seat::new("bob").unwrap();
        coord.registry().add(alice).unwrap();
        coord.registry().add(bob).unwrap();

        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        loop {
            if bob_rx.recv().await.unwrap() == (ServerMessage::RoundPreparation {}) {
                break;
            }
        }
        assert!(coord.registry().remove("alice"));

        assert_eq!(bob_rx.recv().await.unwrap(), ServerMessage::waiting(1, 2));
        coord.stop_handle().stop();
        assert!(handle.await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_joiner_during_grace_plays_the_round() {
        let coord = coordinator(test_config());
        let (alice, _alice_rx) = Seat::new("alice").unwrap();
        let (bob, _bob_rx) = Seat::new("bob").unwrap();
        coord.registry().add(alice).unwrap();
        coord.registry().add(bob).unwrap();

        let mut phase = coord.subscribe_phase();
        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        phase.wait_for(|p| *p == RoundPhase::PreRound).await.unwrap();
        let (carol, mut carol_rx) = Seat::new("carol").unwrap();
        coord.registry().add(carol).unwrap();
        assert_eq!(carol_rx.recv().await.unwrap(), ServerMessage::waiting(3, 2));

        let opening = loop {
            if let ServerMessage::RoundState(state) = carol_rx.recv().await.unwrap() {
                break state;
            }
        };
        assert_eq!(opening.players.len(), 3);
        assert!(opening.player("carol").is_some());

        next_round_over(&mut carol_rx).await;
        coord.stop_handle().stop();

        let summaries = handle.await.unwrap();
        assert_eq!(summaries[0].roster, vec!["alice", "bob", "carol"]);
        assert_eq!(summaries[0].final_arena.snakes.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_run_on_a_fixed_period() {
        let coord = coordinator(test_config().with_max_round_ticks(4));
        let (alice, mut alice_rx) = Seat::new("alice").unwrap();
        let (bob, _bob_rx) = Seat::new("bob").unwrap();
        coord.registry().add(alice).unwrap();
        coord.registry().add(bob).unwrap();

        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        let mut stamps = Vec::new();
        loop {
            match alice_rx.recv().await.unwrap() {
                ServerMessage::RoundState(_) => stamps.push(tokio::time::Instant::now()),
                ServerMessage::RoundOver { .. } => break,
                _ => {}
            }
        }
        coord.stop_handle().stop();
        handle.await.unwrap();

        assert_eq!(stamps.len(), 5);
        for pair in stamps.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_grace_is_prompt() {
        let config = test_config().with_waits(Duration::from_secs(3600), Duration::from_secs(1));
        let coord = coordinator(config);
        let (alice, _alice_rx) = Seat::new("alice").unwrap();
        let (bob, _bob_rx) = Seat::new("bob").unwrap();
        coord.registry().add(alice).unwrap();
        coord.registry().add(bob).unwrap();

        let mut phase = coord.subscribe_phase();
        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        phase.wait_for(|p| *p == RoundPhase::PreRound).await.unwrap();
        coord.stop_handle().stop();
        coord.stop_handle().stop();

        let summaries = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("stop during grace must not wait out the hour")
            .unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_player_freezes_and_can_still_win() {
        let coord = coordinator(test_config());
        let (alice, mut alice_rx) = Seat::new("alice").unwrap();
        let (bob, bob_rx) = Seat::new("bob").unwrap();
        bob.steer(Direction::West);
        coord.registry().add(alice).unwrap();
        coord.registry().add(bob).unwrap();

        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        loop {
            if let ServerMessage::RoundState(_) = alice_rx.recv().await.unwrap() {
                break;
            }
        }
        drop(bob_rx);
        assert!(coord.registry().remove("bob"));

        let (_, winner) = next_round_over(&mut alice_rx).await;
        assert_eq!(winner.as_deref(), Some("bob"));
        coord.stop_handle().stop();

        let summaries = handle.await.unwrap();
        assert_eq!(summaries.len(), 1);
        let bob_snake = &summaries[0].final_arena.snakes[1];
        assert!(bob_snake.alive);
        assert_eq!(bob_snake.head().x, 37 - 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_limit_awards_longest_snake() {
        let coord = coordinator(test_config().with_max_round_ticks(5));
        let (alice, _alice_rx) = Seat::new("alice").unwrap();
        let (bob, mut bob_rx) = Seat::new("bob").unwrap();
        bob.steer(Direction::South);
        coord.registry().add(alice).unwrap();
        coord.registry().add(bob).unwrap();

        let runner = coord.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        next_round_over(&mut bob_rx).await;
        coord.stop_handle().stop();

        let summary = &handle.await.unwrap()[0];
        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.final_arena.alive_count(), 2);
        assert_eq!(summary.outcome.winner(), summary.final_arena.longest_snake());
    }
}
