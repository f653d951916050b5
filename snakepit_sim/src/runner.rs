//! Scenario runner - executes arena test scenarios.

use crate::error::SimError;
use crate::exporter::RoundExport;
use crate::player::Strategy;
use crate::scenarios::ScenarioId;
use crate::world::{PlayerSpec, SimConfig, SimOutcome, SimWorld};

use snakepit_core::{Direction, Position, RoundConfig, RoundOutcome, ServerMessage};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Melee and replay rounds are cut off after this many ticks.
const MELEE_TICK_LIMIT: u64 = 1_000;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Rounds finished
    pub rounds: usize,

    /// Total ticks over all rounds
    pub ticks: u64,

    /// Final virtual time in seconds
    pub virtual_time_secs: f64,

    /// Winner of the last round
    pub winner: Option<String>,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

/// Runs arena scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Bots in free-for-all scenarios
    players: usize,

    /// Rounds per free-for-all run
    rounds: u64,

    /// Board width for free-for-all scenarios
    width: i32,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, players: usize) -> Self {
        Self {
            seed,
            players,
            rounds: 1,
            width: 50,
        }
    }

    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_width(mut self, width: i32) -> Self {
        self.width = width;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.record(scenario).0
    }

    /// Runs a scenario and also returns every frame it broadcast.
    pub fn record(&self, scenario: ScenarioId) -> (ScenarioResult, RoundExport) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let mut export = RoundExport::new(scenario.name(), self.seed);
        let (outcome, verdict) = match self.simulate(scenario) {
            Ok(outcome) => {
                let verdict = self.verify(scenario, &outcome);
                (Some(outcome), verdict)
            }
            Err(e) => (None, Err(e.to_string())),
        };

        if let Some(outcome) = &outcome {
            for frame in &outcome.frames {
                export.add_frame(frame.clone());
            }
            for summary in &outcome.summaries {
                export.add_round(summary);
            }
        }

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: verdict.is_ok(),
            rounds: outcome.as_ref().map_or(0, |o| o.summaries.len()),
            ticks: outcome.as_ref().map_or(0, |o| o.total_ticks()),
            virtual_time_secs: outcome
                .as_ref()
                .map_or(0.0, |o| o.virtual_time.as_secs_f64()),
            winner: outcome
                .as_ref()
                .and_then(|o| o.last_winner().map(str::to_string)),
            failure_reason: verdict.err(),
        };

        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    /// Builds the world configuration for a scenario.
    pub fn config_for(&self, scenario: ScenarioId) -> SimConfig {
        match scenario {
            ScenarioId::HeadOn => self.duel(20, Direction::East, Direction::West),
            ScenarioId::HeadSwap => self.duel(22, Direction::East, Direction::West),
            ScenarioId::WallRun => self.duel(20, Direction::North, Direction::West),
            ScenarioId::Melee | ScenarioId::Replay => self.melee(),
            ScenarioId::Dropout => SimConfig {
                seed: self.seed,
                round: RoundConfig::default().with_board_width(30).with_shuffle(false),
                players: vec![
                    PlayerSpec::new("north", Strategy::Fixed(Direction::North)),
                    PlayerSpec::new("leaver", Strategy::Fixed(Direction::West)).leaving_after(3),
                    PlayerSpec::new("south", Strategy::Fixed(Direction::South)),
                ],
                ..Default::default()
            },
            ScenarioId::LateJoin => SimConfig {
                seed: self.seed,
                round: RoundConfig::default()
                    .with_board_width(self.width)
                    .with_max_round_ticks(MELEE_TICK_LIMIT),
                players: vec![
                    PlayerSpec::new("early", Strategy::AppleSeeker),
                    PlayerSpec::new("late", Strategy::AppleSeeker)
                        .joining_after(Duration::from_secs(5)),
                    // Lands inside the grace period the late joiner opens
                    PlayerSpec::new("grace", Strategy::AppleSeeker)
                        .joining_after(Duration::from_secs(6)),
                ],
                ..Default::default()
            },
        }
    }

    fn duel(&self, width: i32, alice: Direction, bob: Direction) -> SimConfig {
        SimConfig {
            seed: self.seed,
            round: RoundConfig::default().with_board_width(width).with_shuffle(false),
            players: vec![
                PlayerSpec::new("alice", Strategy::Fixed(alice)),
                PlayerSpec::new("bob", Strategy::Fixed(bob)),
            ],
            ..Default::default()
        }
    }

    fn melee(&self) -> SimConfig {
        let count = self.players.max(2).min(self.width.max(2) as usize);
        let players = (0..count)
            .map(|i| {
                let strategy = if i % 2 == 0 {
                    Strategy::AppleSeeker
                } else {
                    Strategy::RandomWalk
                };
                PlayerSpec::new(format!("bot-{:02}", i), strategy)
            })
            .collect();

        SimConfig {
            seed: self.seed,
            round: RoundConfig::default()
                .with_board_width(self.width)
                .with_max_round_ticks(MELEE_TICK_LIMIT),
            players,
            rounds: self.rounds,
            ..Default::default()
        }
    }

    fn simulate(&self, scenario: ScenarioId) -> Result<SimOutcome, SimError> {
        SimWorld::new(self.config_for(scenario))?.run_blocking()
    }

    fn verify(&self, scenario: ScenarioId, outcome: &SimOutcome) -> Result<(), String> {
        check_frames(outcome)?;

        match scenario {
            ScenarioId::HeadOn => expect_single_round(outcome, RoundOutcome::NoWinner, 5),
            ScenarioId::HeadSwap => expect_single_round(outcome, RoundOutcome::NoWinner, 6),
            ScenarioId::WallRun => {
                expect_single_round(outcome, RoundOutcome::Winner(1), 6)?;
                expect_winner(outcome, "bob")
            }
            ScenarioId::Melee => self.verify_melee(outcome),
            ScenarioId::Dropout => {
                expect_single_round(outcome, RoundOutcome::Winner(1), 8)?;
                expect_winner(outcome, "leaver")?;
                let left = outcome
                    .players
                    .iter()
                    .any(|p| p.name == "leaver" && p.left);
                if !left {
                    return Err("leaver never disconnected".to_string());
                }
                Ok(())
            }
            ScenarioId::LateJoin => {
                let first = outcome.messages().next();
                if first != Some(&ServerMessage::waiting(1, 2)) {
                    return Err(format!("expected a waiting notice first, got {:?}", first));
                }
                let prepared_at = outcome
                    .frames
                    .iter()
                    .find(|f| f.message == ServerMessage::RoundPreparation {})
                    .map(|f| f.time_ms);
                if prepared_at != Some(5_000) {
                    return Err(format!("expected preparation at 5000ms, got {:?}", prepared_at));
                }
                match outcome.summaries.as_slice() {
                    [summary] if summary.roster.len() == 3 => Ok(()),
                    [summary] => Err(format!(
                        "grace-period joiner missed the round: {:?}",
                        summary.roster
                    )),
                    other => Err(format!("expected one round, got {}", other.len())),
                }
            }
            ScenarioId::Replay => {
                self.verify_melee(outcome)?;
                let again = self
                    .simulate(scenario)
                    .map_err(|e| format!("second run failed: {}", e))?;
                if again.frames != outcome.frames {
                    let diverged = again
                        .frames
                        .iter()
                        .zip(&outcome.frames)
                        .position(|(a, b)| a != b)
                        .unwrap_or(again.frames.len().min(outcome.frames.len()));
                    return Err(format!("runs diverged at frame {}", diverged));
                }
                if again.summaries != outcome.summaries {
                    return Err("round summaries differ between runs".to_string());
                }
                Ok(())
            }
        }
    }

    fn verify_melee(&self, outcome: &SimOutcome) -> Result<(), String> {
        if outcome.summaries.len() as u64 != self.rounds {
            return Err(format!(
                "expected {} round(s), got {}",
                self.rounds,
                outcome.summaries.len()
            ));
        }

        for summary in &outcome.summaries {
            let alive = summary.final_arena.alive_count();
            if alive > 1 && summary.ticks < MELEE_TICK_LIMIT {
                return Err(format!(
                    "round {} ended with {} snakes alive",
                    summary.round, alive
                ));
            }
            if let Some(slot) = summary.outcome.winner() {
                if !summary.final_arena.snakes[slot].alive {
                    return Err(format!("round {} winner is dead", summary.round));
                }
                if summary.winner.as_deref() != Some(summary.roster[slot].as_str()) {
                    return Err(format!("round {} winner name mismatch", summary.round));
                }
            }
        }
        Ok(())
    }
}

fn expect_single_round(
    outcome: &SimOutcome,
    expected: RoundOutcome,
    ticks: u64,
) -> Result<(), String> {
    let [summary] = outcome.summaries.as_slice() else {
        return Err(format!("expected one round, got {}", outcome.summaries.len()));
    };
    if summary.outcome != expected {
        return Err(format!("expected {:?}, got {:?}", expected, summary.outcome));
    }
    if summary.ticks != ticks {
        return Err(format!("expected {} ticks, got {}", ticks, summary.ticks));
    }
    Ok(())
}

fn expect_winner(outcome: &SimOutcome, name: &str) -> Result<(), String> {
    match outcome.last_winner() {
        Some(winner) if winner == name => Ok(()),
        other => Err(format!("expected {} to win, got {:?}", name, other)),
    }
}

/// Every broadcast arena keeps live bodies on the board and apart.
fn check_frames(outcome: &SimOutcome) -> Result<(), String> {
    for (index, message) in outcome.messages().enumerate() {
        let ServerMessage::RoundState(state) = message else {
            continue;
        };
        let mut seen: HashSet<Position> = HashSet::new();
        for player in &state.players {
            for piece in &player.pieces {
                if !piece.is_inside(state.width, state.height) {
                    return Err(format!("frame {}: {} off the board", index, player.name));
                }
                if !seen.insert(*piece) {
                    return Err(format!("frame {}: overlapping bodies at {:?}", index, piece));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_on_scenario() {
        let result = ScenarioRunner::new(42, 2).run(ScenarioId::HeadOn);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.ticks, 5);
        assert_eq!(result.winner, None);
    }

    #[test]
    fn test_head_swap_scenario() {
        let result = ScenarioRunner::new(42, 2).run(ScenarioId::HeadSwap);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_wall_run_scenario() {
        let result = ScenarioRunner::new(7, 2).run(ScenarioId::WallRun);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.winner.as_deref(), Some("bob"));
    }

    #[test]
    fn test_dropout_scenario() {
        let result = ScenarioRunner::new(42, 3).run(ScenarioId::Dropout);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.winner.as_deref(), Some("leaver"));
    }

    #[test]
    fn test_late_join_scenario() {
        let result = ScenarioRunner::new(42, 2)
            .with_width(20)
            .run(ScenarioId::LateJoin);
        assert!(result.passed, "{:?}", result.failure_reason);
        // Two-second grace from the 5s join, then at least one tick
        assert!(result.virtual_time_secs >= 7.2);
    }

    #[test]
    fn test_melee_multiple_rounds() {
        let result = ScenarioRunner::new(42, 4)
            .with_rounds(2)
            .with_width(24)
            .run(ScenarioId::Melee);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.rounds, 2);
    }

    #[test]
    fn test_replay_deterministic() {
        let result = ScenarioRunner::new(1234, 4)
            .with_width(24)
            .run(ScenarioId::Replay);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_record_exports_frames() {
        let (result, export) = ScenarioRunner::new(42, 2).record(ScenarioId::HeadOn);
        assert!(export.passed);
        assert_eq!(export.rounds.len(), 1);
        // Preparation, opening snapshot, one state per tick, round over
        assert_eq!(export.frames.len() as u64, result.ticks + 3);
    }

    #[test]
    fn test_bad_width_fails_cleanly() {
        let result = ScenarioRunner::new(42, 2).with_width(1).run(ScenarioId::Melee);
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("board_width"));
    }
}
