//! Arena scenarios for DST.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// ARENA-001: Two snakes meet on the same cell
    HeadOn,

    /// ARENA-002: Two snakes swap head cells in one tick
    HeadSwap,

    /// ARENA-003: One snake drives into the wall, the other survives
    WallRun,

    /// ARENA-004: Free-for-all between bots over several rounds
    Melee,

    /// ARENA-005: A player disconnects mid-round and keeps going
    Dropout,

    /// ARENA-006: Waiting room fills up late; a third player slips in during grace
    LateJoin,

    /// ARENA-007: Same seed, same frames
    Replay,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::HeadOn,
            ScenarioId::HeadSwap,
            ScenarioId::WallRun,
            ScenarioId::Melee,
            ScenarioId::Dropout,
            ScenarioId::LateJoin,
            ScenarioId::Replay,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::HeadOn => "head_on",
            ScenarioId::HeadSwap => "head_swap",
            ScenarioId::WallRun => "wall_run",
            ScenarioId::Melee => "melee",
            ScenarioId::Dropout => "dropout",
            ScenarioId::LateJoin => "late_join",
            ScenarioId::Replay => "replay",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::HeadOn => "Two snakes collide head-on; nobody wins",
            ScenarioId::HeadSwap => "Adjacent heads swap cells; both die",
            ScenarioId::WallRun => "One snake leaves the board, the other wins",
            ScenarioId::Melee => "Seekers and random walkers, several rounds",
            ScenarioId::Dropout => "A disconnected snake freezes its heading and can still win",
            ScenarioId::LateJoin => "Players arrive while waiting and during the grace period",
            ScenarioId::Replay => "Two runs from one seed broadcast identical frames",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "head_on" | "headon" | "arena-001" => Ok(ScenarioId::HeadOn),
            "head_swap" | "headswap" | "arena-002" => Ok(ScenarioId::HeadSwap),
            "wall_run" | "wallrun" | "arena-003" => Ok(ScenarioId::WallRun),
            "melee" | "arena-004" => Ok(ScenarioId::Melee),
            "dropout" | "arena-005" => Ok(ScenarioId::Dropout),
            "late_join" | "latejoin" | "arena-006" => Ok(ScenarioId::LateJoin),
            "replay" | "arena-007" => Ok(ScenarioId::Replay),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
