//! JSON exporter for round replays.
//!
//! Every message the broadcaster pushed during a run, stamped with virtual
//! time, plus one summary per finished round.

use serde::{Deserialize, Serialize};
use snakepit_core::{RoundSummary, ServerMessage};
use std::fs::File;
use std::io::Write;

/// One broadcast message as an observer received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Virtual time of delivery in milliseconds
    pub time_ms: u64,

    pub message: ServerMessage,
}

/// Per-round results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRound {
    pub round: u64,
    pub ticks: u64,
    pub roster: Vec<String>,
    pub winner: Option<String>,
}

impl From<&RoundSummary> for ExportedRound {
    fn from(summary: &RoundSummary) -> Self {
        Self {
            round: summary.round,
            ticks: summary.ticks,
            roster: summary.roster.clone(),
            winner: summary.winner.clone(),
        }
    }
}

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Virtual duration in seconds
    pub duration_sec: f64,

    pub rounds: Vec<ExportedRound>,

    /// All frames
    pub frames: Vec<RecordedFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl RoundExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            rounds: Vec::new(),
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: RecordedFrame) {
        self.duration_sec = frame.time_ms as f64 / 1000.0;
        self.frames.push(frame);
    }

    pub fn add_round(&mut self, summary: &RoundSummary) {
        self.rounds.push(ExportedRound::from(summary));
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
