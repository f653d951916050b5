//! Error types for the simulation harness.

use snakepit_core::{AdmissionError, ConfigError};
use std::time::Duration;
use thiserror::Error;

/// Why a simulated run could not produce a result.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("player rejected: {0}")]
    Admission(#[from] AdmissionError),

    /// Nothing moved for too long: the coordinator is waiting for players
    /// that will never come
    #[error("simulation stalled at t={at:?} after {rounds_completed} round(s)")]
    Stalled { at: Duration, rounds_completed: u64 },

    #[error("coordinator task failed: {0}")]
    Coordinator(String),

    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
