//! Snakepit Deterministic Simulation Testing (DST) Harness
//!
//! Runs the real round coordinator against bot players on a virtual clock.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: the virtual clock only moves when a task sleeps on it
//! - **Scheduling**: everything runs on one current-thread runtime
//! - **Randomness**: roster shuffles, apple placement and bot decisions all
//!   derive from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (virtual clock + seed derivation)         │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                                     │
//! │  ┌────▼─────────────┐   RoundState   ┌──────────────────┐   │
//! │  │ RoundCoordinator │───────────────►│ SimulatedPlayer  │   │
//! │  │                  │◄───────────────│  (Seat + bot)    │   │
//! │  └────────┬─────────┘   direction    └──────────────────┘   │
//! │           │ every broadcast                                 │
//! │  ┌────────▼─────────┐                                       │
//! │  │  FrameRecorder   │──► RoundExport (JSON)                 │
//! │  └──────────────────┘                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use snakepit_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 4).run(ScenarioId::Melee);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod player;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{ExportedRound, RecordedFrame, RoundExport};
pub use player::{PlayerReport, SimulatedPlayer, Strategy};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use world::{PlayerSpec, SimConfig, SimOutcome, SimWorld};
