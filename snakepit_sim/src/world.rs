//! SimWorld - The simulation harness container.
//!
//! Wires a [`SimContext`], registry, broadcaster, coordinator and a set of
//! bots together, runs until the requested number of rounds has finished
//! and hands back everything that was observed.

use crate::context::SimContext;
use crate::error::SimError;
use crate::exporter::RecordedFrame;
use crate::player::{PlayerReport, SimulatedPlayer, Strategy};

use snakepit_core::{
    Broadcaster, Observer, ParticipantRegistry, RoundConfig, RoundCoordinator, RoundSummary, Seat,
    ServerMessage,
};
use snakepit_env::{ArenaContext, EnvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Keeps player seeds clear of the per-round seeds the coordinator derives.
const PLAYER_SEED_BASE: u64 = 1 << 32;

/// One bot taking part in a run.
#[derive(Debug, Clone)]
pub struct PlayerSpec {
    pub name: String,
    pub strategy: Strategy,

    /// Join this long after the run starts instead of up front
    pub join_after: Option<Duration>,

    /// Disconnect after this many round-state frames
    pub leave_after_frames: Option<u64>,
}

impl PlayerSpec {
    pub fn new(name: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            join_after: None,
            leave_after_frames: None,
        }
    }

    pub fn joining_after(mut self, delay: Duration) -> Self {
        self.join_after = Some(delay);
        self
    }

    pub fn leaving_after(mut self, frames: u64) -> Self {
        self.leave_after_frames = Some(frames);
        self
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Coordinator configuration
    pub round: RoundConfig,

    pub players: Vec<PlayerSpec>,

    /// Stop after this many finished rounds
    pub rounds: u64,

    /// Virtual time without a single broadcast, once every joiner is in,
    /// before the run is declared stalled
    pub idle_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            round: RoundConfig::default().with_max_round_ticks(2_000),
            players: Vec::new(),
            rounds: 1,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct SimOutcome {
    pub summaries: Vec<RoundSummary>,

    /// Every broadcast, as an observer saw it
    pub frames: Vec<RecordedFrame>,

    /// One report per bot, sorted by name
    pub players: Vec<PlayerReport>,

    pub virtual_time: Duration,
}

impl SimOutcome {
    pub fn total_ticks(&self) -> u64 {
        self.summaries.iter().map(|s| s.ticks).sum()
    }

    /// Winner of the last round played.
    pub fn last_winner(&self) -> Option<&str> {
        self.summaries.last().and_then(|s| s.winner.as_deref())
    }

    pub fn messages(&self) -> impl Iterator<Item = &ServerMessage> {
        self.frames.iter().map(|f| &f.message)
    }
}

/// Observer that records every broadcast with its virtual timestamp.
struct FrameRecorder {
    context: Arc<SimContext>,
    frames: Mutex<Vec<RecordedFrame>>,
}

impl FrameRecorder {
    fn new(context: Arc<SimContext>) -> Self {
        Self {
            context,
            frames: Mutex::new(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn take(&self) -> Vec<RecordedFrame> {
        let mut frames = self.frames.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *frames)
    }
}

impl Observer for FrameRecorder {
    fn deliver(&self, message: &ServerMessage) -> Result<(), EnvError> {
        let frame = RecordedFrame {
            time_ms: self.context.now().as_millis() as u64,
            message: message.clone(),
        };
        self.frames
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(frame);
        Ok(())
    }
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    registry: Arc<ParticipantRegistry>,
    broadcaster: Arc<Broadcaster>,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.round.validate()?;

        let context = SimContext::shared(config.seed);
        let registry = Arc::new(config.round.registry());

        Ok(Self {
            config,
            context,
            registry,
            broadcaster: Arc::new(Broadcaster::new()),
        })
    }

    pub fn registry(&self) -> &Arc<ParticipantRegistry> {
        &self.registry
    }

    fn last_join(&self) -> Duration {
        self.config
            .players
            .iter()
            .filter_map(|p| p.join_after)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Runs on a fresh current-thread runtime with a paused clock.
    pub fn run_blocking(self) -> Result<SimOutcome, SimError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()?;
        runtime.block_on(self.run())
    }

    /// Runs until `config.rounds` rounds have finished.
    ///
    /// Must be driven by a current-thread runtime with a paused clock for
    /// the run to be reproducible.
    pub async fn run(self) -> Result<SimOutcome, SimError> {
        let started = self.context.now();
        info!(
            "Simulating {} round(s) with {} player(s) (seed={}, t={:?})",
            self.config.rounds,
            self.config.players.len(),
            self.config.seed,
            started
        );

        let recorder = Arc::new(FrameRecorder::new(self.context.clone()));
        let recorder_id = self.broadcaster.subscribe(recorder.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();

        for (index, spec) in self.config.players.iter().enumerate() {
            let seed = self.context.derive_seed(PLAYER_SEED_BASE + index as u64);
            let (seat, inbox) = Seat::new(spec.name.clone())?;
            let mut player = SimulatedPlayer::new(
                seat.clone(),
                inbox,
                self.registry.clone(),
                spec.strategy,
                seed,
            );
            if let Some(frames) = spec.leave_after_frames {
                player = player.leave_after(frames);
            }

            let shutdown = shutdown_rx.clone();
            let reports = report_tx.clone();

            match spec.join_after {
                None => {
                    self.registry.add(seat)?;
                    self.context.spawn(&spec.name, async move {
                        let _ = reports.send(player.run(shutdown).await);
                    });
                }
                Some(delay) => {
                    let context = self.context.clone();
                    let registry = self.registry.clone();
                    self.context.spawn(&spec.name, async move {
                        context.sleep(delay).await;
                        let report = match registry.add(seat) {
                            Ok(()) => {
                                debug!("{} joined late at t={:?}", player.name(), context.now());
                                player.run(shutdown).await
                            }
                            Err(e) => {
                                warn!("Late joiner rejected: {}", e);
                                player.into_report()
                            }
                        };
                        let _ = reports.send(report);
                    });
                }
            }
        }
        drop(report_tx);

        let coordinator = Arc::new(RoundCoordinator::new(
            self.config.round.clone(),
            self.context.clone(),
            self.registry.clone(),
            self.broadcaster.clone(),
        ));
        let stop = coordinator.stop_handle();
        let mut rounds = coordinator.subscribe_rounds();
        let runner = coordinator.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        let stalled_at = tokio::select! {
            biased;
            _ = rounds_reached(&mut rounds, self.config.rounds) => None,
            at = watchdog(&self.context, &recorder, self.last_join(), self.config.idle_timeout) => Some(at),
        };
        let rounds_completed = *rounds.borrow();

        stop.stop();
        let joined = handle.await;

        let _ = shutdown_tx.send(true);
        let mut players = Vec::new();
        while let Some(report) = report_rx.recv().await {
            players.push(report);
        }
        players.sort_by(|a, b| a.name.cmp(&b.name));

        self.broadcaster.unsubscribe(recorder_id);

        if let Some(at) = stalled_at {
            warn!("Simulation stalled at t={:?}", at);
            return Err(SimError::Stalled {
                at,
                rounds_completed,
            });
        }

        let summaries = joined.map_err(|e| SimError::Coordinator(e.to_string()))?;
        let frames = recorder.take();
        let virtual_time = self.context.now();
        info!(
            "Simulation finished: {} round(s), {} frame(s), t={:?}",
            summaries.len(),
            frames.len(),
            virtual_time
        );

        Ok(SimOutcome {
            summaries,
            frames,
            players,
            virtual_time,
        })
    }
}

async fn rounds_reached(rounds: &mut watch::Receiver<u64>, target: u64) {
    let sender_alive = rounds.wait_for(|n| *n >= target).await.is_ok();
    if !sender_alive {
        std::future::pending::<()>().await;
    }
}

/// Resolves with the current virtual time once a whole `idle_timeout`
/// passes without a broadcast. Counting starts after `last_join`.
async fn watchdog(
    context: &SimContext,
    recorder: &FrameRecorder,
    last_join: Duration,
    idle_timeout: Duration,
) -> Duration {
    context.sleep(last_join).await;
    let mut seen = recorder.len();
    loop {
        context.sleep(idle_timeout).await;
        let frames = recorder.len();
        if frames == seen {
            return context.now();
        }
        seen = frames;
    }
}
