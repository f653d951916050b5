//! Simulation context implementing ArenaContext for deterministic testing.

use async_trait::async_trait;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use snakepit_env::ArenaContext;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;

/// Simulation context backed by a virtual clock and a master seed.
///
/// This implements `ArenaContext` using:
/// - tokio's paused clock, which jumps straight to the earliest pending
///   timer whenever every task is idle
/// - ChaCha8 seeds derived from one master seed
///
/// Each sleeper wakes at its own deadline, so concurrent sleeps overlap
/// instead of adding up. Run it on a current-thread runtime built with
/// `start_paused(true)`: task interleaving then depends only on the seed.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Virtual instant of simulation start, fixed on first use inside the
    /// runtime
    epoch: Arc<OnceLock<Instant>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            epoch: Arc::new(OnceLock::new()),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    fn epoch(&self) -> Instant {
        *self.epoch.get_or_init(Instant::now)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            epoch: Arc::clone(&self.epoch),
        }
    }
}

#[async_trait]
impl ArenaContext for SimContext {
    fn now(&self) -> Duration {
        self.epoch().elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.epoch();
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::trace!("spawning {} at t={:?}", name, self.now());
        tokio::spawn(future);
    }

    fn derive_seed(&self, extension: u64) -> u64 {
        // Combine master seed with extension for a deterministic stream
        let combined_seed = self.seed.wrapping_mul(0x517cc1b727220a95) ^ extension;
        ChaCha8Rng::seed_from_u64(combined_seed).next_u64()
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
