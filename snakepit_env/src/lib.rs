//! Snakepit Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the round coordinator
//! run against either the **Production** clock (tokio) or a **Simulated**
//! virtual clock.
//!
//! # Core Concept
//!
//! The coordinator never touches wall-clock time or OS entropy directly:
//! - Time (`now()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - Randomness (`derive_seed()`)
//!
//! Everything flows through [`ArenaContext`], so a simulated context with a
//! fixed seed replays a round exactly.
//!
//! # Example
//!
//! ```ignore
//! use snakepit_env::ArenaContext;
//!
//! async fn tick_loop<Ctx: ArenaContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(200)).await;
//!         tick();
//!     }
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::ArenaContext;
pub use types::ObserverId;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
