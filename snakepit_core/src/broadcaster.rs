//! Fan-out of server messages to observers and round participants.
//!
//! The broadcaster keeps its own lock, separate from the registry's, so a
//! slow fan-out never holds up a join or leave (and the other way round).
//! It remembers the last message sent so a newly subscribed observer is
//! caught up straight away.

use crate::participant::{Observer, Participant};
use crate::protocol::ServerMessage;
use snakepit_env::ObserverId;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

struct BroadcastState {
    observers: Vec<(ObserverId, Arc<dyn Observer>)>,
    last_message: Option<ServerMessage>,
}

/// Pushes every coordinator message to all observers plus the given
/// recipients.
pub struct Broadcaster {
    state: Mutex<BroadcastState>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BroadcastState {
                observers: Vec::new(),
                last_message: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BroadcastState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sends `message` to every observer and every recipient in `roster`.
    ///
    /// A failed delivery is logged and skipped; it never stops the fan-out.
    /// Returns the number of successful deliveries.
    pub fn broadcast(&self, message: ServerMessage, roster: &[Arc<dyn Participant>]) -> usize {
        let mut state = self.lock();
        let mut delivered = 0;

        for (id, observer) in &state.observers {
            match observer.deliver(&message) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Observer {} missed {}: {}", id, message.kind(), e),
            }
        }

        for participant in roster {
            match participant.deliver(&message) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Participant {} missed {}: {}", participant.id(), message.kind(), e),
            }
        }

        state.last_message = Some(message);
        delivered
    }

    /// Adds an observer and immediately sends it the last message, if any.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId::new();
        let mut state = self.lock();

        if let Some(last) = &state.last_message {
            if let Err(e) = observer.deliver(last) {
                debug!("Catch-up for observer {} failed: {}", id, e);
            }
        }

        state.observers.push((id, observer));
        debug!("Observer {} subscribed ({} total)", id, state.observers.len());
        id
    }

    /// Removes an observer. Returns whether it was subscribed.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut state = self.lock();
        let before = state.observers.len();
        state.observers.retain(|(observer_id, _)| *observer_id != id);
        before != state.observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// The most recent message broadcast.
    pub fn last_message(&self) -> Option<ServerMessage> {
        self.lock().last_message.clone()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
