//! Participant registry - the waiting room.
//!
//! Holds whoever is connected right now, independent of any round in
//! progress. A round takes a [`snapshot`](ParticipantRegistry::snapshot) at
//! its start and never looks back, so leaving the registry does not pull a
//! snake out of a running round.
//!
//! Membership changes are signalled on a `watch` channel carrying a
//! generation counter. Several changes before the coordinator looks collapse
//! into one wake-up.

use crate::participant::{validate_identity, Observer, Participant};
use crate::protocol::ServerMessage;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Why a participant was turned away. Registry state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Another connected participant already uses this identity
    #[error("duplicate participant identity: {0}")]
    DuplicateIdentity(String),

    /// Identity is empty, blank or longer than 16 characters
    #[error("invalid participant identity: {0:?}")]
    InvalidIdentity(String),

    /// More participants than the board has columns
    #[error("arena is full ({0} participants)")]
    ArenaFull(usize),
}

/// Receiver side of the membership-change signal.
pub type RosterWatch = watch::Receiver<u64>;

/// Concurrency-safe set of connected participants.
pub struct ParticipantRegistry {
    /// Connected participants, in join order
    members: Mutex<Vec<Arc<dyn Participant>>>,

    /// Bumped on every add/remove
    changed: watch::Sender<u64>,

    /// Population needed to start a round (reported in waiting notices)
    required: usize,

    /// Hard cap on members
    capacity: usize,
}

impl ParticipantRegistry {
    /// Creates an empty registry.
    ///
    /// `required` is only used for the waiting notice sent on admission;
    /// `capacity` bounds how many participants may be connected at once.
    pub fn new(required: usize, capacity: usize) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            members: Mutex::new(Vec::new()),
            changed,
            required,
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Participant>>> {
        self.members.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn signal_changed(&self) {
        self.changed.send_modify(|generation| *generation += 1);
    }

    /// Admits a participant.
    ///
    /// The newcomer immediately receives a waiting notice, since it may
    /// have joined while a round is already running.
    pub fn add(&self, participant: Arc<dyn Participant>) -> Result<(), AdmissionError> {
        let id = participant.id().to_string();
        validate_identity(&id)?;

        let mut members = self.lock();
        if members.iter().any(|m| m.id() == id) {
            return Err(AdmissionError::DuplicateIdentity(id));
        }
        if members.len() >= self.capacity {
            return Err(AdmissionError::ArenaFull(self.capacity));
        }

        if let Err(e) = participant.deliver(&ServerMessage::waiting(members.len() + 1, self.required)) {
            debug!("Welcome notice to {} failed: {}", id, e);
        }

        members.push(participant);
        info!("Participant {} joined ({} connected)", id, members.len());
        self.signal_changed();
        Ok(())
    }

    /// Removes a participant by identity. Returns whether anyone was removed.
    ///
    /// A round already in progress keeps its own roster and is unaffected.
    pub fn remove(&self, id: &str) -> bool {
        let mut members = self.lock();
        let Some(index) = members.iter().position(|m| m.id() == id) else {
            return false;
        };
        members.remove(index);
        info!("Participant {} left ({} connected)", id, members.len());
        self.signal_changed();
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().iter().any(|m| m.id() == id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies the current membership, in join order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Participant>> {
        self.lock().clone()
    }

    /// Subscribes to membership changes.
    pub fn watch(&self) -> RosterWatch {
        self.changed.subscribe()
    }

    /// Marks all pending changes as seen and returns the membership, as one
    /// atomic step. Any change after this call will wake `watch` again.
    pub fn acknowledge(&self, watch: &mut RosterWatch) -> Vec<Arc<dyn Participant>> {
        let members = self.lock();
        let _ = watch.borrow_and_update();
        members.clone()
    }
}
