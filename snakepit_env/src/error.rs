//! Error types for the Snakepit environment abstraction.

use thiserror::Error;

/// Errors raised while delivering a message to a single recipient.
///
/// These are always isolated to the failing recipient: the broadcaster logs
/// them and moves on to the next one.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The recipient's connection has gone away
    #[error("Recipient disconnected: {0}")]
    Disconnected(String),

    /// Send failed for another reason (buffer full, write error, ...)
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Message could not be encoded for the wire
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EnvError {
    /// Creates a disconnected error.
    pub fn disconnected(who: impl std::fmt::Display) -> Self {
        Self::Disconnected(who.to_string())
    }

    /// Creates a delivery error.
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::DeliveryFailed(msg.into())
    }

    /// Returns true when the recipient is gone for good.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}
