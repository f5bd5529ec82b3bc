//! Durable at-least-once message queue with consumer groups.
//!
//! A message published to a topic is delivered to every consumer group
//! subscribed to that topic, and to exactly one consumer within a group at a
//! time. Receiving leases the message; it reappears for the group if the
//! lease runs out before `ack`, or after the delay given to `nack`.

use std::sync::Arc;
use std::time::Duration;

use crate::error::QueueError;

pub mod message;
pub mod sqlite;

pub use message::{FileDescriptor, QueueMessage, INLINE_PREFIX};
pub use sqlite::SqliteQueue;

pub trait MessageQueue: Send + Sync {
    /// Appends a payload to `topic` and returns its message id.
    fn publish(&self, topic: &str, payload: &str) -> Result<i64, QueueError>;

    /// Joins `group_id` on `topic`.
    fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn Subscription>, QueueError>;
}

pub trait Subscription: Send {
    /// Waits up to `timeout` for the next visible message.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Delivery>, QueueError>;
}

/// Settles deliveries on behalf of a subscription.
pub trait Acknowledger: Send + Sync {
    fn ack(&self, message_id: i64) -> Result<(), QueueError>;
    fn nack(&self, message_id: i64, delay: Duration) -> Result<(), QueueError>;
}

/// A leased message.
pub struct Delivery {
    pub message_id: i64,
    pub payload: String,
    /// How many times this group has received the message, this one included.
    pub attempts: u32,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(message_id: i64, payload: String, attempts: u32, acker: Arc<dyn Acknowledger>) -> Self {
        Self {
            message_id,
            payload,
            attempts,
            acker,
        }
    }

    pub fn is_redelivery(&self) -> bool {
        self.attempts > 1
    }

    /// Settles the message for good.
    pub fn ack(&self) -> Result<(), QueueError> {
        self.acker.ack(self.message_id)
    }

    /// Gives the message back; it becomes visible again after `delay`.
    pub fn nack(&self, delay: Duration) -> Result<(), QueueError> {
        self.acker.nack(self.message_id, delay)
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message_id", &self.message_id)
            .field("attempts", &self.attempts)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
