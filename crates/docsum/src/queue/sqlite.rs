use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::{Acknowledger, Delivery, MessageQueue, Subscription};
use crate::db::{format_timestamp, queue_repo, Database};
use crate::error::QueueError;

/// Queue backed by the same SQLite file as the job store.
#[derive(Clone)]
pub struct SqliteQueue {
    db: Database,
    visibility_timeout: Duration,
    poll_interval: Duration,
}

impl SqliteQueue {
    pub fn new(db: Database, visibility_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            db,
            visibility_timeout,
            poll_interval,
        }
    }

    /// Messages of `topic` that `group_id` has not acknowledged.
    pub fn backlog(&self, topic: &str, group_id: &str) -> Result<u64, QueueError> {
        Ok(queue_repo::unacked_count(&self.db, topic, group_id)?)
    }
}

impl MessageQueue for SqliteQueue {
    fn publish(&self, topic: &str, payload: &str) -> Result<i64, QueueError> {
        let id = queue_repo::insert_message(&self.db, topic, payload, &format_timestamp(&Utc::now()))?;
        log::debug!("Published message {} to '{}'", id, topic);
        Ok(id)
    }

    fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn Subscription>, QueueError> {
        let consumer = format!("consumer-{}", uuid::Uuid::new_v4());
        log::debug!("{} joined group '{}' on '{}'", consumer, group_id, topic);
        Ok(Box::new(SqliteSubscription {
            db: self.db.clone(),
            topic: topic.to_string(),
            consumer,
            visibility_timeout: self.visibility_timeout,
            poll_interval: self.poll_interval,
            acker: Arc::new(SqliteAcknowledger {
                db: self.db.clone(),
                group_id: group_id.to_string(),
            }),
        }))
    }
}

struct SqliteSubscription {
    db: Database,
    topic: String,
    consumer: String,
    visibility_timeout: Duration,
    poll_interval: Duration,
    acker: Arc<SqliteAcknowledger>,
}

impl Subscription for SqliteSubscription {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            let now_ms = Utc::now().timestamp_millis();
            let lease_until = now_ms + self.visibility_timeout.as_millis() as i64;
            let claimed = queue_repo::claim_next(
                &self.db,
                &self.topic,
                &self.acker.group_id,
                &self.consumer,
                now_ms,
                lease_until,
            )?;

            if let Some(msg) = claimed {
                let acker: Arc<dyn Acknowledger> = self.acker.clone();
                return Ok(Some(Delivery::new(
                    msg.message_id,
                    msg.payload,
                    msg.attempts,
                    acker,
                )));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

struct SqliteAcknowledger {
    db: Database,
    group_id: String,
}

impl Acknowledger for SqliteAcknowledger {
    fn ack(&self, message_id: i64) -> Result<(), QueueError> {
        if !queue_repo::ack(&self.db, message_id, &self.group_id, &format_timestamp(&Utc::now()))? {
            return Err(QueueError::UnknownDelivery {
                delivery_id: message_id,
                group_id: self.group_id.clone(),
            });
        }
        Ok(())
    }

    fn nack(&self, message_id: i64, delay: Duration) -> Result<(), QueueError> {
        let visible_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        if !queue_repo::release(&self.db, message_id, &self.group_id, visible_at)? {
            log::warn!(
                "Nack for message {} in group '{}' ignored: already acknowledged",
                message_id,
                self.group_id
            );
        }
        Ok(())
    }
}
