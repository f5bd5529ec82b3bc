//! One consumer loop: receive, run the pipeline, settle the delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};

use crate::error::QueueError;
use crate::pipeline::{Outcome, Pipeline};
use crate::queue::{Delivery, Subscription};

pub struct Consumer {
    pipeline: Arc<Pipeline>,
    subscription: Box<dyn Subscription>,
    receive_timeout: Duration,
}

impl Consumer {
    pub fn new(pipeline: Arc<Pipeline>, subscription: Box<dyn Subscription>, receive_timeout: Duration) -> Self {
        Self {
            pipeline,
            subscription,
            receive_timeout,
        }
    }

    /// Handles at most one delivery. `Ok(None)` when nothing arrived in time.
    pub fn poll_once(&mut self) -> Result<Option<Outcome>, QueueError> {
        let Some(delivery) = self.subscription.receive(self.receive_timeout)? else {
            return Ok(None);
        };

        if delivery.is_redelivery() {
            debug!(
                "Message {} redelivered (attempt {})",
                delivery.message_id, delivery.attempts
            );
        }

        let outcome = self.pipeline.process(&delivery.payload);
        self.settle(&delivery, &outcome);
        Ok(Some(outcome))
    }

    fn settle(&self, delivery: &Delivery, outcome: &Outcome) {
        if outcome.should_ack() {
            // A lost ack means a redelivery, which the status guard absorbs.
            if let Err(e) = delivery.ack() {
                error!("Failed to acknowledge message {}: {}", delivery.message_id, e);
            }
            return;
        }

        let delay = self.pipeline.retry_policy().delay_for(delivery.attempts);
        warn!(
            "Returning message {} to the queue for redelivery in {:?}",
            delivery.message_id, delay
        );
        if let Err(e) = delivery.nack(delay) {
            error!("Failed to release message {}: {}", delivery.message_id, e);
        }
    }

    /// Runs until `shutdown` is raised.
    pub fn run(&mut self, worker_id: usize, shutdown: &AtomicBool, mut on_outcome: impl FnMut(Outcome)) {
        debug!("Consumer {} started", worker_id);

        while !shutdown.load(Ordering::Relaxed) {
            match self.poll_once() {
                Ok(Some(outcome)) => on_outcome(outcome),
                Ok(None) => continue,
                Err(e) => {
                    error!("Consumer {} could not receive: {}", worker_id, e);
                    std::thread::sleep(self.receive_timeout);
                }
            }
        }

        debug!("Consumer {} stopped", worker_id);
    }
}
