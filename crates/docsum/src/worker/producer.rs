//! Submission side: one job record, one queue message.

use std::sync::Arc;

use crate::broadcast::JobProgressBroadcaster;
use crate::error::{DocsumError, QueueError};
use crate::job::{Job, JobId};
use crate::queue::{FileDescriptor, MessageQueue, QueueMessage};
use crate::store::JobStore;

pub struct Producer {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn MessageQueue>,
    topic: String,
    progress: Option<JobProgressBroadcaster>,
}

impl Producer {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn MessageQueue>, topic: impl Into<String>) -> Self {
        Self {
            store,
            queue,
            topic: topic.into(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.progress = Some(broadcaster);
        self
    }

    /// Publishes the message for an already created job. Returns the message id.
    pub fn publish(&self, job_id: &JobId, file: FileDescriptor) -> Result<i64, QueueError> {
        let message = QueueMessage::new(job_id.clone(), file);
        let payload = message.to_json().map_err(QueueError::Encode)?;
        let message_id = self.queue.publish(&self.topic, &payload)?;
        log::info!(
            "Queued job {} on '{}' as message {}",
            job_id,
            self.topic,
            message_id
        );
        Ok(message_id)
    }

    /// Creates the `pending` record, then publishes exactly one message for it.
    ///
    /// If publishing fails the record stays `pending`; it is never processed
    /// until resubmitted with [`Producer::publish`].
    pub fn submit(&self, job: &Job, file: FileDescriptor) -> Result<i64, DocsumError> {
        let _span = tracing::info_span!("submit", job_id = %job.id, file_type = %job.file_type.as_str())
            .entered();

        self.store.create(job)?;
        let file_name = file.original_name.clone();
        let message_id = self.publish(&job.id, file).map_err(|e| {
            log::error!("Job {} created but could not be queued: {}", job.id, e);
            e
        })?;

        if let Some(broadcaster) = &self.progress {
            broadcaster.start_job(job.id.as_str(), &file_name);
        }
        Ok(message_id)
    }
}
