//! Job progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase of job processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Processing,
    Extracting,
    Transcribing,
    Summarizing,
    Completed,
    Failed,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Processing => write!(f, "Processing"),
            JobPhase::Extracting => write!(f, "Extracting text"),
            JobPhase::Transcribing => write!(f, "Transcribing audio"),
            JobPhase::Summarizing => write!(f, "Summarizing"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Coarse status carried by every event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub file_name: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Whether the summary came from a live provider or a fallback (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
    /// Pipeline stage that failed (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, file_name: &str, phase: JobPhase, message: &str) -> Self {
        let status = match phase {
            JobPhase::Completed => JobStatus::Completed,
            JobPhase::Failed => JobStatus::Failed,
            _ => JobStatus::Processing,
        };

        Self {
            job_id: job_id.to_string(),
            file_name: file_name.to_string(),
            phase,
            status,
            message: message.to_string(),
            timestamp: Utc::now(),
            word_count: None,
            confidence: None,
            provenance: None,
            stage: None,
            error: None,
        }
    }

    pub fn completed(
        job_id: &str,
        file_name: &str,
        word_count: u64,
        confidence: f64,
        provenance: &str,
    ) -> Self {
        Self {
            word_count: Some(word_count),
            confidence: Some(confidence),
            provenance: Some(provenance.to_string()),
            ..Self::new(
                job_id,
                file_name,
                JobPhase::Completed,
                "Summary ready",
            )
        }
    }

    pub fn failed(job_id: &str, file_name: &str, stage: &str, error: &str) -> Self {
        Self {
            stage: Some(stage.to_string()),
            error: Some(error.to_string()),
            ..Self::new(job_id, file_name, JobPhase::Failed, "Processing failed")
        }
    }
}

/// Fans job progress events out to every subscriber.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Tracker for a job that was just submitted; emits `queued`.
    pub fn start_job(&self, job_id: &str, file_name: &str) -> JobProgressTracker {
        let tracker = self.track(job_id, file_name);
        tracker.update_phase(JobPhase::Queued, "Job queued for processing");
        tracker
    }

    /// Tracker for a job picked up by a worker. Emits nothing by itself.
    pub fn track(&self, job_id: &str, file_name: &str) -> JobProgressTracker {
        JobProgressTracker::new(job_id, file_name, Arc::clone(&self.sender))
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single job.
pub struct JobProgressTracker {
    job_id: String,
    file_name: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(
        job_id: &str,
        file_name: &str,
        sender: Arc<broadcast::Sender<JobProgressEvent>>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            file_name: file_name.to_string(),
            sender,
        }
    }

    pub fn update_phase(&self, phase: JobPhase, message: &str) {
        let _ = self.sender.send(JobProgressEvent::new(
            &self.job_id,
            &self.file_name,
            phase,
            message,
        ));
    }

    pub fn completed(&self, word_count: u64, confidence: f64, provenance: &str) {
        let _ = self.sender.send(JobProgressEvent::completed(
            &self.job_id,
            &self.file_name,
            word_count,
            confidence,
            provenance,
        ));
    }

    pub fn failed(&self, stage: &str, error: &str) {
        let _ = self.sender.send(JobProgressEvent::failed(
            &self.job_id,
            &self.file_name,
            stage,
            error,
        ));
    }
}
