use crate::broadcast::job_progress::{JobPhase, JobProgressBroadcaster, JobProgressTracker};

use super::error::Stage;

/// Events emitted by the pipeline while a job runs.
/// Extracted text is never part of an event (can be large).
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        message: String,
    },
    Completed {
        word_count: u64,
        confidence: f64,
        provenance: String,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Used when nobody listens.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events to the broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
}

impl BroadcastProgress {
    pub fn new(job_id: &str, file_name: &str, broadcaster: &JobProgressBroadcaster) -> Self {
        Self {
            tracker: broadcaster.track(job_id, file_name),
        }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => {
                self.tracker.update_phase(phase, &message);
            }
            ProgressEvent::Completed {
                word_count,
                confidence,
                provenance,
            } => {
                self.tracker.completed(word_count, confidence, &provenance);
            }
            ProgressEvent::Failed { stage, error } => {
                self.tracker.failed(stage.as_str(), &error);
            }
        }
    }
}
