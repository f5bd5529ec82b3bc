use std::sync::Arc;

use tracing::{debug, info_span};

use crate::broadcast::job_progress::{JobPhase, JobProgressBroadcaster};
use crate::error::StoreError;
use crate::extractor::audio::transcript_extraction;
use crate::extractor::{ExtractorRegistry, MediaType};
use crate::job::{Job, JobId, ProcessingStatus};
use crate::provider::{
    FallbackReason, FallbackSummarizer, FallbackTranscriber, Providers, Summarizer,
};
use crate::queue::QueueMessage;
use crate::retry::RetryPolicy;
use crate::sanitize;
use crate::store::{JobStore, TransitionNote};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, Stage};
use super::payload::resolve_payload;
use super::progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
use super::timeout::run_with_deadline;

/// What happened to one delivery, and so how it must be settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The job reached `completed`.
    Completed { job_id: JobId },
    /// The job reached `failed`.
    Failed {
        job_id: JobId,
        stage: Stage,
        reason: String,
    },
    /// The job was already claimed or settled by an earlier delivery.
    Duplicate {
        job_id: JobId,
        status: ProcessingStatus,
    },
    /// Nothing to transition: undecodable message or unknown job.
    Discarded { reason: String },
    /// Infrastructure trouble outlasted the retry budget; redeliver later.
    Retry { reason: String },
}

impl Outcome {
    pub fn should_ack(&self) -> bool {
        !matches!(self, Outcome::Retry { .. })
    }
}

type StageResult<T> = Result<T, (Stage, PipelineError)>;

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    store: Arc<dyn JobStore>,
    extractors: Arc<ExtractorRegistry>,
    summarizer: Arc<dyn Summarizer>,
    retry: RetryPolicy,
    progress: Option<JobProgressBroadcaster>,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>, store: Arc<dyn JobStore>, providers: &Providers) -> Self {
        let extractors = Arc::new(ExtractorRegistry::new(
            Arc::clone(&providers.transcriber),
            config.max_payload_bytes,
        ));

        Self {
            config,
            store,
            extractors,
            summarizer: Arc::clone(&providers.summarizer),
            retry: RetryPolicy::default(),
            progress: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.progress = Some(broadcaster);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Drives one queue payload to a terminal job state, or explains why not.
    pub fn process(&self, payload: &str) -> Outcome {
        let message = match QueueMessage::from_json(payload) {
            Ok(message) => message,
            Err(e) => {
                let err = PipelineError::Decode(e);
                log::error!("Discarding message: {}", err);
                return Outcome::Discarded {
                    reason: err.to_string(),
                };
            }
        };

        let _pipeline_span = info_span!("pipeline",
            job_id = %message.job_id,
            file = %sanitize::redact_reference(&message.file.reference),
            media = %message.file.mime_type,
        )
        .entered();

        let mut job = match self.load(&message.job_id) {
            Ok(job) => job,
            Err(outcome) => return outcome,
        };

        // Guard: only a pending job is ours to run.
        if job.processing_status != ProcessingStatus::Pending {
            log::info!(
                "Job {} is already {}; acknowledging duplicate delivery",
                job.id,
                job.processing_status
            );
            return Outcome::Duplicate {
                job_id: job.id,
                status: job.processing_status,
            };
        }

        if let Err(outcome) = self.claim(&mut job) {
            return outcome;
        }

        let progress = self.reporter(&job);
        progress.report(ProgressEvent::Phase {
            phase: JobPhase::Processing,
            message: "Job picked up by worker".to_string(),
        });

        let mut ctx = PipelineContext::new(job, message.file);
        match self.run_stages(&mut ctx, progress.as_ref()) {
            Ok(()) => self.finish_completed(ctx, progress.as_ref()),
            Err((stage, err)) => self.finish_failed(ctx.job, stage, err, progress.as_ref()),
        }
    }

    fn reporter(&self, job: &Job) -> Box<dyn ProgressReporter> {
        match &self.progress {
            Some(broadcaster) => Box::new(BroadcastProgress::new(
                job.id.as_str(),
                &job.file_name,
                broadcaster,
            )),
            None => Box::new(NoopProgress),
        }
    }

    fn load(&self, id: &JobId) -> Result<Job, Outcome> {
        let _step = info_span!("load").entered();
        match self
            .retry
            .run("load job", || self.store.load(id), StoreError::is_retryable)
        {
            Ok(job) => Ok(job),
            Err(StoreError::NotFound(_)) => {
                log::warn!("Job {} not found; acknowledging message", id);
                Err(Outcome::Discarded {
                    reason: format!("job {} not found", id),
                })
            }
            Err(e) if e.is_retryable() => Err(Outcome::Retry {
                reason: e.to_string(),
            }),
            Err(e) => {
                log::error!("Job {} cannot be loaded: {}", id, e);
                Err(Outcome::Discarded {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// `pending -> processing`. Losing a race to another delivery is a duplicate.
    fn claim(&self, job: &mut Job) -> Result<(), Outcome> {
        let _step = info_span!("claim").entered();
        let id = job.id.clone();

        if let Err(e) = job.begin_processing() {
            log::info!("{}; acknowledging duplicate delivery", e);
            return Err(Outcome::Duplicate {
                job_id: id,
                status: job.processing_status,
            });
        }

        let note = TransitionNote::new(Stage::Claim.as_str());
        match self.retry.run(
            "claim job",
            || self.store.save_with_note(job, &note),
            StoreError::is_retryable,
        ) {
            Ok(()) => Ok(()),
            Err(e @ StoreError::Conflict { .. }) | Err(e @ StoreError::InvalidTransition { .. }) => {
                log::info!("Lost claim on job {} to another delivery: {}", id, e);
                Err(Outcome::Duplicate {
                    job_id: id,
                    status: ProcessingStatus::Processing,
                })
            }
            Err(e) if e.is_retryable() => Err(Outcome::Retry {
                reason: e.to_string(),
            }),
            Err(e) => {
                log::error!("Job {} cannot be claimed: {}", id, e);
                Err(Outcome::Discarded {
                    reason: e.to_string(),
                })
            }
        }
    }

    fn run_stages(&self, ctx: &mut PipelineContext, progress: &dyn ProgressReporter) -> StageResult<()> {
        let media = {
            let _step = info_span!("validate_media").entered();
            MediaType::parse(&ctx.file.mime_type)
                .map_err(|e| (Stage::Extract, PipelineError::from(e)))?
        };
        ctx.media = Some(media.clone());

        let payload = {
            let _step = info_span!("resolve").entered();
            resolve_payload(
                &ctx.file,
                &self.config.upload_directory,
                self.config.max_payload_bytes,
            )
            .map_err(|e| (Stage::Resolve, PipelineError::from(e)))?
        };

        self.step_extract(ctx, media, payload, progress)?;
        self.step_summarize(ctx, progress)?;
        Ok(())
    }

    fn step_extract(
        &self,
        ctx: &mut PipelineContext,
        media: MediaType,
        payload: Vec<u8>,
        progress: &dyn ProgressReporter,
    ) -> StageResult<()> {
        let (stage, deadline) = if media.is_audio() {
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Transcribing,
                message: "Transcribing audio...".to_string(),
            });
            (Stage::Transcribe, self.config.transcription_timeout)
        } else {
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Extracting,
                message: "Extracting text...".to_string(),
            });
            (Stage::Extract, self.config.extraction_timeout)
        };
        let _step = info_span!("extract", stage = %stage, bytes = payload.len()).entered();

        let payload = Arc::new(payload);
        let extractors = Arc::clone(&self.extractors);
        let work_payload = Arc::clone(&payload);
        let work_media = media.clone();
        let extraction = match run_with_deadline(stage, deadline, move || {
            extractors.extract_media(&work_payload, &work_media)
        }) {
            Ok(result) => result.map_err(|e| (stage, PipelineError::from(e)))?,
            // A stalled transcription provider degrades like any other
            // unreachable provider.
            Err(err @ PipelineError::DeadlineExceeded { .. }) if media.is_audio() => {
                let reason = FallbackReason::Transient(err.to_string());
                transcript_extraction(FallbackTranscriber::new().transcribe_with_reason(
                    &payload, &media, reason,
                ))
            }
            Err(err) => return Err((stage, err)),
        };

        debug!(chars = extraction.text.len(), "text extracted");
        if let Some(t) = &extraction.transcript {
            if t.provenance.is_fallback() {
                log::warn!("Transcript produced by {}", t.provenance);
            }
        }
        ctx.extraction = Some(extraction);
        Ok(())
    }

    fn step_summarize(&self, ctx: &mut PipelineContext, progress: &dyn ProgressReporter) -> StageResult<()> {
        let _step = info_span!("summarize").entered();
        progress.report(ProgressEvent::Phase {
            phase: JobPhase::Summarizing,
            message: "Generating summary...".to_string(),
        });

        let text = match &ctx.extraction {
            Some(extraction) => extraction.text.clone(),
            None => String::new(),
        };

        let summarizer = Arc::clone(&self.summarizer);
        let work_text = text.clone();
        let summary = match run_with_deadline(Stage::Summarize, self.config.summarization_timeout, move || {
            summarizer.summarize(&work_text)
        }) {
            Ok(result) => result.map_err(|e| (Stage::Summarize, PipelineError::from(e)))?,
            Err(err @ PipelineError::DeadlineExceeded { .. }) => FallbackSummarizer::new()
                .summarize_with_reason(&text, FallbackReason::Transient(err.to_string())),
            Err(err) => return Err((Stage::Summarize, err)),
        };

        if summary.provenance.is_fallback() {
            log::warn!("Summary produced by {}", summary.provenance);
        }
        ctx.summary = Some(summary);
        Ok(())
    }

    fn finish_completed(&self, ctx: PipelineContext, progress: &dyn ProgressReporter) -> Outcome {
        let _step = info_span!("persist").entered();

        let Some(results) = ctx.results() else {
            return self.finish_failed(
                ctx.job,
                Stage::Persist,
                PipelineError::Aborted {
                    stage: Stage::Persist,
                    reason: "stages finished without results".to_string(),
                },
                progress,
            );
        };
        let provenance = ctx.provenance_detail();
        let word_count = results.metadata.word_count;
        let confidence = results.metadata.confidence;

        let mut job = ctx.job;
        if let Err(e) = job.complete(results) {
            log::error!("{}", e);
            return Outcome::Duplicate {
                job_id: job.id.clone(),
                status: job.processing_status,
            };
        }

        let note = TransitionNote::new(Stage::Persist.as_str()).with_detail(provenance.clone());
        let completed = Outcome::Completed {
            job_id: job.id.clone(),
        };
        let outcome = self.persist(&mut job, &note, completed);
        if matches!(outcome, Outcome::Completed { .. }) {
            log::info!(
                "Job {} completed: {} words, confidence {:.2} ({})",
                job.id,
                word_count,
                confidence,
                provenance
            );
            progress.report(ProgressEvent::Completed {
                word_count,
                confidence,
                provenance,
            });
        }
        outcome
    }

    fn finish_failed(
        &self,
        mut job: Job,
        stage: Stage,
        err: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> Outcome {
        let _step = info_span!("persist_failure", stage = %stage).entered();
        let reason = err.to_string();
        log::error!("Job {} failed at stage '{}': {}", job.id, stage, reason);

        if let Err(e) = job.fail() {
            log::error!("{}", e);
            return Outcome::Duplicate {
                job_id: job.id.clone(),
                status: job.processing_status,
            };
        }

        let note = TransitionNote::new(stage.as_str()).with_detail(reason.clone());
        let failed = Outcome::Failed {
            job_id: job.id.clone(),
            stage,
            reason: reason.clone(),
        };
        let outcome = self.persist(&mut job, &note, failed);
        if matches!(outcome, Outcome::Failed { .. }) {
            progress.report(ProgressEvent::Failed {
                stage,
                error: reason,
            });
        }
        outcome
    }

    /// Writes a terminal state. The message is only acknowledged after this
    /// succeeds, so exhausted retries turn into a redelivery.
    fn persist(&self, job: &mut Job, note: &TransitionNote, success: Outcome) -> Outcome {
        match self.retry.run(
            "persist job",
            || self.store.save_with_note(job, note),
            StoreError::is_retryable,
        ) {
            Ok(()) => success,
            Err(e @ StoreError::Conflict { .. }) | Err(e @ StoreError::InvalidTransition { .. }) => {
                log::warn!("Job {} was settled elsewhere: {}", job.id, e);
                Outcome::Duplicate {
                    job_id: job.id.clone(),
                    status: job.processing_status,
                }
            }
            Err(e) => {
                log::error!("Could not persist job {}: {}", job.id, e);
                Outcome::Retry {
                    reason: e.to_string(),
                }
            }
        }
    }
}
