//! Isolated environment for driving the pipeline end to end.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use docsum::db::Database;
use docsum::job::{FileType, Job, ProcessingStatus};
use docsum::pipeline::{Outcome, Pipeline, PipelineConfig};
use docsum::provider::Providers;
use docsum::queue::{FileDescriptor, MessageQueue, SqliteQueue, Subscription};
use docsum::retry::RetryPolicy;
use docsum::store::{JobStore, SqliteJobStore, Transition};
use docsum::worker::{Consumer, Producer};

pub const TOPIC: &str = "file-processing";
pub const GROUP: &str = "file-processing-group";
pub const OWNER: &str = "owner-1";

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub store: Arc<SqliteJobStore>,
    pub queue: Arc<SqliteQueue>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_visibility_timeout(Duration::from_secs(30))
    }

    /// A short visibility timeout lets tests observe redelivery.
    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let db = Database::open(&temp_dir.path().join("docsum.db"), Duration::from_secs(5))
            .expect("Failed to open database");

        Self {
            store: Arc::new(SqliteJobStore::new(db.clone())),
            queue: Arc::new(SqliteQueue::new(
                db,
                visibility_timeout,
                Duration::from_millis(5),
            )),
            upload_dir,
            temp_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn job_store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    pub fn message_queue(&self) -> Arc<dyn MessageQueue> {
        self.queue.clone()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            upload_directory: self.upload_dir.clone(),
            max_payload_bytes: 1024 * 1024,
            extraction_timeout: Duration::from_secs(10),
            transcription_timeout: Duration::from_secs(10),
            summarization_timeout: Duration::from_secs(10),
        }
    }

    pub fn pipeline(&self, providers: &Providers) -> Arc<Pipeline> {
        self.pipeline_with(
            self.pipeline_config(),
            self.job_store(),
            providers,
            RetryPolicy::none(),
        )
    }

    /// A pipeline over an arbitrary store, deadlines and retry policy.
    pub fn pipeline_with(
        &self,
        config: PipelineConfig,
        store: Arc<dyn JobStore>,
        providers: &Providers,
        retry: RetryPolicy,
    ) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(Arc::new(config), store, providers).with_retry(retry))
    }

    pub fn producer(&self) -> Producer {
        Producer::new(self.job_store(), self.message_queue(), TOPIC)
    }

    pub fn subscribe(&self) -> Box<dyn Subscription> {
        self.queue
            .subscribe(TOPIC, GROUP)
            .expect("Failed to subscribe")
    }

    pub fn consumer(&self, pipeline: Arc<Pipeline>) -> Consumer {
        Consumer::new(pipeline, self.subscribe(), Duration::from_millis(500))
    }

    /// Creates and queues a job whose payload travels inline.
    pub fn submit_inline(&self, file_type: FileType, mime: &str, name: &str, bytes: &[u8]) -> Job {
        let job = Job::new(OWNER, file_type, name);
        self.producer()
            .submit(&job, FileDescriptor::inline(mime, bytes, name))
            .expect("Failed to submit job");
        job
    }

    pub fn submit_text(&self, text: &str) -> Job {
        self.submit_inline(FileType::Txt, "text/plain", "notes.txt", text.as_bytes())
    }

    /// Writes the payload into the upload directory and queues a pointer to it.
    pub fn submit_stored(&self, file_type: FileType, mime: &str, name: &str, bytes: &[u8]) -> Job {
        let job = Job::new(OWNER, file_type, name);
        let pointer = format!("{}/{}", job.id, name);
        let path = self.upload_dir.join(&pointer);
        std::fs::create_dir_all(path.parent().expect("pointer has a parent"))
            .expect("Failed to create upload subdir");
        std::fs::write(&path, bytes).expect("Failed to write upload");

        self.producer()
            .submit(&job, FileDescriptor::stored(mime, pointer, name))
            .expect("Failed to submit job");
        job
    }

    /// Receives and settles exactly one delivery.
    pub fn process_next(&self, pipeline: Arc<Pipeline>) -> Outcome {
        self.consumer(pipeline)
            .poll_once()
            .expect("Failed to receive")
            .expect("No message was delivered")
    }

    pub fn load(&self, job: &Job) -> Job {
        self.store.load(&job.id).expect("Failed to load job")
    }

    pub fn transitions(&self, job: &Job) -> Vec<Transition> {
        self.store.transitions(&job.id).expect("Failed to read transitions")
    }

    pub fn backlog(&self) -> u64 {
        self.queue.backlog(TOPIC, GROUP).expect("Failed to read backlog")
    }
}

/// Position of a status along the lifecycle.
pub fn rank(status: ProcessingStatus) -> u8 {
    match status {
        ProcessingStatus::Pending => 0,
        ProcessingStatus::Processing => 1,
        ProcessingStatus::Completed | ProcessingStatus::Failed => 2,
    }
}
