pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod job;
pub mod pipeline;
pub mod provider;
pub mod queue;
pub mod retry;
pub mod sanitize;
pub mod secrets;
pub mod store;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{
    ConfigError, DocsumError, ExtractError, ProviderError, QueueError, Result, StoreError,
    WorkerError,
};
pub use job::{ActionItem, FileType, Job, JobId, JobMetadata, ProcessingStatus};
pub use pipeline::{Outcome, Pipeline, PipelineConfig, PipelineContext};
pub use provider::Providers;
pub use queue::{FileDescriptor, MessageQueue, QueueMessage, SqliteQueue};
pub use retry::RetryPolicy;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use store::{JobStore, SqliteJobStore};
pub use worker::{Producer, WorkerPool, WorkerPoolConfig};
