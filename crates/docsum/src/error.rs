use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocsumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors raised while turning a payload into plain text.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Corrupt {media_type} payload: {reason}")]
    CorruptPayload { media_type: String, reason: String },

    #[error("No text could be extracted from {0} payload")]
    EmptyText(String),

    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Payload unavailable: {0}")]
    PayloadUnavailable(String),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] ProviderError),
}

impl ExtractError {
    pub(crate) fn corrupt(media_type: &str, reason: impl Into<String>) -> Self {
        Self::CorruptPayload {
            media_type: media_type.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by transcription and summarization providers.
///
/// Live providers absorb these into a fallback result; they only escape when a
/// provider has no fallback to offer.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} was modified concurrently (expected version {expected})")]
    Conflict { id: String, expected: u64 },

    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: crate::job::ProcessingStatus,
        to: crate::job::ProcessingStatus,
    },

    #[error("Corrupt job record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Job store unavailable: {0}")]
    Unavailable(#[from] crate::db::DatabaseError),
}

impl StoreError {
    /// Infrastructure failures; everything else is a statement about the record.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(#[from] crate::db::DatabaseError),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Unknown delivery {delivery_id} for group '{group_id}'")]
    UnknownDelivery { delivery_id: i64, group_id: String },
}

impl QueueError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Failed to install signal handler: {0}")]
    SignalHandler(String),
}

pub type Result<T> = std::result::Result<T, DocsumError>;
