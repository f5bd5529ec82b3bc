use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::{ExtractError, ProviderError};

/// Step of the per-message algorithm, recorded with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Claim,
    Resolve,
    Extract,
    Transcribe,
    Summarize,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Claim => "claim",
            Stage::Resolve => "resolve",
            Stage::Extract => "extract",
            Stage::Transcribe => "transcribe",
            Stage::Summarize => "summarize",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Undecodable queue message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Summarization failed: {0}")]
    Summarize(#[from] ProviderError),

    #[error("Stage '{stage}' exceeded its deadline of {after:?}")]
    DeadlineExceeded { stage: Stage, after: Duration },

    #[error("Stage '{stage}' aborted: {reason}")]
    Aborted { stage: Stage, reason: String },
}
