//! Transcription and summarization providers.
//!
//! Each capability has a live implementation talking to an OpenAI-compatible
//! endpoint and a deterministic offline fallback. A live call that fails
//! degrades to the fallback for that call only, so a provider outage never
//! fails a job by itself.

pub mod fallback;
pub mod openai;
pub mod response;
pub mod summarization;
pub mod transcription;

use std::fmt;
use std::sync::Arc;

use crate::config::{AiConfig, TimeoutsConfig};
use crate::error::ProviderError;
use crate::extractor::MediaType;
use crate::job::ActionItem;

pub use fallback::{FallbackSummarizer, FallbackTranscriber};
pub use openai::{CompletionTransport, HttpTransport, TransportTimeouts};
pub use response::SummaryBody;
pub use summarization::LiveSummarizer;
pub use transcription::LiveTranscriber;

pub const LIVE_STRUCTURED_CONFIDENCE: f64 = 0.85;
pub const LIVE_UNSTRUCTURED_CONFIDENCE: f64 = 0.70;
pub const FALLBACK_SUMMARY_CONFIDENCE: f64 = 0.60;
pub const LIVE_TRANSCRIPTION_CONFIDENCE: f64 = 0.90;
pub const FALLBACK_TRANSCRIPTION_CONFIDENCE: f64 = 0.70;

/// Why a fallback result was produced instead of a live one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No live provider is configured.
    NotConfigured,
    /// The live provider answered, but unusably (4xx, malformed envelope).
    Degraded(String),
    /// The live provider could not be reached in time (timeouts, connection errors, 429/5xx).
    Transient(String),
}

impl FallbackReason {
    pub fn from_error(err: &ProviderError) -> Self {
        if err.is_transient() {
            Self::Transient(err.to_string())
        } else {
            Self::Degraded(err.to_string())
        }
    }

    /// Only transient failures are worth a later retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Live,
    Fallback(FallbackReason),
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Fallback(FallbackReason::NotConfigured) => f.write_str("fallback (not configured)"),
            Self::Fallback(FallbackReason::Degraded(why)) => write!(f, "fallback (degraded: {})", why),
            Self::Fallback(FallbackReason::Transient(why)) => {
                write!(f, "fallback (transient: {})", why)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub duration_secs: Option<f64>,
    pub confidence: f64,
    pub provenance: Provenance,
}

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &[u8], media: &MediaType) -> Result<Transcription, ProviderError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub confidence: f64,
    pub provenance: Provenance,
    /// False when the live response had to be salvaged as unstructured text.
    pub structured: bool,
}

pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> Result<Summary, ProviderError>;
}

/// Provider pair used by the pipeline.
#[derive(Clone)]
pub struct Providers {
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl Providers {
    /// Offline providers only.
    pub fn fallback() -> Self {
        Self {
            transcriber: Arc::new(FallbackTranscriber::new()),
            summarizer: Arc::new(FallbackSummarizer::new()),
        }
    }

    /// Live providers when AI is enabled and an API key resolves, else fallbacks.
    pub fn from_config(ai: &AiConfig, timeouts: &TimeoutsConfig) -> Result<Self, ProviderError> {
        if !ai.enabled {
            log::info!("AI providers disabled by configuration; using offline fallbacks");
            return Ok(Self::fallback());
        }

        let api_key = match ai.resolve_api_key() {
            Ok(Some(key)) => key,
            Ok(None) => {
                log::warn!("No AI API key configured; using offline fallbacks");
                return Ok(Self::fallback());
            }
            Err(e) => {
                log::warn!("AI API key could not be resolved ({}); using offline fallbacks", e);
                return Ok(Self::fallback());
            }
        };

        let transport: Arc<dyn CompletionTransport> = Arc::new(HttpTransport::new(
            &ai.base_url,
            api_key,
            TransportTimeouts {
                chat: timeouts.summarization_request(),
                transcription: timeouts.transcription_request(),
            },
        )?);

        log::info!("Using live AI providers at {}", ai.base_url);
        Ok(Self::with_transport(transport, ai))
    }

    pub fn with_transport(transport: Arc<dyn CompletionTransport>, ai: &AiConfig) -> Self {
        Self {
            transcriber: Arc::new(LiveTranscriber::new(
                Arc::clone(&transport),
                ai.transcription_model.clone(),
            )),
            summarizer: Arc::new(LiveSummarizer::new(
                transport,
                ai.summary_model.clone(),
                ai.temperature,
                ai.max_tokens,
            )),
        }
    }
}
