#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docsum::config::AiConfig;
use docsum::error::ProviderError;
use docsum::provider::openai::{
    ChatRequest, CompletionTransport, TranscriptionRequest, TranscriptionResponse,
};
use docsum::provider::Providers;

/// Replies with fixed content, or fails as an unreachable endpoint when
/// no reply is scripted.
pub struct FakeTransport {
    chat_reply: Option<String>,
    transcript: Option<String>,
    /// Every call blocks this long and then times out.
    stall: Option<Duration>,
    chat_calls: AtomicUsize,
    transcription_calls: AtomicUsize,
}

impl FakeTransport {
    fn build(chat_reply: Option<&str>, transcript: Option<&str>, stall: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            chat_reply: chat_reply.map(str::to_string),
            transcript: transcript.map(str::to_string),
            stall,
            chat_calls: AtomicUsize::new(0),
            transcription_calls: AtomicUsize::new(0),
        })
    }

    pub fn chat(reply: &str) -> Arc<Self> {
        Self::build(Some(reply), None, None)
    }

    pub fn with_transcript(reply: &str, transcript: &str) -> Arc<Self> {
        Self::build(Some(reply), Some(transcript), None)
    }

    pub fn unreachable() -> Arc<Self> {
        Self::build(None, None, None)
    }

    /// An endpoint that accepts connections and never answers in time.
    pub fn stalled(after: Duration) -> Arc<Self> {
        Self::build(None, None, Some(after))
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn transcription_calls(&self) -> usize {
        self.transcription_calls.load(Ordering::SeqCst)
    }

    pub fn providers(self: &Arc<Self>) -> Providers {
        let transport: Arc<dyn CompletionTransport> = self.clone();
        Providers::with_transport(transport, &AiConfig::default())
    }

    fn stall(&self) -> Result<(), ProviderError> {
        match self.stall {
            Some(after) => {
                std::thread::sleep(after);
                Err(ProviderError::Timeout(after))
            }
            None => Ok(()),
        }
    }
}

impl CompletionTransport for FakeTransport {
    fn chat(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.stall()?;
        self.chat_reply
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("connection refused".to_string()))
    }

    fn transcribe(
        &self,
        _request: TranscriptionRequest<'_>,
    ) -> Result<TranscriptionResponse, ProviderError> {
        self.transcription_calls.fetch_add(1, Ordering::SeqCst);
        self.stall()?;
        match &self.transcript {
            Some(text) => Ok(TranscriptionResponse {
                text: text.clone(),
                duration: Some(12.5),
            }),
            None => Err(ProviderError::Unavailable("connection refused".to_string())),
        }
    }
}
