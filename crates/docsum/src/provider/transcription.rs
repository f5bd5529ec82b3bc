use std::sync::Arc;

use crate::error::ProviderError;
use crate::extractor::audio::estimate_duration_secs;
use crate::extractor::MediaType;
use crate::provider::fallback::FallbackTranscriber;
use crate::provider::openai::{CompletionTransport, TranscriptionRequest};
use crate::provider::{
    FallbackReason, Provenance, Transcriber, Transcription, LIVE_TRANSCRIPTION_CONFIDENCE,
};

/// Whisper-style transcriber that degrades to [`FallbackTranscriber`] on error.
pub struct LiveTranscriber {
    transport: Arc<dyn CompletionTransport>,
    model: String,
    fallback: FallbackTranscriber,
}

impl LiveTranscriber {
    pub fn new(transport: Arc<dyn CompletionTransport>, model: String) -> Self {
        Self {
            transport,
            model,
            fallback: FallbackTranscriber::new(),
        }
    }
}

impl Transcriber for LiveTranscriber {
    fn transcribe(&self, audio: &[u8], media: &MediaType) -> Result<Transcription, ProviderError> {
        let _span = tracing::info_span!("provider.transcribe", model = %self.model, media = %media)
            .entered();

        let request = TranscriptionRequest {
            model: &self.model,
            audio,
            file_name: format!("audio.{}", file_extension(media)),
            mime_type: media.essence(),
        };

        match self.transport.transcribe(request) {
            Ok(response) if !response.text.trim().is_empty() => Ok(Transcription {
                text: response.text.trim().to_string(),
                duration_secs: response
                    .duration
                    .or_else(|| Some(estimate_duration_secs(audio))),
                confidence: LIVE_TRANSCRIPTION_CONFIDENCE,
                provenance: Provenance::Live,
            }),
            Ok(_) => {
                log::warn!("Live transcription returned no text, using fallback");
                Ok(self.fallback.transcribe_with_reason(
                    audio,
                    media,
                    FallbackReason::Degraded("empty transcript".to_string()),
                ))
            }
            Err(e) => {
                log::warn!("Live transcription failed, using fallback: {}", e);
                Ok(self
                    .fallback
                    .transcribe_with_reason(audio, media, FallbackReason::from_error(&e)))
            }
        }
    }
}

/// Upload name extension; the endpoint sniffs the container from it.
fn file_extension(media: &MediaType) -> &'static str {
    match media.essence() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        _ => "mp3",
    }
}
