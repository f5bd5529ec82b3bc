use std::sync::Arc;

use crate::error::ExtractError;
use crate::extractor::{
    Extraction, ExtractionHint, FormatExtractor, MediaFamily, MediaType, TranscriptInfo,
};
use crate::provider::{Transcriber, Transcription};

/// Bitrate assumed when the container gives no duration (128 kbit/s).
const ASSUMED_BYTES_PER_SEC: f64 = 16_000.0;

/// Audio is not parsed here; the transcriber turns it into text.
pub struct AudioExtractor {
    transcriber: Arc<dyn Transcriber>,
}

impl AudioExtractor {
    pub fn new(transcriber: Arc<dyn Transcriber>) -> Self {
        Self { transcriber }
    }
}

impl FormatExtractor for AudioExtractor {
    fn extract(&self, payload: &[u8], media: &MediaType) -> Result<Extraction, ExtractError> {
        let _span = tracing::info_span!("extractor.audio", media = %media, bytes = payload.len())
            .entered();

        let transcription = self.transcriber.transcribe(payload, media)?;
        Ok(transcript_extraction(transcription))
    }

    fn supports(&self, family: MediaFamily) -> bool {
        matches!(family, MediaFamily::Audio)
    }
}

/// Adopts a transcript as the extracted text, keeping its duration hint.
pub fn transcript_extraction(transcription: Transcription) -> Extraction {
    Extraction {
        text: transcription.text,
        hint: transcription.duration_secs.map(ExtractionHint::DurationSecs),
        transcript: Some(TranscriptInfo {
            confidence: transcription.confidence,
            provenance: transcription.provenance,
        }),
    }
}

/// Reads the playback length from a RIFF/WAVE header.
pub fn wav_duration_secs(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<u32> = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().ok()?) as usize;
        let body = pos + 8;

        match id {
            b"fmt " if size >= 16 && body + 16 <= bytes.len() => {
                byte_rate = Some(u32::from_le_bytes(bytes[body + 8..body + 12].try_into().ok()?));
            }
            b"data" => {
                let rate = byte_rate.filter(|r| *r > 0)?;
                // Streamed files may carry a placeholder size.
                let available = bytes.len().saturating_sub(body);
                let data_len = size.min(available);
                return Some(data_len as f64 / rate as f64);
            }
            _ => {}
        }

        // Chunks are word aligned.
        pos = body.checked_add(size)?.checked_add(size % 2)?;
    }
    None
}

/// Duration from the WAV header when present, else a size-based estimate.
pub fn estimate_duration_secs(bytes: &[u8]) -> f64 {
    wav_duration_secs(bytes)
        .unwrap_or_else(|| ((bytes.len() as f64 / ASSUMED_BYTES_PER_SEC) * 10.0).round() / 10.0)
}
