//! Text extraction: payload bytes plus a declared media type in, plain text out.
//!
//! The declared media type is checked against an explicit allow-list before
//! any parser sees the bytes. Audio is handed to a [`Transcriber`] so every
//! branch ends in the same [`Extraction`] shape.

pub mod audio;
pub mod docx;
pub mod pdf;
pub mod text;

use std::fmt;
use std::sync::Arc;

use crate::error::ExtractError;
use crate::provider::{Provenance, Transcriber};

/// Parser family a media type dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFamily {
    Pdf,
    Docx,
    Text,
    Audio,
}

const ALLOWED: &[(&str, MediaFamily)] = &[
    ("application/pdf", MediaFamily::Pdf),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        MediaFamily::Docx,
    ),
    ("text/plain", MediaFamily::Text),
    ("text/markdown", MediaFamily::Text),
    ("audio/mpeg", MediaFamily::Audio),
    ("audio/mp3", MediaFamily::Audio),
    ("audio/wav", MediaFamily::Audio),
    ("audio/x-wav", MediaFamily::Audio),
    ("audio/wave", MediaFamily::Audio),
    ("audio/mp4", MediaFamily::Audio),
    ("audio/m4a", MediaFamily::Audio),
    ("audio/x-m4a", MediaFamily::Audio),
    ("audio/webm", MediaFamily::Audio),
    ("audio/ogg", MediaFamily::Audio),
];

/// A declared media type that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    family: MediaFamily,
}

impl MediaType {
    /// Normalizes `declared` (parameters dropped, lowercased) and validates it.
    pub fn parse(declared: &str) -> Result<Self, ExtractError> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        ALLOWED
            .iter()
            .find(|(name, _)| *name == essence)
            .map(|(_, family)| Self {
                essence: essence.clone(),
                family: *family,
            })
            .ok_or_else(|| ExtractError::UnsupportedMediaType(declared.trim().to_string()))
    }

    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn family(&self) -> MediaFamily {
        self.family
    }

    pub fn is_audio(&self) -> bool {
        self.family == MediaFamily::Audio
    }

    /// Every media type the extractor accepts.
    pub fn supported() -> impl Iterator<Item = &'static str> {
        ALLOWED.iter().map(|(name, _)| *name)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtractionHint {
    Pages(u32),
    DurationSecs(f64),
}

/// Provenance of text that came from a transcription provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptInfo {
    pub confidence: f64,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub hint: Option<ExtractionHint>,
    /// Present only for audio.
    pub transcript: Option<TranscriptInfo>,
}

impl Extraction {
    pub fn new(text: String, hint: Option<ExtractionHint>) -> Self {
        Self {
            text,
            hint,
            transcript: None,
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        match self.hint {
            Some(ExtractionHint::DurationSecs(d)) => Some(d),
            _ => None,
        }
    }
}

pub trait FormatExtractor: Send + Sync {
    fn extract(&self, payload: &[u8], media: &MediaType) -> Result<Extraction, ExtractError>;
    fn supports(&self, family: MediaFamily) -> bool;
}

pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn FormatExtractor>>,
    max_payload_bytes: usize,
}

impl ExtractorRegistry {
    pub fn new(transcriber: Arc<dyn Transcriber>, max_payload_bytes: usize) -> Self {
        let extractors: Vec<Box<dyn FormatExtractor>> = vec![
            Box::new(text::TextExtractor::new()),
            Box::new(pdf::PdfExtractor::new()),
            Box::new(docx::DocxExtractor::new()),
            Box::new(audio::AudioExtractor::new(transcriber)),
        ];

        Self {
            extractors,
            max_payload_bytes,
        }
    }

    /// Validates `declared`, enforces the size limit, then dispatches.
    pub fn extract(&self, payload: &[u8], declared: &str) -> Result<Extraction, ExtractError> {
        let media = MediaType::parse(declared)?;
        self.extract_media(payload, &media)
    }

    pub fn extract_media(
        &self,
        payload: &[u8],
        media: &MediaType,
    ) -> Result<Extraction, ExtractError> {
        if payload.len() > self.max_payload_bytes {
            return Err(ExtractError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_bytes,
            });
        }

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.supports(media.family()))
            .ok_or_else(|| ExtractError::UnsupportedMediaType(media.essence().to_string()))?;

        let extraction = extractor.extract(payload, media)?;
        if extraction.text.trim().is_empty() {
            return Err(ExtractError::EmptyText(media.essence().to_string()));
        }
        Ok(extraction)
    }
}
