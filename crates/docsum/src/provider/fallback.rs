//! Deterministic offline providers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ProviderError;
use crate::extractor::audio::estimate_duration_secs;
use crate::extractor::MediaType;
use crate::job::{word_count, ActionItem};
use crate::provider::{
    FallbackReason, Provenance, Summarizer, Summary, Transcriber, Transcription,
    FALLBACK_SUMMARY_CONFIDENCE, FALLBACK_TRANSCRIPTION_CONFIDENCE,
};

const NARRATIVE_SENTENCES: usize = 3;
const MAX_KEY_POINTS: usize = 4;
const MAX_POINT_CHARS: usize = 200;
const MAX_SUMMARY_CHARS: usize = 600;

/// `<Name> will|should|must|needs to <task> [by] [<when>]`, on a sentence with
/// its closing punctuation removed.
static ACTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?P<who>[A-Z][A-Za-z'-]+)\s+(?P<modal>will|shall|should|must|needs? to|has to|is going to)\s+(?P<task>.+?)(?:\s+(?:by|on|before|until|due)?\s*(?P<when>(?i:monday|tuesday|wednesday|thursday|friday|saturday|sunday|today|tonight|tomorrow|next week|next month|end of (?:the )?(?:day|week|month))))?$",
    )
    .expect("action item pattern is valid")
});

/// Subjects that name nobody in particular.
const NON_ASSIGNEES: &[&str] = &[
    "I", "We", "You", "They", "He", "She", "It", "Everyone", "Someone", "Somebody", "Team", "This",
    "That", "There",
];

/// Extractive summarizer used when no live provider is available.
#[derive(Debug, Default, Clone)]
pub struct FallbackSummarizer;

impl FallbackSummarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn summarize_with_reason(&self, text: &str, reason: FallbackReason) -> Summary {
        let sentences = split_sentences(text);

        let summary = if sentences.is_empty() {
            "No content to summarize.".to_string()
        } else {
            clip(
                &sentences
                    .iter()
                    .take(NARRATIVE_SENTENCES)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" "),
                MAX_SUMMARY_CHARS,
            )
        };

        let mut key_points: Vec<String> = sentences
            .iter()
            .take(MAX_KEY_POINTS)
            .map(|s| clip(s, MAX_POINT_CHARS))
            .collect();
        key_points.push(format!(
            "Source text contains {} distinct words",
            word_count(text)
        ));

        let mut action_items: Vec<ActionItem> =
            sentences.iter().filter_map(|s| detect_action_item(s)).collect();
        if action_items.is_empty() {
            action_items = vec![
                ActionItem::unassigned("Review the summary and confirm the key points"),
                ActionItem::unassigned("Share the summary with the participants"),
            ];
        }

        Summary {
            summary,
            key_points,
            action_items,
            confidence: FALLBACK_SUMMARY_CONFIDENCE,
            provenance: Provenance::Fallback(reason),
            structured: true,
        }
    }
}

impl Summarizer for FallbackSummarizer {
    fn summarize(&self, text: &str) -> Result<Summary, ProviderError> {
        Ok(self.summarize_with_reason(text, FallbackReason::NotConfigured))
    }
}

/// Placeholder transcriber: reports how much audio arrived without decoding it.
#[derive(Debug, Default, Clone)]
pub struct FallbackTranscriber;

impl FallbackTranscriber {
    pub fn new() -> Self {
        Self
    }

    pub fn transcribe_with_reason(
        &self,
        audio: &[u8],
        media: &MediaType,
        reason: FallbackReason,
    ) -> Transcription {
        let duration = estimate_duration_secs(audio);
        Transcription {
            text: format!(
                "Audio recording of approximately {:.0} seconds ({}). The spoken content could not be transcribed because no live transcription provider was available.",
                duration, media
            ),
            duration_secs: Some(duration),
            confidence: FALLBACK_TRANSCRIPTION_CONFIDENCE,
            provenance: Provenance::Fallback(reason),
        }
    }
}

impl Transcriber for FallbackTranscriber {
    fn transcribe(&self, audio: &[u8], media: &MediaType) -> Result<Transcription, ProviderError> {
        Ok(self.transcribe_with_reason(audio, media, FallbackReason::NotConfigured))
    }
}

/// Splits on sentence-ending punctuation followed by whitespace, and on line breaks.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

fn detect_action_item(sentence: &str) -> Option<ActionItem> {
    let body = sentence.trim_end_matches(['.', '!', '?', ' ']);
    let caps = ACTION_PATTERN.captures(body)?;

    let who = caps.name("who")?.as_str();
    let task = caps.name("task")?.as_str().trim();
    if task.is_empty() {
        return None;
    }

    Some(ActionItem {
        task: capitalize(task),
        assignee: (!NON_ASSIGNEES.contains(&who)).then(|| who.to_string()),
        deadline: caps.name("when").map(|m| m.as_str().to_string()),
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn clip(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}
