use std::sync::Arc;

use crate::error::ProviderError;
use crate::provider::fallback::FallbackSummarizer;
use crate::provider::openai::{ChatMessage, ChatRequest, CompletionTransport};
use crate::provider::response::SummaryBody;
use crate::provider::{
    FallbackReason, Provenance, Summarizer, Summary, LIVE_STRUCTURED_CONFIDENCE,
    LIVE_UNSTRUCTURED_CONFIDENCE,
};

const SYSTEM_PROMPT: &str = "You are an expert meeting summarizer. Provide concise, structured summaries with key points and action items.";

fn user_prompt(text: &str) -> String {
    format!(
        r#"Please analyze the following text and provide:
1. A concise summary (2-3 paragraphs)
2. Key points (bullet points)
3. Action items with assignees and deadlines if mentioned

Format your response as JSON:
{{
  "summary": "...",
  "keyPoints": ["...", "..."],
  "actionItems": [
    {{"task": "...", "assignee": "...", "deadline": "..."}}
  ]
}}

Text to analyze:
{}"#,
        text
    )
}

/// Chat-completions summarizer that degrades to [`FallbackSummarizer`] on error.
pub struct LiveSummarizer {
    transport: Arc<dyn CompletionTransport>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    fallback: FallbackSummarizer,
}

impl LiveSummarizer {
    pub fn new(
        transport: Arc<dyn CompletionTransport>,
        model: String,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            transport,
            model,
            temperature,
            max_tokens,
            fallback: FallbackSummarizer::new(),
        }
    }

    fn request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt(text))],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl Summarizer for LiveSummarizer {
    fn summarize(&self, text: &str) -> Result<Summary, ProviderError> {
        let _span = tracing::info_span!("provider.summarize", model = %self.model).entered();

        let raw = match self.transport.chat(&self.request(text)) {
            Ok(raw) => raw,
            Err(e) => {
                let reason = FallbackReason::from_error(&e);
                log::warn!("Live summarization failed, using fallback: {}", e);
                return Ok(self.fallback.summarize_with_reason(text, reason));
            }
        };

        let body = SummaryBody::parse(&raw);
        let structured = body.is_structured();
        let (summary, key_points, action_items) = body.into_parts();

        Ok(Summary {
            summary,
            key_points,
            action_items,
            confidence: if structured {
                LIVE_STRUCTURED_CONFIDENCE
            } else {
                LIVE_UNSTRUCTURED_CONFIDENCE
            },
            provenance: Provenance::Live,
            structured,
        })
    }
}
