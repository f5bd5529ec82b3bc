//! OpenAI-compatible HTTP transport (chat completions + audio transcriptions).

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest<'a> {
    pub model: &'a str,
    pub audio: &'a [u8],
    pub file_name: String,
    pub mime_type: &'a str,
}

/// Subset of the `verbose_json` transcription response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Wire seam between the live providers and the network.
pub trait CompletionTransport: Send + Sync {
    /// Returns the content of the first choice's message.
    fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError>;

    fn transcribe(&self, request: TranscriptionRequest<'_>) -> Result<TranscriptionResponse, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    pub chat: Duration,
    pub transcription: Duration,
}

/// Blocking reqwest client bound to one endpoint and API key.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: SecretString,
    timeouts: TransportTimeouts,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeouts: TransportTimeouts,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeouts,
        })
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        timeout: Duration,
    ) -> Result<reqwest::blocking::Response, ProviderError> {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .timeout(timeout)
            .send()
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }
        Ok(response)
    }
}

impl CompletionTransport for HttpTransport {
    fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            #[serde(default)]
            content: Option<String>,
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self.send(self.client.post(url).json(request), self.timeouts.chat)?;

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ProviderError::MalformedResponse(format!("chat envelope: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".to_string()))
    }

    fn transcribe(&self, request: TranscriptionRequest<'_>) -> Result<TranscriptionResponse, ProviderError> {
        let part = reqwest::blocking::multipart::Part::bytes(request.audio.to_vec())
            .file_name(request.file_name)
            .mime_str(request.mime_type)
            .map_err(|e| ProviderError::Unavailable(format!("invalid audio mime type: {}", e)))?;
        let form = reqwest::blocking::multipart::Form::new()
            .text("model", request.model.to_string())
            .text("response_format", "verbose_json")
            .part("file", part);

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self.send(
            self.client.post(url).multipart(form),
            self.timeouts.transcription,
        )?;

        response
            .json()
            .map_err(|e| ProviderError::MalformedResponse(format!("transcription envelope: {}", e)))
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Scripted transport for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    pub(crate) struct ScriptedTransport {
        pub chat_reply: Result<String, ProviderError>,
        pub transcription_reply: Result<TranscriptionResponse, ProviderError>,
        pub chat_requests: Mutex<Vec<ChatRequest>>,
        pub transcription_files: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn chat(reply: Result<String, ProviderError>) -> Self {
            Self {
                chat_reply: reply,
                transcription_reply: Err(ProviderError::Unavailable("not scripted".to_string())),
                chat_requests: Mutex::new(Vec::new()),
                transcription_files: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn transcription(reply: Result<TranscriptionResponse, ProviderError>) -> Self {
            Self {
                chat_reply: Err(ProviderError::Unavailable("not scripted".to_string())),
                transcription_reply: reply,
                chat_requests: Mutex::new(Vec::new()),
                transcription_files: Mutex::new(Vec::new()),
            }
        }
    }

    fn replay<T: Clone>(reply: &Result<T, ProviderError>) -> Result<T, ProviderError> {
        match reply {
            Ok(v) => Ok(v.clone()),
            Err(ProviderError::Unavailable(m)) => Err(ProviderError::Unavailable(m.clone())),
            Err(ProviderError::Timeout(d)) => Err(ProviderError::Timeout(*d)),
            Err(ProviderError::Rejected { status, body }) => Err(ProviderError::Rejected {
                status: *status,
                body: body.clone(),
            }),
            Err(ProviderError::MalformedResponse(m)) => {
                Err(ProviderError::MalformedResponse(m.clone()))
            }
        }
    }

    impl CompletionTransport for ScriptedTransport {
        fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
            self.chat_requests.lock().unwrap().push(request.clone());
            replay(&self.chat_reply)
        }

        fn transcribe(
            &self,
            request: TranscriptionRequest<'_>,
        ) -> Result<TranscriptionResponse, ProviderError> {
            self.transcription_files.lock().unwrap().push(request.file_name);
            replay(&self.transcription_reply)
        }
    }
}
