use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::secrets::{expand_home, resolve_secret_optional, SecretError};

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    /// Defaults to `~/.docsum/data/docsum.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: None,
            upload_directory: default_upload_directory(),
            worker_count: default_worker_count(),
            max_payload_bytes: default_max_payload_bytes(),
            queue: QueueConfig::default(),
            timeouts: TimeoutsConfig::default(),
            retry: RetryConfig::default(),
            ai: AiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Resolved database location, `~` expanded.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }

    pub fn upload_directory(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.upload_directory))
    }
}

fn default_upload_directory() -> String {
    "/var/lib/docsum/uploads".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_max_payload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    pub topic: String,
    pub group_id: String,
    pub receive_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            topic: "file-processing".to_string(),
            group_id: "file-processing-group".to_string(),
            receive_timeout_ms: 1000,
            poll_interval_ms: 100,
            visibility_timeout_secs: 300,
        }
    }
}

impl QueueConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutsConfig {
    pub extraction_secs: u64,
    pub transcription_secs: u64,
    pub summarization_secs: u64,
    pub store_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            extraction_secs: 60,
            transcription_secs: 120,
            summarization_secs: 90,
            store_secs: 5,
        }
    }
}

impl TimeoutsConfig {
    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_secs)
    }

    pub fn transcription(&self) -> Duration {
        Duration::from_secs(self.transcription_secs)
    }

    pub fn summarization(&self) -> Duration {
        Duration::from_secs(self.summarization_secs)
    }

    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store_secs)
    }

    /// HTTP timeout for a live summarization call.
    pub fn summarization_request(&self) -> Duration {
        request_budget(self.summarization())
    }

    /// HTTP timeout for a live transcription call.
    pub fn transcription_request(&self) -> Duration {
        request_budget(self.transcription())
    }
}

/// Longest headroom kept between a live call's timeout and its stage deadline.
const MAX_FALLBACK_HEADROOM: Duration = Duration::from_secs(10);

/// A live request must give up while its stage still has time left to run
/// the fallback, so the budget is the stage deadline minus a fifth (at most
/// [`MAX_FALLBACK_HEADROOM`]).
pub fn request_budget(stage_deadline: Duration) -> Duration {
    let headroom = (stage_deadline / 5).min(MAX_FALLBACK_HEADROOM);
    stage_deadline.saturating_sub(headroom)
}

/// Backoff for store and queue infrastructure errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            backoff_factor: 2.0,
            max_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    /// When false the offline fallbacks are always used.
    pub enabled: bool,
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub summary_model: String,
    pub transcription_model: String,
    /// Direct key value. Prefer `api_key_file` or `api_key_env_var` outside local testing.
    pub api_key: Option<String>,
    pub api_key_file: Option<String>,
    pub api_key_env_var: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            summary_model: "gpt-3.5-turbo".to_string(),
            transcription_model: "whisper-1".to_string(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: Some("OPENAI_API_KEY".to_string()),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

impl AiConfig {
    /// `None` when no source is configured or the env var is unset.
    pub fn resolve_api_key(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret_optional(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
