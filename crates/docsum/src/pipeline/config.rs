use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

pub struct PipelineConfig {
    pub upload_directory: PathBuf,
    pub max_payload_bytes: usize,
    pub extraction_timeout: Duration,
    pub transcription_timeout: Duration,
    pub summarization_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_directory: config.upload_directory(),
            max_payload_bytes: config.max_payload_bytes,
            extraction_timeout: config.timeouts.extraction(),
            transcription_timeout: config.timeouts.transcription(),
            summarization_timeout: config.timeouts.summarization(),
        }
    }
}
