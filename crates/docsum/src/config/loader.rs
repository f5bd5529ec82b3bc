use std::path::Path;

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Checks the schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.worker_count == 0 {
        return Err(invalid("workerCount must be at least 1"));
    }
    if config.max_payload_bytes == 0 {
        return Err(invalid("maxPayloadBytes must be positive"));
    }

    let queue = &config.queue;
    if queue.topic.trim().is_empty() || queue.group_id.trim().is_empty() {
        return Err(invalid("queue.topic and queue.groupId must not be empty"));
    }
    if queue.receive_timeout_ms == 0 || queue.poll_interval_ms == 0 {
        return Err(invalid("queue timeouts must be positive"));
    }
    if queue.visibility_timeout_secs == 0 {
        return Err(invalid("queue.visibilityTimeoutSecs must be positive"));
    }

    let t = &config.timeouts;
    if t.extraction_secs == 0
        || t.transcription_secs == 0
        || t.summarization_secs == 0
        || t.store_secs == 0
    {
        return Err(invalid("all timeouts must be positive"));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(invalid("retry.maxAttempts must be at least 1"));
    }
    if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
        return Err(invalid("retry.backoffFactor must be >= 1.0"));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        return Err(invalid("retry.maxDelayMs must be >= retry.baseDelayMs"));
    }

    let ai = &config.ai;
    if !(ai.base_url.starts_with("http://") || ai.base_url.starts_with("https://")) {
        return Err(invalid(format!(
            "ai.baseUrl must be an http(s) URL, got '{}'",
            ai.base_url
        )));
    }
    if !(0.0..=2.0).contains(&ai.temperature) {
        return Err(invalid("ai.temperature must be between 0 and 2"));
    }
    if ai.max_tokens == 0 {
        return Err(invalid("ai.maxTokens must be positive"));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(invalid(format!(
            "Unknown logging.level '{}'",
            config.logging.level
        )));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.queue.topic, "file-processing");
        assert_eq!(config.queue.group_id, "file-processing-group");
        assert_eq!(config.timeouts.transcription_secs, 120);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.ai.summary_model, "gpt-3.5-turbo");
        assert_eq!(config.ai.api_key_env_var.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(config.max_payload_bytes, 52_428_800);
        assert!(config.worker_count >= 1);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "databasePath": "/tmp/docsum.db",
            "uploadDirectory": "/srv/uploads",
            "workerCount": 2,
            "queue": { "topic": "jobs", "visibilityTimeoutSecs": 30 },
            "timeouts": { "summarizationSecs": 10 },
            "retry": { "maxAttempts": 5, "backoffFactor": 1.5 },
            "ai": { "enabled": false, "temperature": 0.0, "apiKeyEnvVar": null },
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.queue.topic, "jobs");
        assert_eq!(config.queue.group_id, "file-processing-group");
        assert_eq!(config.queue.visibility_timeout_secs, 30);
        assert_eq!(config.timeouts.summarization_secs, 10);
        assert_eq!(config.timeouts.extraction_secs, 60);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.ai.enabled);
        assert_eq!(config.ai.api_key_env_var, None);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.database_path(),
            Some(std::path::PathBuf::from("/tmp/docsum.db"))
        );
    }

    #[test]
    fn test_invalid_version() {
        let err = load_config_from_str(r#"{ "version": "2.0" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_unknown_key_fails_schema() {
        let err = load_config_from_str(r#"{ "version": "1.0", "inputDirectory": "/x" }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_wrong_type_fails_schema() {
        let err = load_config_from_str(r#"{ "version": "1.0", "workerCount": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = load_config_from_str(r#"{ "version": "1.0", "ai": { "baseUrl": "ftp://x" } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("ai.baseUrl"));
    }

    #[test]
    fn test_max_delay_below_base_delay() {
        let err = load_config_from_str(
            r#"{ "version": "1.0", "retry": { "baseDelayMs": 500, "maxDelayMs": 100 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docsum.json");
        std::fs::write(&path, r#"{ "version": "1.0", "workerCount": 3 }"#).unwrap();
        assert_eq!(load_config(&path).unwrap().worker_count, 3);

        let missing = load_config(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadFile { .. }));
    }
}
