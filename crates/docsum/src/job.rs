use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque job identifier (UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File type declared by the submitter. The pipeline never infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
    Audio,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            "audio" => Ok(Self::Audio),
            other => Err(format!("unknown file type '{}'", other)),
        }
    }
}

/// Lifecycle state of a job.
///
/// Transitions only move forward: `pending -> processing -> {completed | failed}`.
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown processing status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub task: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
}

impl ActionItem {
    pub fn unassigned(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            assignee: None,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    /// Number of distinct words in the extracted text, compared
    /// case-insensitively with surrounding punctuation trimmed; repeats count
    /// once, so "the the the" is 1. See [`fn@word_count`].
    pub word_count: u64,
    /// Audio duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Summarization provider's self-reported quality score.
    pub confidence: f64,
}

/// Everything written on the transition into `completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResults {
    pub original_text: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub metadata: JobMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub id: String,
    pub from: ProcessingStatus,
    pub to: ProcessingStatus,
}

/// The persisted job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    pub file_type: FileType,
    pub file_name: String,
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub original_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by the store on every save.
    #[serde(default)]
    pub version: u64,
}

impl Job {
    /// Creates a new `pending` job, as the gateway does at upload time.
    pub fn new(owner_id: impl Into<String>, file_type: FileType, file_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner_id: owner_id.into(),
            title: None,
            participants: Vec::new(),
            file_type,
            file_name: file_name.into(),
            processing_status: ProcessingStatus::Pending,
            original_text: String::new(),
            summary: None,
            key_points: Vec::new(),
            action_items: Vec::new(),
            metadata: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_participants(mut self, participants: Vec<String>) -> Self {
        self.participants = participants;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.processing_status.is_terminal()
    }

    fn transition(&mut self, to: ProcessingStatus) -> Result<(), TransitionError> {
        if !self.processing_status.can_transition_to(to) {
            return Err(TransitionError {
                id: self.id.to_string(),
                from: self.processing_status,
                to,
            });
        }
        self.processing_status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn begin_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(ProcessingStatus::Processing)
    }

    /// Moves to `completed`, populating every result field together.
    pub fn complete(&mut self, results: JobResults) -> Result<(), TransitionError> {
        self.transition(ProcessingStatus::Completed)?;
        self.original_text = results.original_text;
        self.summary = Some(results.summary);
        self.key_points = results.key_points;
        self.action_items = results.action_items;
        self.metadata = Some(results.metadata);
        Ok(())
    }

    /// Moves to `failed`. Result fields are left untouched.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        self.transition(ProcessingStatus::Failed)
    }
}

/// Counts distinct words, case-insensitively, ignoring surrounding punctuation.
///
/// This is vocabulary size, not a token count: "Will will WILL." is 1.
pub fn word_count(text: &str) -> u64 {
    let mut seen = HashSet::new();
    for token in text.split_whitespace() {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        if !word.is_empty() {
            seen.insert(word.to_lowercase());
        }
    }
    seen.len() as u64
}
