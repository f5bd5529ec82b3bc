//! Wire format of the per-submission queue message.

use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Prefix marking a `reference` that carries the payload inline as base64.
pub const INLINE_PREFIX: &str = "base64:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Media type declared by the submitter.
    pub mime_type: String,
    /// Storage pointer relative to the upload directory, or `base64:<data>`.
    pub reference: String,
    pub original_name: String,
}

impl FileDescriptor {
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8], original_name: impl Into<String>) -> Self {
        use base64::Engine;
        Self {
            mime_type: mime_type.into(),
            reference: format!(
                "{}{}",
                INLINE_PREFIX,
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
            original_name: original_name.into(),
        }
    }

    pub fn stored(
        mime_type: impl Into<String>,
        pointer: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            mime_type: mime_type.into(),
            reference: pointer.into(),
            original_name: original_name.into(),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.reference.starts_with(INLINE_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub job_id: JobId,
    pub file: FileDescriptor,
}

impl QueueMessage {
    pub fn new(job_id: JobId, file: FileDescriptor) -> Self {
        Self { job_id, file }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
