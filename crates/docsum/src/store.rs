//! Job Store: the durable, single source of truth for job records.

use chrono::{DateTime, Utc};

use crate::db::job_repo::{self, JobFilter, JobRow, TransitionRow};
use crate::db::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::error::StoreError;
use crate::job::{Job, JobId, JobMetadata, ProcessingStatus};

/// Context recorded alongside a status change in the transition log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionNote {
    pub stage: Option<String>,
    pub detail: Option<String>,
}

impl TransitionNote {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A status change as read back from the transition log.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: Option<ProcessingStatus>,
    pub to: ProcessingStatus,
    pub stage: Option<String>,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Persistence contract consumed by the pipeline and the gateway.
pub trait JobStore: Send + Sync {
    /// Persists a freshly created `pending` job.
    fn create(&self, job: &Job) -> Result<(), StoreError>;

    fn load(&self, id: &JobId) -> Result<Job, StoreError>;

    /// Saves `job` if nobody else saved it since it was loaded. On success the
    /// job's `version` is advanced to match the stored record.
    fn save_with_note(&self, job: &mut Job, note: &TransitionNote) -> Result<(), StoreError>;

    fn save(&self, job: &mut Job) -> Result<(), StoreError> {
        self.save_with_note(job, &TransitionNote::default())
    }

    /// Owner-scoped read. A job owned by someone else is reported as `NotFound`.
    fn load_for_owner(&self, id: &JobId, owner_id: &str) -> Result<Job, StoreError> {
        let job = self.load(id)?;
        if job.owner_id != owner_id {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(job)
    }

    /// Jobs of one owner, newest first.
    fn list_for_owner(
        &self,
        owner_id: &str,
        status: Option<ProcessingStatus>,
        limit: u64,
    ) -> Result<Vec<Job>, StoreError>;

    /// Jobs in `status` whose last update is older than `updated_before`.
    fn list_by_status(
        &self,
        status: ProcessingStatus,
        updated_before: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<Job>, StoreError>;

    fn transitions(&self, id: &JobId) -> Result<Vec<Transition>, StoreError>;
}

/// SQLite-backed `JobStore`.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn query(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        job_repo::query(&self.db, filter)?
            .into_iter()
            .map(row_to_job)
            .collect()
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: &Job) -> Result<(), StoreError> {
        let row = job_to_row(job)?;
        let initial = TransitionRow {
            job_id: job.id.to_string(),
            from_status: None,
            to_status: job.processing_status.as_str().to_string(),
            stage: Some("submit".to_string()),
            detail: None,
            at: format_timestamp(&job.created_at),
        };
        job_repo::insert(&self.db, &row, &initial).map_err(|e| match e {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict {
                    id: job.id.to_string(),
                    expected: 0,
                }
            }
            other => StoreError::from(other),
        })?;
        log::debug!("Created job {} ({})", job.id, job.file_type);
        Ok(())
    }

    fn load(&self, id: &JobId) -> Result<Job, StoreError> {
        let row = job_repo::find_by_id(&self.db, id.as_str())?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row_to_job(row)
    }

    fn save_with_note(&self, job: &mut Job, note: &TransitionNote) -> Result<(), StoreError> {
        let stored = self.load(&job.id)?;
        if stored.version != job.version {
            return Err(StoreError::Conflict {
                id: job.id.to_string(),
                expected: job.version,
            });
        }

        let from = stored.processing_status;
        let to = job.processing_status;
        let status_changed = from != to;
        if (status_changed && !from.can_transition_to(to)) || (!status_changed && from.is_terminal())
        {
            return Err(StoreError::InvalidTransition {
                id: job.id.to_string(),
                from,
                to,
            });
        }

        let row = job_to_row(job)?;
        let transition = status_changed.then(|| TransitionRow {
            job_id: job.id.to_string(),
            from_status: Some(from.as_str().to_string()),
            to_status: to.as_str().to_string(),
            stage: note.stage.clone(),
            detail: note.detail.clone(),
            at: row.updated_at.clone(),
        });

        if !job_repo::update_versioned(&self.db, &row, job.version as i64, transition.as_ref())? {
            return Err(StoreError::Conflict {
                id: job.id.to_string(),
                expected: job.version,
            });
        }

        job.version += 1;
        Ok(())
    }

    fn list_for_owner(
        &self,
        owner_id: &str,
        status: Option<ProcessingStatus>,
        limit: u64,
    ) -> Result<Vec<Job>, StoreError> {
        self.query(&JobFilter {
            owner_id: Some(owner_id.to_string()),
            status: status.map(|s| s.as_str().to_string()),
            limit: Some(limit),
            ..Default::default()
        })
    }

    fn list_by_status(
        &self,
        status: ProcessingStatus,
        updated_before: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<Job>, StoreError> {
        self.query(&JobFilter {
            status: Some(status.as_str().to_string()),
            updated_before: updated_before.as_ref().map(format_timestamp),
            limit: Some(limit),
            ..Default::default()
        })
    }

    fn transitions(&self, id: &JobId) -> Result<Vec<Transition>, StoreError> {
        job_repo::transitions(&self.db, id.as_str())?
            .into_iter()
            .map(|row| {
                let corrupt = |reason: String| StoreError::CorruptRecord {
                    id: row.job_id.clone(),
                    reason,
                };
                let from = row
                    .from_status
                    .as_deref()
                    .map(str::parse::<ProcessingStatus>)
                    .transpose()
                    .map_err(corrupt)?;
                let to = row.to_status.parse().map_err(corrupt)?;
                let at = parse_timestamp(&row.at)
                    .ok_or_else(|| corrupt(format!("bad timestamp '{}'", row.at)))?;
                Ok(Transition {
                    from,
                    to,
                    stage: row.stage.clone(),
                    detail: row.detail.clone(),
                    at,
                })
            })
            .collect()
    }
}

fn to_json<T: serde::Serialize>(id: &JobId, column: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::CorruptRecord {
        id: id.to_string(),
        reason: format!("cannot encode {}: {}", column, e),
    })
}

fn from_json<T: serde::de::DeserializeOwned>(
    id: &str,
    column: &str,
    value: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(value).map_err(|e| StoreError::CorruptRecord {
        id: id.to_string(),
        reason: format!("invalid {}: {}", column, e),
    })
}

fn job_to_row(job: &Job) -> Result<JobRow, StoreError> {
    let metadata = job.metadata.as_ref();
    Ok(JobRow {
        id: job.id.to_string(),
        owner_id: job.owner_id.clone(),
        title: job.title.clone(),
        participants: to_json(&job.id, "participants", &job.participants)?,
        file_type: job.file_type.as_str().to_string(),
        file_name: job.file_name.clone(),
        processing_status: job.processing_status.as_str().to_string(),
        original_text: job.original_text.clone(),
        summary: job.summary.clone(),
        key_points: to_json(&job.id, "key_points", &job.key_points)?,
        action_items: to_json(&job.id, "action_items", &job.action_items)?,
        word_count: metadata.map(|m| m.word_count as i64),
        duration: metadata.and_then(|m| m.duration),
        confidence: metadata.map(|m| m.confidence),
        created_at: format_timestamp(&job.created_at),
        updated_at: format_timestamp(&job.updated_at),
        version: job.version as i64,
    })
}

fn row_to_job(row: JobRow) -> Result<Job, StoreError> {
    let corrupt = |reason: String| StoreError::CorruptRecord {
        id: row.id.clone(),
        reason,
    };

    let metadata = match (row.word_count, row.confidence) {
        (Some(word_count), Some(confidence)) => Some(JobMetadata {
            word_count: word_count.max(0) as u64,
            duration: row.duration,
            confidence,
        }),
        _ => None,
    };

    Ok(Job {
        file_type: row.file_type.parse().map_err(corrupt)?,
        processing_status: row.processing_status.parse().map_err(corrupt)?,
        created_at: parse_timestamp(&row.created_at)
            .ok_or_else(|| corrupt(format!("bad created_at '{}'", row.created_at)))?,
        updated_at: parse_timestamp(&row.updated_at)
            .ok_or_else(|| corrupt(format!("bad updated_at '{}'", row.updated_at)))?,
        participants: from_json(&row.id, "participants", &row.participants)?,
        key_points: from_json(&row.id, "key_points", &row.key_points)?,
        action_items: from_json(&row.id, "action_items", &row.action_items)?,
        version: row.version.max(0) as u64,
        metadata,
        id: JobId::from(row.id),
        owner_id: row.owner_id,
        title: row.title,
        file_name: row.file_name,
        original_text: row.original_text,
        summary: row.summary,
    })
}
