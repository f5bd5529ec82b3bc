//! Job repository: row-level access to the `jobs` and `job_transitions` tables.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row. JSON list columns are kept as strings here.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub owner_id: String,
    pub title: Option<String>,
    pub participants: String,
    pub file_type: String,
    pub file_name: String,
    pub processing_status: String,
    pub original_text: String,
    pub summary: Option<String>,
    pub key_points: String,
    pub action_items: String,
    pub word_count: Option<i64>,
    pub duration: Option<f64>,
    pub confidence: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
    pub version: i64,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            title: row.get("title")?,
            participants: row.get("participants")?,
            file_type: row.get("file_type")?,
            file_name: row.get("file_name")?,
            processing_status: row.get("processing_status")?,
            original_text: row.get("original_text")?,
            summary: row.get("summary")?,
            key_points: row.get("key_points")?,
            action_items: row.get("action_items")?,
            word_count: row.get("word_count")?,
            duration: row.get("duration")?,
            confidence: row.get("confidence")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            version: row.get("version")?,
        })
    }
}

/// One entry of the append-only status log.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRow {
    pub job_id: String,
    pub from_status: Option<String>,
    pub to_status: String,
    pub stage: Option<String>,
    pub detail: Option<String>,
    pub at: String,
}

impl TransitionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            from_status: row.get("from_status")?,
            to_status: row.get("to_status")?,
            stage: row.get("stage")?,
            detail: row.get("detail")?,
            at: row.get("at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub owner_id: Option<String>,
    pub status: Option<String>,
    /// Only rows whose `updated_at` is strictly earlier than this timestamp.
    pub updated_before: Option<String>,
    pub limit: Option<u64>,
}

fn insert_transition(conn: &Connection, t: &TransitionRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO job_transitions (job_id, from_status, to_status, stage, detail, at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![t.job_id, t.from_status, t.to_status, t.stage, t.detail, t.at],
    )?;
    Ok(())
}

/// Inserts a new job row together with its initial transition entry.
pub fn insert(db: &Database, job: &JobRow, initial: &TransitionRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO jobs (id, owner_id, title, participants, file_type, file_name,
             processing_status, original_text, summary, key_points, action_items,
             word_count, duration, confidence, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                job.id,
                job.owner_id,
                job.title,
                job.participants,
                job.file_type,
                job.file_name,
                job.processing_status,
                job.original_text,
                job.summary,
                job.key_points,
                job.action_items,
                job.word_count,
                job.duration,
                job.confidence,
                job.created_at,
                job.updated_at,
                job.version,
            ],
        )?;
        insert_transition(&tx, initial)?;
        tx.commit()?;
        Ok(())
    })
}

/// Overwrites every mutable column of a job if, and only if, its stored
/// version still equals `expected_version`. The version is bumped by one and
/// `transition` (when given) is appended in the same transaction.
///
/// Returns `false` when the row is missing or was modified concurrently.
pub fn update_versioned(
    db: &Database,
    job: &JobRow,
    expected_version: i64,
    transition: Option<&TransitionRow>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE jobs SET title=?3, participants=?4, processing_status=?5,
             original_text=?6, summary=?7, key_points=?8, action_items=?9,
             word_count=?10, duration=?11, confidence=?12, updated_at=?13,
             version = version + 1
             WHERE id=?1 AND version=?2",
            params![
                job.id,
                expected_version,
                job.title,
                job.participants,
                job.processing_status,
                job.original_text,
                job.summary,
                job.key_points,
                job.action_items,
                job.word_count,
                job.duration,
                job.confidence,
                job.updated_at,
            ],
        )?;
        if changed != 1 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }
        if let Some(t) = transition {
            insert_transition(&tx, t)?;
        }
        tx.commit()?;
        Ok(true)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Queries jobs with filters, newest first.
pub fn query(db: &Database, filter: &JobFilter) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push(format!("owner_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(owner_id.clone()));
        }
        if let Some(ref status) = filter.status {
            conditions.push(format!("processing_status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref before) = filter.updated_before {
            conditions.push(format!("updated_at < ?{}", param_values.len() + 1));
            param_values.push(Box::new(before.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        param_values.push(Box::new(filter.limit.unwrap_or(100) as i64));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC, id LIMIT ?{}",
            where_clause,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    })
}

/// Returns the status log for a job in insertion order.
pub fn transitions(db: &Database, job_id: &str) -> Result<Vec<TransitionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT job_id, from_status, to_status, stage, detail, at
             FROM job_transitions WHERE job_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![job_id], TransitionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
