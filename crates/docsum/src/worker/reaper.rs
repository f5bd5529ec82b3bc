//! Finds jobs stuck in `processing` and fails them.
//!
//! A worker that dies between claiming a job and persisting its terminal
//! state leaves the job in `processing`; a redelivery then sees a claimed
//! job and stands down. These jobs need an operator decision.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::job::{Job, ProcessingStatus};
use crate::store::{JobStore, TransitionNote};

/// Longest accepted threshold (about a century).
const MAX_AGE_MINS: u64 = 60 * 24 * 365 * 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReaperReport {
    /// Jobs moved to `failed`.
    pub failed: Vec<String>,
    /// Jobs that changed under us and were left alone.
    pub skipped: usize,
}

impl ReaperReport {
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0
    }
}

/// `processing` jobs not updated for at least `older_than_mins`, oldest last.
pub fn find_stuck_jobs(
    store: &dyn JobStore,
    older_than_mins: u64,
    limit: u64,
) -> Result<Vec<Job>, StoreError> {
    let cutoff = Utc::now() - Duration::minutes(older_than_mins.min(MAX_AGE_MINS) as i64);
    store.list_by_status(ProcessingStatus::Processing, Some(cutoff), limit)
}

pub fn reap_stuck_jobs(
    store: &dyn JobStore,
    older_than_mins: u64,
    limit: u64,
) -> Result<ReaperReport, StoreError> {
    let mut report = ReaperReport::default();
    let note = TransitionNote::new("reaper").with_detail(format!(
        "no progress for at least {} minutes",
        older_than_mins
    ));

    for mut job in find_stuck_jobs(store, older_than_mins, limit)? {
        if job.fail().is_err() {
            report.skipped += 1;
            continue;
        }
        match store.save_with_note(&mut job, &note) {
            Ok(()) => {
                log::warn!("Reaped stuck job {}", job.id);
                report.failed.push(job.id.to_string());
            }
            Err(StoreError::Conflict { .. }) | Err(StoreError::InvalidTransition { .. }) => {
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
