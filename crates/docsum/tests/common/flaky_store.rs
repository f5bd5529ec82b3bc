#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use docsum::db::DatabaseError;
use docsum::error::StoreError;
use docsum::job::{Job, JobId, ProcessingStatus};
use docsum::store::{JobStore, Transition, TransitionNote};

/// Wraps a real store and fails the next `failures` saves with a retryable
/// error before letting writes through.
pub struct FlakyStore {
    inner: Arc<dyn JobStore>,
    remaining_failures: AtomicUsize,
    save_attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn JobStore>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            save_attempts: AtomicUsize::new(0),
        })
    }

    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }

    pub fn remaining_failures(&self) -> usize {
        self.remaining_failures.load(Ordering::SeqCst)
    }
}

impl JobStore for FlakyStore {
    fn create(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.create(job)
    }

    fn load(&self, id: &JobId) -> Result<Job, StoreError> {
        self.inner.load(id)
    }

    fn save_with_note(&self, job: &mut Job, note: &TransitionNote) -> Result<(), StoreError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable(DatabaseError::LockPoisoned));
        }
        self.inner.save_with_note(job, note)
    }

    fn list_for_owner(
        &self,
        owner_id: &str,
        status: Option<ProcessingStatus>,
        limit: u64,
    ) -> Result<Vec<Job>, StoreError> {
        self.inner.list_for_owner(owner_id, status, limit)
    }

    fn list_by_status(
        &self,
        status: ProcessingStatus,
        updated_before: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<Job>, StoreError> {
        self.inner.list_by_status(status, updated_before, limit)
    }

    fn transitions(&self, id: &JobId) -> Result<Vec<Transition>, StoreError> {
        self.inner.transitions(id)
    }
}
