//! In-process store

use async_trait::async_trait;
use breachwatch_common::{BreachRecord, JobId, JobStatus, NewBreachRecord, ProcessingJob};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{JobStore, JobUpdate, RecordStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    jobs: HashMap<JobId, ProcessingJob>,
    records: Vec<BreachRecord>,
}

/// Jobs and records held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an existing job as-is
    pub fn insert_job(&self, job: ProcessingJob) {
        self.tables().jobs.insert(job.id, job);
    }

    /// Drop a job, as if it had been deleted underneath a run
    pub fn remove_job(&self, id: JobId) -> Option<ProcessingJob> {
        self.tables().jobs.remove(&id)
    }

    /// Snapshot of every persisted record
    pub fn records(&self) -> Vec<BreachRecord> {
        self.tables().records.clone()
    }

    pub fn jobs_with_status(&self, status: JobStatus) -> Vec<ProcessingJob> {
        self.tables()
            .jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, filename: &str, original_size: &str) -> StoreResult<ProcessingJob> {
        let job = ProcessingJob::new(filename, original_size);
        self.insert_job(job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Option<ProcessingJob>> {
        Ok(self.tables().jobs.get(&id).cloned())
    }

    async fn update_job(&self, id: JobId, update: JobUpdate) -> StoreResult<()> {
        let mut tables = self.tables();
        let job = tables
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Processing job", id))?;
        update.apply_to(job);
        Ok(())
    }

    async fn list_recent_jobs(&self, limit: i64) -> StoreResult<Vec<ProcessingJob>> {
        let mut jobs: Vec<ProcessingJob> = self.tables().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn count_completed_jobs(&self) -> StoreResult<i64> {
        Ok(self.jobs_with_status(JobStatus::Completed).len() as i64)
    }

    async fn count_pending_jobs(&self) -> StoreResult<i64> {
        let tables = self.tables();
        let count = tables
            .jobs
            .values()
            .filter(|job| matches!(job.status, JobStatus::Pending | JobStatus::Processing))
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn persist_record(&self, record: &NewBreachRecord) -> StoreResult<()> {
        self.tables()
            .records
            .push(BreachRecord::from_new(record.clone()));
        Ok(())
    }

    async fn count_by_username(&self, username: &str) -> StoreResult<i64> {
        let tables = self.tables();
        Ok(tables
            .records
            .iter()
            .filter(|record| record.username == username)
            .count() as i64)
    }

    async fn count_records(&self) -> StoreResult<i64> {
        Ok(self.tables().records.len() as i64)
    }
}
