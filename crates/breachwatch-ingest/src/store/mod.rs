//! Persistence ports
//!
//! The pipeline talks to storage only through [`JobStore`] and
//! [`RecordStore`]. [`PgStore`] is the production adapter; [`MemoryStore`]
//! keeps everything in process for tests and local runs.

use async_trait::async_trait;
use breachwatch_common::{JobId, JobStatus, NewBreachRecord, ProcessingJob};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Default page size for the recent-jobs listing
pub const DEFAULT_RECENT_JOBS_LIMIT: i64 = 20;

/// Partial update of a processing job; `None` leaves a column unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i32>,
    pub records_processed: Option<i64>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    /// Run started
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(0),
            ..Default::default()
        }
    }

    /// Batch flushed
    pub fn progress(progress: i32, records_processed: i64) -> Self {
        Self {
            progress: Some(progress),
            records_processed: Some(records_processed),
            ..Default::default()
        }
    }

    /// Run finished
    pub fn completed(records_processed: i64) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            records_processed: Some(records_processed),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Run aborted; no completion timestamp
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Apply this update to an in-memory job
    pub fn apply_to(&self, job: &mut ProcessingJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(records) = self.records_processed {
            job.records_processed = records;
        }
        if let Some(ref message) = self.error_message {
            job.error_message = Some(message.clone());
        }
        if let Some(completed_at) = self.completed_at {
            job.completed_at = Some(completed_at);
        }
    }
}

/// Headline numbers for the admin dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub total_records: i64,
    pub files_processed: i64,
    /// Jobs still `pending` or `processing`
    pub queue_count: i64,
}

/// Processing job persistence
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job in `pending` state
    async fn create_job(&self, filename: &str, original_size: &str) -> StoreResult<ProcessingJob>;

    async fn get_job(&self, id: JobId) -> StoreResult<Option<ProcessingJob>>;

    /// Apply a partial update; a missing job is `StoreError::NotFound`
    async fn update_job(&self, id: JobId, update: JobUpdate) -> StoreResult<()>;

    /// Newest jobs first
    async fn list_recent_jobs(&self, limit: i64) -> StoreResult<Vec<ProcessingJob>>;

    async fn count_completed_jobs(&self) -> StoreResult<i64>;

    /// Jobs in `pending` or `processing`
    async fn count_pending_jobs(&self) -> StoreResult<i64>;
}

/// Breach record persistence
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one record; no uniqueness is enforced
    async fn persist_record(&self, record: &NewBreachRecord) -> StoreResult<()>;

    /// Exposures for an exact, case-sensitive username
    async fn count_by_username(&self, username: &str) -> StoreResult<i64>;

    async fn count_records(&self) -> StoreResult<i64>;
}

/// Gather dashboard counters from both stores
pub async fn summary<S>(store: &S) -> StoreResult<IngestSummary>
where
    S: JobStore + RecordStore + ?Sized,
{
    let (total_records, files_processed, queue_count) = futures::try_join!(
        store.count_records(),
        store.count_completed_jobs(),
        store.count_pending_jobs(),
    )?;

    Ok(IngestSummary {
        total_records,
        files_processed,
        queue_count,
    })
}
