//! Common types used across breachwatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BreachError;

/// Identifier of a processing job
pub type JobId = Uuid;

// ============================================================================
// Processing Jobs
// ============================================================================

/// Lifecycle state of a processing job
///
/// `pending -> processing -> {completed | failed}`. Terminal states are never
/// left again; retries create a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job has reached `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = BreachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(BreachError::InvalidJobStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked attempt to ingest a single uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: JobId,
    /// Original name of the uploaded file
    pub filename: String,
    /// Human-readable size label, e.g. "1.5 GB"
    pub original_size: String,
    pub status: JobStatus,
    /// Percentage 0-100, never decreases within a run
    pub progress: i32,
    pub records_processed: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    /// Create a job in `pending` state
    pub fn new(filename: impl Into<String>, original_size: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            original_size: original_size.into(),
            status: JobStatus::Pending,
            progress: 0,
            records_processed: 0,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Snapshot of the ingestion slot, served to polling callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub is_processing: bool,
    pub current_job_id: Option<JobId>,
}

// ============================================================================
// Breach Records
// ============================================================================

/// A parsed credential exposure, ready to be persisted
///
/// Linked to its job only through `source_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBreachRecord {
    /// Username exactly as it appeared in the file
    pub username: String,
    pub domain: String,
    pub subdomain: Option<String>,
    /// Hex SHA-256 of the plaintext secret
    pub password_hash: String,
    pub source_file: String,
}

/// A persisted breach record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachRecord {
    pub id: Uuid,
    pub username: String,
    pub domain: String,
    pub subdomain: Option<String>,
    pub password_hash: String,
    pub source_file: String,
    pub created_at: DateTime<Utc>,
}

impl BreachRecord {
    /// Assign identity to a new record
    pub fn from_new(record: NewBreachRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: record.username,
            domain: record.domain,
            subdomain: record.subdomain,
            password_hash: record.password_hash,
            source_file: record.source_file,
            created_at: Utc::now(),
        }
    }
}
