//! Error types for the ingestion pipeline

use breachwatch_common::{BreachError, JobId, JobStatus};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence errors with contextual information
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Requested record does not exist
    #[error("{0}")]
    NotFound(String),

    /// A stored row could not be mapped back into a domain type
    #[error("Corrupt row: {0}")]
    Decode(#[from] BreachError),

    /// Backend refused the operation (used by in-process stores)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create a not found error with resource context
    pub fn not_found(resource_type: &str, identifier: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} '{}' not found", resource_type, identifier))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Why a single input line was rejected
///
/// Never aborts a job; rejected lines only show up as the gap between lines
/// seen and records processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid line format: expected {expected} parts, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("Missing required fields")]
    MissingFields,
}

/// Pipeline errors surfaced to callers of the processor
#[derive(Error, Debug)]
pub enum IngestError {
    /// Another ingestion holds the exclusive slot
    #[error("Another file is currently being processed (job {active_job})")]
    Conflict { active_job: JobId },

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Only `pending` jobs can be run
    #[error("Job {job} is {status}, expected pending")]
    InvalidState { job: JobId, status: JobStatus },

    #[error("Upload rejected: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] BreachError),

    #[error("Ingestion task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IngestError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, IngestError::Conflict { .. })
    }
}
