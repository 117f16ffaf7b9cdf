//! PostgreSQL adapter

use async_trait::async_trait;
use breachwatch_common::{JobId, JobStatus, NewBreachRecord, ProcessingJob};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use super::{JobStore, JobUpdate, RecordStore};
use crate::config::DbConfig;
use crate::error::{StoreError, StoreResult};

const JOB_COLUMNS: &str = "id, filename, original_size, status, progress, records_processed, \
                           error_message, created_at, completed_at";

/// Open a connection pool sized from config
pub async fn create_pool(config: &DbConfig) -> StoreResult<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(idle_timeout) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    if let Some(max_lifetime) = config.max_lifetime_secs {
        options = options.max_lifetime(Duration::from_secs(max_lifetime));
    }

    let pool = options.connect(&config.url).await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> StoreResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(StoreError::from)
}

/// Apply the bundled schema migrations
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Job and record storage backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DbConfig) -> StoreResult<Self> {
        Ok(Self::new(create_pool(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    filename: String,
    original_size: String,
    status: String,
    progress: i32,
    records_processed: i64,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for ProcessingJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            filename: row.filename,
            original_size: row.original_size,
            status: row.status.parse::<JobStatus>()?,
            progress: row.progress,
            records_processed: row.records_processed,
            error_message: row.error_message,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, filename: &str, original_size: &str) -> StoreResult<ProcessingJob> {
        let job = ProcessingJob::new(filename, original_size);

        let row = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO processing_jobs (id, filename, original_size, status, progress, records_processed) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job.id)
        .bind(&job.filename)
        .bind(&job.original_size)
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(job.records_processed)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Option<ProcessingJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM processing_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProcessingJob::try_from).transpose()
    }

    async fn update_job(&self, id: JobId, update: JobUpdate) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = COALESCE($2, status),
                progress = COALESCE($3, progress),
                records_processed = COALESCE($4, records_processed),
                error_message = COALESCE($5, error_message),
                completed_at = COALESCE($6, completed_at)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status.map(|status| status.as_str()))
        .bind(update.progress)
        .bind(update.records_processed)
        .bind(update.error_message)
        .bind(update.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Processing job", id));
        }

        Ok(())
    }

    async fn list_recent_jobs(&self, limit: i64) -> StoreResult<Vec<ProcessingJob>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM processing_jobs ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProcessingJob::try_from).collect()
    }

    async fn count_completed_jobs(&self) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM processing_jobs WHERE status = $1")
                .bind(JobStatus::Completed.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_pending_jobs(&self) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM processing_jobs WHERE status IN ($1, $2)")
                .bind(JobStatus::Pending.as_str())
                .bind(JobStatus::Processing.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn persist_record(&self, record: &NewBreachRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO breach_records (id, username, domain, subdomain, password_hash, source_file)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.username)
        .bind(&record.domain)
        .bind(&record.subdomain)
        .bind(&record.password_hash)
        .bind(&record.source_file)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_by_username(&self, username: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM breach_records WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_records(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM breach_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
