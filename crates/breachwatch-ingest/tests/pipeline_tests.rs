//! End-to-end ingestion tests against the in-memory store
//!
//! Covers the job lifecycle, the exclusive slot, progress reporting and the
//! failure policy (skipped lines, per-record failures, fatal store errors).

use anyhow::Result;
use async_trait::async_trait;
use breachwatch_common::digest::secret_digest;
use breachwatch_common::{JobId, JobStatus, NewBreachRecord, ProcessingJob};
use breachwatch_ingest::error::{StoreError, StoreResult};
use breachwatch_ingest::source::SourceReader;
use breachwatch_ingest::{
    submit_file, FileProcessor, IngestConfig, IngestError, JobGate, JobStore, JobUpdate,
    LineSource, MemorySource, MemoryStore, RecordStore,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,breachwatch_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum ProgressFault {
    /// Job row disappears on the first progress update
    Vanish,
    /// Progress updates fail as if the database were down
    Unreachable,
}

/// Memory store that records job updates and can inject faults
#[derive(Default)]
struct ScriptedStore {
    inner: MemoryStore,
    updates: Mutex<Vec<JobUpdate>>,
    progress_fault: Option<ProgressFault>,
    reject_username_prefix: Option<&'static str>,
}

impl ScriptedStore {
    fn with_progress_fault(fault: ProgressFault) -> Self {
        Self {
            progress_fault: Some(fault),
            ..Default::default()
        }
    }

    fn rejecting(prefix: &'static str) -> Self {
        Self {
            reject_username_prefix: Some(prefix),
            ..Default::default()
        }
    }

    fn updates(&self) -> Vec<JobUpdate> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JobStore for ScriptedStore {
    async fn create_job(&self, filename: &str, original_size: &str) -> StoreResult<ProcessingJob> {
        self.inner.create_job(filename, original_size).await
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Option<ProcessingJob>> {
        self.inner.get_job(id).await
    }

    async fn update_job(&self, id: JobId, update: JobUpdate) -> StoreResult<()> {
        let is_progress = update.status.is_none() && update.progress.is_some();
        if is_progress {
            match self.progress_fault {
                Some(ProgressFault::Vanish) => {
                    self.inner.remove_job(id);
                },
                Some(ProgressFault::Unreachable) => {
                    return Err(StoreError::Unavailable("connection refused".to_string()));
                },
                None => {},
            }
        }

        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update.clone());
        }
        self.inner.update_job(id, update).await
    }

    async fn list_recent_jobs(&self, limit: i64) -> StoreResult<Vec<ProcessingJob>> {
        self.inner.list_recent_jobs(limit).await
    }

    async fn count_completed_jobs(&self) -> StoreResult<i64> {
        self.inner.count_completed_jobs().await
    }

    async fn count_pending_jobs(&self) -> StoreResult<i64> {
        self.inner.count_pending_jobs().await
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn persist_record(&self, record: &NewBreachRecord) -> StoreResult<()> {
        if let Some(prefix) = self.reject_username_prefix {
            if record.username.starts_with(prefix) {
                return Err(StoreError::Unavailable("value too long".to_string()));
            }
        }
        self.inner.persist_record(record).await
    }

    async fn count_by_username(&self, username: &str) -> StoreResult<i64> {
        self.inner.count_by_username(username).await
    }

    async fn count_records(&self) -> StoreResult<i64> {
        self.inner.count_records().await
    }
}

/// Source whose readers block until the test opens the gate
struct GatedSource {
    inner: MemorySource,
    open: watch::Receiver<bool>,
}

impl GatedSource {
    fn new(inner: MemorySource) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { inner, open: rx }, tx)
    }
}

#[async_trait]
impl LineSource for GatedSource {
    async fn open(&self) -> std::io::Result<SourceReader> {
        let mut open = self.open.clone();
        loop {
            let ready = *open.borrow_and_update();
            if ready {
                break;
            }
            open.changed().await.map_err(std::io::Error::other)?;
        }
        self.inner.open().await
    }

    fn display_name(&self) -> String {
        self.inner.display_name()
    }
}

fn valid_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("host{i}.example.com,user{i},secret{i}"))
        .collect()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_mixed_file_end_to_end() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());
    let job = store.create_job("mixed.txt", "68 B").await?;

    let source = MemorySource::from_lines(
        "mixed.txt",
        ["site.com,alice,hunter2", "", "bad,line", "other.co.uk;bob;pw123"],
    );
    let outcome = processor.start(job.id, source)?.await??;

    assert_eq!(outcome.lines_seen, 4);
    assert_eq!(outcome.lines_skipped, 1);
    assert_eq!(outcome.records_processed, 2);

    let mut records = store.records();
    records.sort_by(|a, b| a.username.cmp(&b.username));
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].username, "alice");
    assert_eq!(records[0].domain, "site.com");
    assert_eq!(records[0].subdomain, None);
    assert_eq!(records[0].password_hash, secret_digest("hunter2"));
    assert_eq!(records[0].source_file, "mixed.txt");

    assert_eq!(records[1].username, "bob");
    assert_eq!(records[1].domain, "co.uk");
    assert_eq!(records[1].subdomain.as_deref(), Some("other"));
    assert_eq!(records[1].password_hash, secret_digest("pw123"));

    let job = store.get_job(job.id).await?.expect("job exists");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_processed, 2);
    assert_eq!(job.progress, 100);
    assert!(job.completed_at.is_some());
    assert!(job.error_message.is_none());
    assert!(!processor.status().is_processing);

    Ok(())
}

#[tokio::test]
async fn test_garbage_lines_never_abort() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());
    let job = store.create_job("noisy.txt", "1 KB").await?;

    let data = b"a.com,u1,p1\n\xff\xfe\xfd\n;;\none,two,three,four\n  \t \nb.com;u2;p2\r\nc.com,,p3\nlast.com,u3,p3"
        .to_vec();
    let outcome = processor
        .process_file(job.id, &MemorySource::new("noisy.txt", data))
        .await?;

    assert_eq!(outcome.lines_seen, 8);
    assert_eq!(outcome.records_processed, 3);
    assert_eq!(outcome.lines_skipped, 4);
    assert_eq!(store.get_job(job.id).await?.expect("job").status, JobStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_uploads_are_all_stored() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());
    let source = MemorySource::from_lines("dup.txt", ["site.com,alice,hunter2"]);

    for _ in 0..2 {
        let job = store.create_job("dup.txt", "23 B").await?;
        processor.process_file(job.id, &source).await?;
    }

    assert_eq!(store.count_by_username("alice").await?, 2);
    assert_eq!(store.count_by_username("Alice").await?, 0);
    Ok(())
}

// ============================================================================
// Exclusive slot
// ============================================================================

#[tokio::test]
async fn test_second_start_conflicts_and_leaves_jobs_untouched() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());
    let first = store.create_job("first.txt", "1 KB").await?;
    let second = store.create_job("second.txt", "1 KB").await?;

    let (source, open) = GatedSource::new(MemorySource::from_lines("first.txt", valid_lines(3)));
    let handle = processor.start(first.id, source)?;

    let err = processor
        .start(second.id, MemorySource::from_lines("second.txt", valid_lines(1)))
        .expect_err("slot is taken");
    assert!(matches!(err, IngestError::Conflict { active_job } if active_job == first.id));
    assert_eq!(processor.status().current_job_id, Some(first.id));

    let untouched = store.get_job(second.id).await?.expect("second job");
    assert_eq!(untouched.status, JobStatus::Pending);
    assert_eq!(untouched.progress, 0);

    open.send(true)?;
    handle.await??;

    let first = store.get_job(first.id).await?.expect("first job");
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.records_processed, 3);
    assert_eq!(store.get_job(second.id).await?.expect("second job").status, JobStatus::Pending);
    assert!(!processor.status().is_processing);

    Ok(())
}

#[tokio::test]
async fn test_processors_on_one_gate_never_overlap() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let gate = JobGate::new();
    let first = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), gate.clone());
    let second = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), gate);
    let a = store.create_job("a.txt", "1 KB").await?;
    let b = store.create_job("b.txt", "1 KB").await?;

    let (source, open) = GatedSource::new(MemorySource::from_lines("a.txt", valid_lines(4)));
    let handle = first.start(a.id, source)?;

    // Both processors report the run held open on the shared slot
    assert_eq!(first.status().current_job_id, Some(a.id));
    assert_eq!(second.status().current_job_id, Some(a.id));

    let err = second
        .start(b.id, MemorySource::from_lines("b.txt", valid_lines(1)))
        .expect_err("slot is shared");
    assert!(matches!(err, IngestError::Conflict { active_job } if active_job == a.id));
    assert!(store.jobs_with_status(JobStatus::Processing).len() <= 1);

    open.send(true)?;
    handle.await??;
    assert!(!second.status().is_processing);

    second
        .start(b.id, MemorySource::from_lines("b.txt", valid_lines(1)))?
        .await??;
    assert_eq!(store.jobs_with_status(JobStatus::Completed).len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_upload_while_busy_creates_no_job() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());

    let mut file = tempfile::Builder::new().suffix(".txt").tempfile()?;
    writeln!(file, "site.com,alice,hunter2")?;
    file.flush()?;

    let busy = store.create_job("busy.txt", "1 KB").await?;
    let lease = processor.gate().try_acquire(busy.id)?;

    let err = submit_file(&processor, file.path()).await.expect_err("busy");
    assert!(err.is_conflict());
    assert_eq!(store.list_recent_jobs(10).await?.len(), 1);
    assert!(store.jobs_with_status(JobStatus::Processing).is_empty());

    drop(lease);
    let submission = submit_file(&processor, file.path()).await?;
    assert_eq!(submission.job.status, JobStatus::Pending);
    assert_eq!(submission.job.original_size, "23 B");
    let outcome = submission.handle.await??;
    assert_eq!(outcome.records_processed, 1);
    assert!(file.path().exists());

    Ok(())
}

#[tokio::test]
async fn test_upload_rejects_wrong_extension() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());

    let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
    writeln!(file, "site.com,alice,hunter2")?;
    file.flush()?;

    let err = submit_file(&processor, file.path()).await.expect_err("csv rejected");
    assert!(matches!(err, IngestError::Validation(_)));
    assert!(store.list_recent_jobs(10).await?.is_empty());
    Ok(())
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_100() -> Result<()> {
    init_tracing();
    let store = Arc::new(ScriptedStore::default());
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());
    let job = store.create_job("big.txt", "90 KB").await?;

    processor
        .process_file(job.id, &MemorySource::from_lines("big.txt", valid_lines(2500)))
        .await?;

    let updates = store.updates();
    let progress: Vec<i32> = updates.iter().filter_map(|u| u.progress).collect();
    let records: Vec<i64> = updates.iter().filter_map(|u| u.records_processed).collect();

    assert_eq!(progress, vec![0, 40, 80, 100]);
    assert_eq!(records, vec![1000, 2000, 2500]);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(updates.last().and_then(|u| u.status), Some(JobStatus::Completed));

    Ok(())
}

// ============================================================================
// Failure policy
// ============================================================================

#[tokio::test]
async fn test_record_failures_do_not_fail_job() -> Result<()> {
    init_tracing();
    let store = Arc::new(ScriptedStore::rejecting("bad"));
    let processor = FileProcessor::new(Arc::clone(&store), IngestConfig::default(), JobGate::new());
    let job = store.create_job("partial.txt", "1 KB").await?;

    let source = MemorySource::from_lines(
        "partial.txt",
        ["a.com,alice,p", "b.com,bad1,p", "c.com,carol,p", "d.com,bad2,p"],
    );
    let outcome = processor.process_file(job.id, &source).await?;

    assert_eq!(outcome.records_processed, 4);
    assert_eq!(outcome.records_failed, 2);
    assert_eq!(store.count_records().await?, 2);

    let job = store.get_job(job.id).await?.expect("job");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_store_marks_job_failed() -> Result<()> {
    init_tracing();
    let store = Arc::new(ScriptedStore::with_progress_fault(ProgressFault::Unreachable));
    let processor = FileProcessor::new(
        Arc::clone(&store),
        IngestConfig::default().with_batch_size(10),
        JobGate::new(),
    );
    let job = store.create_job("down.txt", "1 KB").await?;

    let err = processor
        .process_file(job.id, &MemorySource::from_lines("down.txt", valid_lines(25)))
        .await
        .expect_err("store is down");
    assert!(matches!(err, IngestError::Store(StoreError::Unavailable(_))));

    let job = store.get_job(job.id).await?.expect("job");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("connection refused")));
    assert!(job.completed_at.is_none());
    assert!(!processor.status().is_processing);
    Ok(())
}

#[tokio::test]
async fn test_vanished_job_fails_and_frees_slot() -> Result<()> {
    init_tracing();
    let store = Arc::new(ScriptedStore::with_progress_fault(ProgressFault::Vanish));
    let processor = FileProcessor::new(
        Arc::clone(&store),
        IngestConfig::default().with_batch_size(10),
        JobGate::new(),
    );
    let job = store.create_job("gone.txt", "1 KB").await?;

    let err = processor
        .start(job.id, MemorySource::from_lines("gone.txt", valid_lines(25)))?
        .await?
        .expect_err("job vanished");
    assert!(matches!(err, IngestError::JobNotFound(id) if id == job.id));

    // The first batch was flushed before the progress update noticed
    assert_eq!(store.count_records().await?, 10);
    assert!(!processor.status().is_processing);

    let next = store.create_job("next.txt", "1 KB").await?;
    let outcome = processor
        .process_file(next.id, &MemorySource::from_lines("next.txt", valid_lines(5)))
        .await;
    // Progress faults only trigger on full batches
    assert_eq!(outcome?.records_processed, 5);
    Ok(())
}
