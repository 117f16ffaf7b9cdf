//! File processor
//!
//! Drives one ingestion run end to end:
//!
//! 1. Claim the exclusive slot (or fail with a conflict, job untouched)
//! 2. Mark the job `processing` at 0%
//! 3. First pass: count lines
//! 4. Second pass: parse, batch, flush, report progress after each flush
//! 5. Flush the tail batch and mark the job `completed` at 100%
//!
//! Only `pending` jobs are run; a job in any other state is refused before
//! anything is written. Any error escaping steps 2-5 marks the job `failed`
//! with its message. The slot is released on every exit path.

use breachwatch_common::{JobId, JobStatus, NewBreachRecord, ProcessingStatus};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::batch::BatchWriter;
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult, StoreError};
use crate::gate::{JobGate, JobLease};
use crate::parser::parse_line;
use crate::source::{count_lines, lines, Line, LineSource};
use crate::store::{JobStore, JobUpdate, RecordStore};

/// Counters for a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub job_id: JobId,
    /// Lines read in the second pass, blanks included
    pub lines_seen: u64,
    /// Records handed to the batch writer
    pub records_processed: i64,
    /// Lines rejected by the parser or over the length limit
    pub lines_skipped: u64,
    /// Records the store refused; included in `records_processed`
    pub records_failed: u64,
}

/// Percentage of lines seen, floored and clamped to 0..=100
pub fn progress_percent(lines_seen: u64, total_lines: u64) -> i32 {
    if total_lines == 0 {
        return 100;
    }
    let percent = lines_seen.saturating_mul(100) / total_lines;
    percent.min(100) as i32
}

/// Runs files through the pipeline under an exclusive slot
pub struct FileProcessor<S: ?Sized> {
    store: Arc<S>,
    gate: JobGate,
    config: Arc<IngestConfig>,
}

impl<S: ?Sized> Clone for FileProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gate: self.gate.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> FileProcessor<S>
where
    S: JobStore + RecordStore + ?Sized + 'static,
{
    /// Processor guarded by `gate`
    ///
    /// Processors holding clones of one gate never run concurrently. Pass
    /// [`JobGate::global`] for the process-wide slot.
    pub fn new(store: Arc<S>, config: IngestConfig, gate: JobGate) -> Self {
        Self {
            store,
            gate,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn gate(&self) -> &JobGate {
        &self.gate
    }

    /// Non-blocking snapshot of the ingestion slot
    pub fn status(&self) -> ProcessingStatus {
        self.gate.status()
    }

    /// Start ingesting `source` into `job_id` on a background task
    ///
    /// Fails immediately with [`IngestError::Conflict`] if another run holds
    /// the slot; the job is not touched in that case. The returned handle
    /// resolves once the job reached `completed` or `failed`.
    pub fn start<L>(
        &self,
        job_id: JobId,
        source: L,
    ) -> IngestResult<JoinHandle<IngestResult<IngestOutcome>>>
    where
        L: LineSource + 'static,
    {
        let lease = self.gate.try_acquire(job_id)?;
        let processor = self.clone();
        let span = info_span!("ingest", %job_id);

        Ok(tokio::spawn(
            async move { processor.run(lease, &source).await }.instrument(span),
        ))
    }

    /// Ingest `source` into `job_id` on the current task
    pub async fn process_file<L>(&self, job_id: JobId, source: &L) -> IngestResult<IngestOutcome>
    where
        L: LineSource + ?Sized,
    {
        let lease = self.gate.try_acquire(job_id)?;
        self.run(lease, source).await
    }

    async fn run<L>(&self, mut lease: JobLease, source: &L) -> IngestResult<IngestOutcome>
    where
        L: LineSource + ?Sized,
    {
        let job_id = lease.job_id();
        let result = self.ingest(job_id, source).await;

        let failure = match &result {
            // Refused before the job was touched
            Err(IngestError::InvalidState { .. }) => None,
            Err(e) => Some(e.to_string()),
            Ok(_) => None,
        };
        if let Some(message) = failure {
            error!(%job_id, error = %message, "Ingestion failed");
            if let Err(update_err) = self.store.update_job(job_id, JobUpdate::failed(message)).await {
                error!(%job_id, error = %update_err, "Could not mark job as failed");
            }
        }

        lease.release();
        result
    }

    async fn ingest<L>(&self, job_id: JobId, source: &L) -> IngestResult<IngestOutcome>
    where
        L: LineSource + ?Sized,
    {
        let started = Instant::now();

        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(IngestError::JobNotFound(job_id))?;
        if job.status != JobStatus::Pending {
            warn!(%job_id, status = %job.status, "Refusing to run a job that is not pending");
            return Err(IngestError::InvalidState {
                job: job_id,
                status: job.status,
            });
        }
        self.update(job_id, JobUpdate::processing()).await?;

        info!(
            %job_id,
            filename = %job.filename,
            source = %source.display_name(),
            "Starting ingestion"
        );

        let total_lines = count_lines(source).await?;
        debug!(%job_id, total_lines, "Line count pass finished");

        let writer = BatchWriter::new(Arc::clone(&self.store), self.config.persist_concurrency);
        let batch_size = self.config.batch_size.max(1);
        let mut batch: Vec<NewBreachRecord> = Vec::with_capacity(batch_size);
        let mut outcome = IngestOutcome {
            job_id,
            lines_seen: 0,
            records_processed: 0,
            lines_skipped: 0,
            records_failed: 0,
        };
        let mut progress = 0;

        let mut stream = lines(source, self.config.max_line_bytes).await?;
        while let Some(line) = stream.next().await {
            outcome.lines_seen += 1;
            let line = match line? {
                Line::Text(text) => text,
                Line::Overlong { length } => {
                    outcome.lines_skipped += 1;
                    debug!(%job_id, line = outcome.lines_seen, length, "Skipping overlong line");
                    continue;
                },
            };

            match parse_line(&line, &job.filename) {
                Ok(Some(record)) => batch.push(record),
                Ok(None) => {},
                Err(e) => {
                    outcome.lines_skipped += 1;
                    debug!(%job_id, line = outcome.lines_seen, error = %e, "Skipping malformed line");
                },
            }

            if batch.len() >= batch_size {
                self.flush(&writer, &mut batch, &mut outcome).await;
                progress = progress.max(progress_percent(outcome.lines_seen, total_lines));
                self.update(job_id, JobUpdate::progress(progress, outcome.records_processed))
                    .await?;
            }
        }

        self.flush(&writer, &mut batch, &mut outcome).await;
        self.update(job_id, JobUpdate::completed(outcome.records_processed))
            .await?;

        if outcome.records_failed > 0 {
            warn!(
                %job_id,
                records_failed = outcome.records_failed,
                "Some records could not be persisted"
            );
        }

        info!(
            %job_id,
            lines_seen = outcome.lines_seen,
            records_processed = outcome.records_processed,
            lines_skipped = outcome.lines_skipped,
            duration_ms = started.elapsed().as_millis() as u64,
            "Ingestion completed"
        );

        Ok(outcome)
    }

    async fn flush(
        &self,
        writer: &BatchWriter<S>,
        batch: &mut Vec<NewBreachRecord>,
        outcome: &mut IngestOutcome,
    ) {
        if batch.is_empty() {
            return;
        }
        let report = writer.write(batch).await;
        outcome.records_processed += report.attempted() as i64;
        outcome.records_failed += report.failed as u64;
        batch.clear();
    }

    /// Job updates that hit a missing row mean the job vanished mid-run
    async fn update(&self, job_id: JobId, update: JobUpdate) -> IngestResult<()> {
        self.store
            .update_job(job_id, update)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => IngestError::JobNotFound(job_id),
                other => IngestError::Store(other),
            })
    }
}
