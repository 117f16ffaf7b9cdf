//! Exclusive ingestion slot
//!
//! At most one file is ingested at a time. [`JobGate::try_acquire`] hands out
//! a [`JobLease`] that frees the slot when dropped, so every exit path of a
//! run (success, fatal error, panic) releases it.
//!
//! Clones share one slot. [`JobGate::global`] is the slot for the whole
//! process; processors built on it exclude each other even when they were
//! created independently.

use breachwatch_common::{JobId, ProcessingStatus};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::debug;

use crate::error::IngestError;

/// Single-slot lease over the ingestion pipeline
#[derive(Debug, Clone, Default)]
pub struct JobGate {
    slot: Arc<Mutex<Option<JobId>>>,
}

static GLOBAL_GATE: OnceLock<JobGate> = OnceLock::new();

impl JobGate {
    /// A fresh slot, independent of every other gate
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot
    pub fn global() -> Self {
        GLOBAL_GATE.get_or_init(JobGate::new).clone()
    }

    /// Whether both handles guard the same slot
    pub fn shares_slot_with(&self, other: &JobGate) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    fn slot(&self) -> MutexGuard<'_, Option<JobId>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for `job_id`
    ///
    /// Check and claim happen under one lock, so two racing callers can never
    /// both succeed.
    pub fn try_acquire(&self, job_id: JobId) -> Result<JobLease, IngestError> {
        let mut slot = self.slot();
        if let Some(active_job) = *slot {
            return Err(IngestError::Conflict { active_job });
        }
        *slot = Some(job_id);
        debug!(%job_id, "Ingestion slot acquired");

        Ok(JobLease {
            gate: self.clone(),
            job_id,
            released: false,
        })
    }

    /// Job currently holding the slot, if any
    pub fn active_job(&self) -> Option<JobId> {
        *self.slot()
    }

    pub fn is_busy(&self) -> bool {
        self.active_job().is_some()
    }

    /// Snapshot for status polling
    pub fn status(&self) -> ProcessingStatus {
        let current_job_id = self.active_job();
        ProcessingStatus {
            is_processing: current_job_id.is_some(),
            current_job_id,
        }
    }

    fn release_if_held_by(&self, job_id: JobId) {
        let mut slot = self.slot();
        if *slot == Some(job_id) {
            *slot = None;
            debug!(%job_id, "Ingestion slot released");
        }
    }
}

/// Proof of holding the ingestion slot
#[derive(Debug)]
#[must_use = "dropping the lease frees the ingestion slot immediately"]
pub struct JobLease {
    gate: JobGate,
    job_id: JobId,
    released: bool,
}

impl JobLease {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Free the slot now; later calls and the drop are no-ops
    pub fn release(&mut self) {
        if !self.released {
            self.gate.release_if_held_by(self.job_id);
            self.released = true;
        }
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.release();
    }
}
