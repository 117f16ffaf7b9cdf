//! Best-effort batch persistence
//!
//! Every record in a batch is persisted independently. A record that fails
//! to insert is logged and counted; the rest of the batch still lands and
//! nothing is rolled back.

use breachwatch_common::NewBreachRecord;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::RecordStore;

/// Aggregate outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub persisted: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.persisted + self.failed
    }
}

/// Flushes batches of parsed records into a [`RecordStore`]
pub struct BatchWriter<S: ?Sized> {
    store: Arc<S>,
    concurrency: usize,
}

impl<S: ?Sized> Clone for BatchWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            concurrency: self.concurrency,
        }
    }
}

impl<S> BatchWriter<S>
where
    S: RecordStore + ?Sized,
{
    /// `concurrency` bounds in-flight inserts; zero is treated as one
    pub fn new(store: Arc<S>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Persist every record, tolerating individual failures
    ///
    /// Records may reach the store out of order.
    pub async fn write(&self, records: &[NewBreachRecord]) -> BatchReport {
        if records.is_empty() {
            return BatchReport::default();
        }

        // Built eagerly: a lazy stream `map` here makes the spawned ingest
        // future fail the `Send` bound.
        let inserts: Vec<_> = records
            .iter()
            .map(|record| {
                let store = Arc::clone(&self.store);
                async move {
                    match store.persist_record(record).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(
                                domain = %record.domain,
                                source_file = %record.source_file,
                                error = %e,
                                "Failed to persist breach record"
                            );
                            false
                        },
                    }
                }
            })
            .collect();

        let outcomes: Vec<bool> = stream::iter(inserts)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let persisted = outcomes.iter().filter(|ok| **ok).count();
        let report = BatchReport {
            persisted,
            failed: outcomes.len() - persisted,
        };

        debug!(
            persisted = report.persisted,
            failed = report.failed,
            "Batch flushed"
        );

        report
    }
}
