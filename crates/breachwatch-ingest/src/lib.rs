//! Breachwatch bulk ingestion pipeline
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Streams large delimited credential dumps line by line, parses each line
//! into a breach record with a hashed secret, persists records in batches and
//! reports live progress through the job record.
//!
//! # Modules
//!
//! - [`source`]: re-readable byte streams and line framing
//! - [`parser`] / [`domain`]: line splitting and hostname decomposition
//! - [`batch`]: best-effort batch persistence
//! - [`gate`]: the exclusive ingestion slot
//! - [`processor`]: the two-pass ingestion run
//! - [`upload`]: validation and job creation for uploaded files
//! - [`store`]: persistence ports with PostgreSQL and in-memory adapters
//!
//! # Example
//!
//! ```no_run
//! use breachwatch_ingest::{FileProcessor, IngestConfig, JobGate, JobStore, MemorySource, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let processor = FileProcessor::new(
//!     Arc::new(MemoryStore::new()),
//!     IngestConfig::default(),
//!     JobGate::global(),
//! );
//! let job = processor.store().create_job("dump.txt", "38 B").await?;
//!
//! let source = MemorySource::from_lines("dump.txt", ["site.com,alice,hunter2"]);
//! let outcome = processor.process_file(job.id, &source).await?;
//! assert_eq!(outcome.records_processed, 1);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod parser;
pub mod processor;
pub mod progress;
pub mod source;
pub mod store;
pub mod upload;

pub use batch::{BatchReport, BatchWriter};
pub use config::{DbConfig, IngestConfig};
pub use error::{IngestError, IngestResult, ParseError, StoreError, StoreResult};
pub use gate::{JobGate, JobLease};
pub use processor::{FileProcessor, IngestOutcome};
pub use source::{FileSource, Line, LineSource, MemorySource};
pub use store::{IngestSummary, JobStore, JobUpdate, MemoryStore, PgStore, RecordStore};
pub use upload::{format_file_size, submit_file, Submission, UploadPolicy};
