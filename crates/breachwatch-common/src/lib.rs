//! Breachwatch Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the breachwatch workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Shared error type and result alias
//! - **Digest**: One-way hashing of plaintext secrets
//! - **Logging**: Centralized tracing subscriber setup
//! - **Types**: Processing jobs, breach records and status snapshots
//!
//! # Example
//!
//! ```
//! use breachwatch_common::digest::secret_digest;
//!
//! let digest = secret_digest("hunter2");
//! assert_eq!(digest.len(), 64);
//! ```

pub mod digest;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{BreachError, Result};
pub use types::{BreachRecord, JobId, JobStatus, NewBreachRecord, ProcessingJob, ProcessingStatus};
