//! Upload intake
//!
//! Validates an uploaded dump, records a pending job for it and hands it to
//! the processor. The file itself is left in place.

use breachwatch_common::ProcessingJob;
use std::path::Path;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::processor::{FileProcessor, IngestOutcome};
use crate::source::FileSource;
use crate::store::{JobStore, RecordStore};

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Human-readable size label with 1024-based units
///
/// At most two decimals, trailing zeros dropped: `1536` is `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    let formatted = format!("{:.2}", size);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit_idx])
}

/// Acceptance rules for uploaded files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    /// Without the leading dot
    pub allowed_extension: String,
}

impl UploadPolicy {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            allowed_extension: config.allowed_extension.clone(),
        }
    }

    /// Check name and size; the extension match is case-sensitive
    pub fn validate(&self, filename: &str, size: u64) -> IngestResult<()> {
        let suffix = format!(".{}", self.allowed_extension);
        if !filename.ends_with(&suffix) {
            return Err(IngestError::Validation(format!(
                "only .{} files are accepted, got '{}'",
                self.allowed_extension, filename
            )));
        }

        if size > self.max_bytes {
            return Err(IngestError::Validation(format!(
                "file is {} but the limit is {}",
                format_file_size(size),
                format_file_size(self.max_bytes)
            )));
        }

        Ok(())
    }
}

/// A job accepted for processing
#[derive(Debug)]
pub struct Submission {
    /// The job as created, still `pending`
    pub job: ProcessingJob,
    pub handle: JoinHandle<IngestResult<IngestOutcome>>,
}

/// Validate `path`, create its job and start ingesting it in the background
///
/// A busy pipeline is reported as [`IngestError::Conflict`] before any job
/// is created.
pub async fn submit_file<S>(processor: &FileProcessor<S>, path: &Path) -> IngestResult<Submission>
where
    S: JobStore + RecordStore + ?Sized + 'static,
{
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::Validation(format!("unusable file name: {}", path.display())))?
        .to_string();

    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(IngestError::Validation(format!("{} is not a regular file", path.display())));
    }

    let policy = UploadPolicy::from_config(processor.config());
    policy.validate(&filename, metadata.len())?;

    if let Some(active_job) = processor.gate().active_job() {
        return Err(IngestError::Conflict { active_job });
    }

    let job = processor
        .store()
        .create_job(&filename, &format_file_size(metadata.len()))
        .await?;

    info!(
        job_id = %job.id,
        filename = %job.filename,
        size = %job.original_size,
        "Upload accepted"
    );

    let handle = processor.start(job.id, FileSource::new(path))?;

    Ok(Submission { job, handle })
}
