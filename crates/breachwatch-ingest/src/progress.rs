//! Progress bar utilities for the operator CLI

use breachwatch_common::{JobStatus, ProcessingJob};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Bar tracking a job's percentage
pub fn create_job_progress(filename: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% ({prefix} records)",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(format!("Ingesting {}", filename));
    pb.set_prefix("0");
    pb
}

/// Spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Mirror a polled job record onto the bar
pub fn apply_job(pb: &ProgressBar, job: &ProcessingJob) {
    pb.set_position(job.progress.clamp(0, 100) as u64);
    pb.set_prefix(job.records_processed.to_string());

    match job.status {
        JobStatus::Completed => pb.finish_with_message(format!(
            "Completed {} ({} records)",
            job.filename, job.records_processed
        )),
        JobStatus::Failed => pb.abandon_with_message(format!(
            "Failed {}: {}",
            job.filename,
            job.error_message.as_deref().unwrap_or("unknown error")
        )),
        JobStatus::Pending | JobStatus::Processing => {},
    }
}
