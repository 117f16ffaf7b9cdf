//! Breachwatch Ingest - operator CLI for the bulk ingestion pipeline

use anyhow::{bail, Context, Result};
use breachwatch_common::logging::{init_logging, LogConfig, LogLevel};
use breachwatch_common::ProcessingJob;
use breachwatch_ingest::progress::{apply_job, create_job_progress, create_spinner};
use breachwatch_ingest::store::{postgres, summary, DEFAULT_RECENT_JOBS_LIMIT};
use breachwatch_ingest::{
    submit_file, DbConfig, FileProcessor, IngestConfig, JobGate, JobStore, PgStore, RecordStore,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "breachwatch-ingest")]
#[command(author, version, about = "Breach credential ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a credential dump and follow its progress
    Ingest {
        /// Dump file (`url,username,secret` per line)
        file: PathBuf,
    },

    /// List recent processing jobs
    Jobs {
        #[arg(short, long, default_value_t = DEFAULT_RECENT_JOBS_LIMIT)]
        limit: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one processing job
    Job {
        id: Uuid,
    },

    /// Count exposures for a username (exact match)
    Count {
        username: String,
    },

    /// Show record and job totals
    Stats,

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("breachwatch-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let db_config = DbConfig::from_env().context("Invalid database configuration")?;
    let store = Arc::new(
        PgStore::connect(&db_config)
            .await
            .context("Failed to connect to database")?,
    );

    match cli.command {
        Command::Ingest { file } => {
            let config = IngestConfig::from_env()?;
            ingest(Arc::clone(&store), config, file).await?;
        },
        Command::Jobs { limit, json } => {
            let jobs = store.list_recent_jobs(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else {
                print_jobs(&jobs);
            }
        },
        Command::Job { id } => match store.get_job(id).await? {
            Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
            None => bail!("Job {} not found", id),
        },
        Command::Count { username } => {
            let count = store.count_by_username(&username).await?;
            println!("{}", count);
        },
        Command::Stats => {
            let summary = summary(store.as_ref()).await?;
            println!("Total records:   {}", summary.total_records);
            println!("Files processed: {}", summary.files_processed);
            println!("Queued jobs:     {}", summary.queue_count);
        },
        Command::Migrate => {
            let spinner = create_spinner("Applying migrations...");
            postgres::migrate(store.pool()).await?;
            spinner.finish_with_message("Migrations applied");
        },
    }

    Ok(())
}

async fn ingest(store: Arc<PgStore>, config: IngestConfig, file: PathBuf) -> Result<()> {
    config.validate()?;
    let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));
    let processor = FileProcessor::new(Arc::clone(&store), config, JobGate::global());

    let submission = submit_file(&processor, &file)
        .await
        .with_context(|| format!("Failed to submit {}", file.display()))?;
    let job_id = submission.job.id;
    let mut handle = submission.handle;

    let pb = create_job_progress(&submission.job.filename);
    let mut ticker = tokio::time::interval(poll_interval);

    let result = loop {
        tokio::select! {
            joined = &mut handle => break joined,
            _ = ticker.tick() => {
                if let Some(job) = store.get_job(job_id).await? {
                    apply_job(&pb, &job);
                }
            }
        }
    };

    if let Some(job) = store.get_job(job_id).await? {
        apply_job(&pb, &job);
    }

    let outcome = result??;
    info!(
        job_id = %outcome.job_id,
        lines_seen = outcome.lines_seen,
        records_processed = outcome.records_processed,
        lines_skipped = outcome.lines_skipped,
        records_failed = outcome.records_failed,
        "Ingestion finished"
    );

    println!("Job:               {}", outcome.job_id);
    println!("Lines read:        {}", outcome.lines_seen);
    println!("Records processed: {}", outcome.records_processed);
    println!("Lines skipped:     {}", outcome.lines_skipped);
    println!("Records failed:    {}", outcome.records_failed);

    Ok(())
}

fn print_jobs(jobs: &[ProcessingJob]) {
    println!(
        "{:<36}  {:<10}  {:>4}  {:>12}  {:<10}  {}",
        "ID", "STATUS", "PCT", "RECORDS", "SIZE", "FILE"
    );
    for job in jobs {
        println!(
            "{:<36}  {:<10}  {:>3}%  {:>12}  {:<10}  {}",
            job.id, job.status.as_str(), job.progress, job.records_processed, job.original_size, job.filename
        );
    }
}
