//! Configuration management
//!
//! Ingestion and database settings are read from the environment, after
//! loading a `.env` file if one is present.

use breachwatch_common::{BreachError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Ingestion Constants
// ============================================================================

/// Records accumulated before a batch is flushed.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Records of one batch persisted concurrently.
pub const DEFAULT_PERSIST_CONCURRENCY: usize = 64;

/// Longest line read; longer lines are skipped unread.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Largest accepted upload (10 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Only files with this extension are accepted.
pub const DEFAULT_ALLOWED_EXTENSION: &str = "txt";

/// How often the CLI polls a running job.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

// ============================================================================
// Database Constants
// ============================================================================

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_DB_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Ingestion pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub persist_concurrency: usize,
    pub max_line_bytes: usize,
    pub max_upload_bytes: u64,
    pub allowed_extension: String,
    pub poll_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            persist_concurrency: DEFAULT_PERSIST_CONCURRENCY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extension: DEFAULT_ALLOWED_EXTENSION.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl IngestConfig {
    /// Load from `INGEST_*` environment variables
    ///
    /// - `INGEST_BATCH_SIZE`
    /// - `INGEST_PERSIST_CONCURRENCY`
    /// - `INGEST_MAX_LINE_BYTES`
    /// - `INGEST_MAX_UPLOAD_BYTES`
    /// - `INGEST_ALLOWED_EXTENSION`
    /// - `INGEST_POLL_INTERVAL_MS`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            batch_size: env_or("INGEST_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            persist_concurrency: env_or("INGEST_PERSIST_CONCURRENCY", DEFAULT_PERSIST_CONCURRENCY)?,
            max_line_bytes: env_or("INGEST_MAX_LINE_BYTES", DEFAULT_MAX_LINE_BYTES)?,
            max_upload_bytes: env_or("INGEST_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            allowed_extension: std::env::var("INGEST_ALLOWED_EXTENSION")
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or_else(|_| DEFAULT_ALLOWED_EXTENSION.to_string()),
            poll_interval_ms: env_or("INGEST_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BreachError::Config("Batch size must be greater than 0".to_string()));
        }

        if self.persist_concurrency == 0 {
            return Err(BreachError::Config(
                "Persist concurrency must be greater than 0".to_string(),
            ));
        }

        if self.max_line_bytes == 0 {
            return Err(BreachError::Config(
                "Maximum line length must be greater than 0".to_string(),
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(BreachError::Config(
                "Maximum upload size must be greater than 0".to_string(),
            ));
        }

        if self.allowed_extension.is_empty() {
            return Err(BreachError::Config("Allowed extension cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_persist_concurrency(mut self, concurrency: usize) -> Self {
        self.persist_concurrency = concurrency;
        self
    }

    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
}

impl DbConfig {
    /// Load from `DATABASE_URL` and `DB_*` environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = std::env::var("DATABASE_URL")
            .map_err(|_| BreachError::Config("DATABASE_URL not set".to_string()))?;

        let config = Self {
            url,
            max_connections: env_or("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            min_connections: env_or("DB_MIN_CONNECTIONS", DEFAULT_DB_MIN_CONNECTIONS)?,
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT", DEFAULT_DB_CONNECT_TIMEOUT_SECS)?,
            idle_timeout_secs: env_opt("DB_IDLE_TIMEOUT")?.or(Some(DEFAULT_DB_IDLE_TIMEOUT_SECS)),
            max_lifetime_secs: env_opt("DB_MAX_LIFETIME")?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(BreachError::Config("Database URL cannot be empty".to_string()));
        }

        if self.max_connections == 0 {
            return Err(BreachError::Config(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(BreachError::Config(format!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        Ok(())
    }
}

fn env_opt<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BreachError::invalid_env(key, &raw)),
        Err(_) => Ok(None),
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    Ok(env_opt(key)?.unwrap_or(default))
}
