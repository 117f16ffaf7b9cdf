//! Error types for breachwatch

use thiserror::Error;

/// Result type alias for breachwatch operations
pub type Result<T> = std::result::Result<T, BreachError>;

/// Main error type for breachwatch
#[derive(Error, Debug)]
pub enum BreachError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid job status: {0}")]
    InvalidJobStatus(String),
}

impl BreachError {
    /// Create a configuration error for an environment variable that failed to parse
    pub fn invalid_env(key: &str, value: &str) -> Self {
        Self::Config(format!("{} has invalid value '{}'", key, value))
    }
}
