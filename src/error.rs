//! Error types for the roster pipeline.
//!
//! Row-level problems (`ParseError`) never escape an import; they are turned
//! into summary messages. `TransferError` is the one batch-level failure.

use thiserror::Error;

/// Why a single CSV row could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected at least 10 columns, found {found}")]
    TooFewColumns { found: usize },

    #[error("no phone number found")]
    NoPhoneNumber,

    #[error("invalid date format: '{0}' (expected dd/MM/yyyy)")]
    InvalidDate(String),

    #[error("invalid GPA: '{0}'")]
    InvalidGpa(String),

    #[error("GPA {0} is outside 0.0-4.0")]
    GpaOutOfRange(f64),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid gender: '{0}'")]
    InvalidGender(String),
}

/// Storage backend failures.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The record failed validation at the repository boundary
    #[error("record rejected: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Batch-level import/export failure.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The job runner shut down before the request completed
    #[error("job runner stopped")]
    RunnerStopped,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;
