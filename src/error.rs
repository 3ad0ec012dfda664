//! The `error` module defines the library-specific error type `MatchError`, and an alias
//! for `Result` using it, called `MatchResult`.
use thiserror::Error;

/// The `MatchError` enum represents the library-specific error type. Per the error-handling
/// design, only structural failures (schema mismatch, connection loss, or — for the in-memory
/// adapters used here — a poisoned lock) are fatal; input defects and query failures are
/// handled by downgrading a document's state rather than raising an error.
#[derive(Error, Debug)]
pub enum MatchError {
    /// A store operation could not complete because the underlying session was lost.
    #[error("store session lost: {0}")]
    SessionLost(String),
    /// A batch write failed and was rolled back; the pipeline continues with the next batch.
    #[error("batch write failed: {0}")]
    BatchWriteFailed(String),
    /// A candidate query exceeded its configured timeout.
    #[error("candidate query timed out after {0:?}")]
    QueryTimeout(std::time::Duration),
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Error conversion type for [`std::io::Error`].
    #[error("input/output error")]
    Io(#[from] std::io::Error),
    /// Error conversion type for CSV (de)serialization, used by the snapshot exporter.
    #[error("csv error")]
    Csv(#[from] csv::Error),
    /// Error conversion type for TOML config parsing.
    #[error("toml error")]
    Toml(#[from] toml::de::Error),
}

/// Alias for the `Result` type using the local error type.
pub type MatchResult<T> = Result<T, MatchError>;
