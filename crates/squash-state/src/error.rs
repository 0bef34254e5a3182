//! Error types for squash-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the backing database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Missing or malformed store configuration
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the repository traits.
///
/// Every variant other than the two `*NotFound` lookups means a write was
/// rejected and fully rolled back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// No job with the given ID
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// No metric with the given code
    #[error("metric not found: {code}")]
    MetricNotFound { code: String },

    /// The store rejected the write (constraint or concurrent-write conflict)
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The store did not answer in time
    #[error("store timed out: {0}")]
    Timeout(String),

    /// Any other backend failure (I/O, connection, malformed rows)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Classify a SurrealDB error raised while running a write.
    pub(crate) fn from_surreal(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("timed out") || lowered.contains("timeout") {
            StorageError::Timeout(message)
        } else if lowered.contains("already contains")
            || lowered.contains("conflict")
            || lowered.contains("assert")
            || lowered.contains("failed transaction")
        {
            StorageError::Conflict(message)
        } else {
            StorageError::Backend(message)
        }
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
