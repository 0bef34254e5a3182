//! Domain-level error taxonomy for Squash.

use squash_state::StorageError;

/// Malformed input. Never retried; no state is left behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyField { field: String },

    #[error("{field} exceeds {max} characters (got {len})")]
    FieldTooLong {
        field: String,
        max: usize,
        len: usize,
    },

    #[error("unknown job status: {status}")]
    InvalidStatus { status: String },

    #[error("unrecognized comparison operator: {condition:?} (expected one of <, <=, >, >=)")]
    InvalidCondition { condition: String },

    #[error("threshold {tier} must be a finite number (got {value})")]
    NonFiniteThreshold { tier: String, value: f64 },

    #[error("measurement {index} for metric {metric} is not a finite number (got {value})")]
    NonFiniteValue {
        index: usize,
        metric: String,
        value: f64,
    },

    #[error("package {index}: git_commit must be exactly 40 hex characters (got {commit:?})")]
    InvalidCommitHash { index: usize, commit: String },

    #[error("{field} is not a valid URL: {reason}")]
    InvalidUrl { field: String, reason: String },

    #[error("package {index}: name {name:?} must contain only letters, digits, '-' or '_'")]
    InvalidPackageName { index: usize, name: String },
}

/// Squash domain errors.
#[derive(Debug, thiserror::Error)]
pub enum SquashError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("persistence error: {source}")]
    Persistence {
        #[source]
        source: StorageError,
    },
}

impl SquashError {
    pub fn metric_not_found(code: impl Into<String>) -> Self {
        SquashError::NotFound {
            kind: "metric",
            key: code.into(),
        }
    }

    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        SquashError::NotFound {
            kind: "job",
            key: job_id.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Only store failures qualify; the core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SquashError::Persistence { .. })
    }
}

impl From<StorageError> for SquashError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::JobNotFound { job_id } => SquashError::job_not_found(job_id),
            StorageError::MetricNotFound { code } => SquashError::metric_not_found(code),
            other => SquashError::Persistence { source: other },
        }
    }
}

/// Result type for Squash domain operations.
pub type Result<T> = std::result::Result<T, SquashError>;
