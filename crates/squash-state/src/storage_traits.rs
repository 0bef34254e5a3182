//! Storage trait definitions for Squash
//!
//! These traits define the persistence boundary of the ingestion core:
//! - `JobRepository`: transactional persistence of a job with its owned
//!   package snapshots and measurements
//! - `MetricRepository`: metric definitions keyed by code
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Unique identifier for a recorded CI job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random JobId
    pub fn new() -> Self {
        JobId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a CI job as reported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Ok,
    Failed,
}

impl JobStatus {
    /// Legacy numeric code (0 = OK, 1 = FAILED)
    pub fn code(self) -> u8 {
        match self {
            JobStatus::Ok => 0,
            JobStatus::Failed => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Ok => "OK",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dependency's exact state, as persisted under its owning job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub git_url: String,
    /// 40 lowercase hex characters
    pub git_commit: String,
    pub git_branch: String,
    pub build_version: String,
}

/// One measured value, as persisted under its owning job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Code of the measured metric
    pub metric: String,
    pub value: f64,
}

/// A fully validated job, staged for a single transactional commit.
///
/// The job ID is assigned by the caller before commit so the children can be
/// built against it; the repository rejects an ID it already holds.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub job_id: JobId,
    pub name: String,
    pub build: String,
    pub url: String,
    pub status: JobStatus,
    pub packages: Vec<PackageRecord>,
    pub measurements: Vec<MeasurementRecord>,
}

/// A committed job together with the children it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub name: String,
    pub build: String,
    pub url: String,
    pub status: JobStatus,
    pub runtime: DateTime<Utc>,
    pub packages: Vec<PackageRecord>,
    pub measurements: Vec<MeasurementRecord>,
}

impl JobRecord {
    /// Materialize a staged job with the commit timestamp.
    pub fn from_new(job: NewJob, runtime: DateTime<Utc>) -> Self {
        JobRecord {
            job_id: job.job_id,
            name: job.name,
            build: job.build,
            url: job.url,
            status: job.status,
            runtime,
            packages: job.packages,
            measurements: job.measurements,
        }
    }
}

/// Job persistence.
///
/// Guarantees:
/// - `commit_job` writes the job row, then its packages, then its
///   measurements as one transaction. On any error nothing is visible.
/// - Children are only reachable through their job; there is no API to
///   read, add or detach them individually.
/// - Jobs are never deduplicated: two commits with equal `(name, build)`
///   produce two records.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Atomically persist a job and all of its children.
    async fn commit_job(&self, job: NewJob) -> StorageResult<JobRecord>;

    /// Retrieve a job by ID. Returns `StorageError::JobNotFound` if absent.
    async fn get_job(&self, job_id: &JobId) -> StorageResult<JobRecord>;

    /// List all jobs, newest first.
    async fn list_jobs(&self) -> StorageResult<Vec<JobRecord>>;
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Persisted metric definition.
///
/// `condition` is stored as the raw comparison symbol; interpretation and
/// validation belong to the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub code: String,
    pub description: String,
    pub units: String,
    pub condition: String,
    pub minimum: f64,
    pub design: f64,
    pub stretch: f64,
    pub user: f64,
}

/// Metric definition store.
///
/// `put_metric` inserts or replaces the definition with the same code.
#[async_trait]
pub trait MetricRepository: Send + Sync {
    /// Insert or replace a metric definition.
    async fn put_metric(&self, metric: MetricRecord) -> StorageResult<()>;

    /// Retrieve a metric by code. Returns `StorageError::MetricNotFound` if absent.
    async fn get_metric(&self, code: &str) -> StorageResult<MetricRecord>;

    /// List all metric definitions, ordered by code.
    async fn list_metrics(&self) -> StorageResult<Vec<MetricRecord>>;
}
