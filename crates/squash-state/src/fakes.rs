//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryJobRepository` and `MemoryMetricRepository` that satisfy
//! the trait contracts without any external dependencies.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryJobRepository
// ---------------------------------------------------------------------------

/// Transaction step at which an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Before the job row is staged
    Job,
    /// After the job row, before its packages
    Packages,
    /// After the packages, before the measurements
    Measurements,
    /// After everything is staged, at commit
    Commit,
}

#[derive(Debug, Default)]
struct Arena {
    jobs: HashMap<JobId, JobRecord>,
    /// Commit order, oldest first
    order: Vec<JobId>,
}

/// In-memory job repository: an arena of `JobRecord`s indexed by `JobId`.
///
/// A commit stages every row in a private buffer and publishes it with a
/// single insert under the arena lock, so readers see all of a job or none
/// of it. Faults can be injected at each step to exercise rollback.
#[derive(Debug, Default)]
pub struct MemoryJobRepository {
    arena: Mutex<Arena>,
    faults: Mutex<Vec<(FaultPoint, StorageError)>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next commit that reaches `point` with `error`.
    pub fn inject_fault(&self, point: FaultPoint, error: StorageError) {
        self.faults.lock().unwrap().push((point, error));
    }

    /// Row counts as `(jobs, packages, measurements)`.
    pub fn row_counts(&self) -> (usize, usize, usize) {
        let arena = self.arena.lock().unwrap();
        let packages = arena.jobs.values().map(|j| j.packages.len()).sum();
        let measurements = arena.jobs.values().map(|j| j.measurements.len()).sum();
        (arena.jobs.len(), packages, measurements)
    }

    fn check_fault(&self, point: FaultPoint) -> StorageResult<()> {
        let mut faults = self.faults.lock().unwrap();
        match faults.iter().position(|(p, _)| *p == point) {
            Some(idx) => Err(faults.remove(idx).1),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn commit_job(&self, job: NewJob) -> StorageResult<JobRecord> {
        let NewJob {
            job_id,
            name,
            build,
            url,
            status,
            packages,
            measurements,
        } = job;

        self.check_fault(FaultPoint::Job)?;
        let mut staged = JobRecord {
            job_id: job_id.clone(),
            name,
            build,
            url,
            status,
            runtime: Utc::now(),
            packages: Vec::with_capacity(packages.len()),
            measurements: Vec::with_capacity(measurements.len()),
        };

        self.check_fault(FaultPoint::Packages)?;
        staged.packages.extend(packages);

        self.check_fault(FaultPoint::Measurements)?;
        staged.measurements.extend(measurements);

        self.check_fault(FaultPoint::Commit)?;
        let mut arena = self.arena.lock().unwrap();
        if arena.jobs.contains_key(&job_id) {
            return Err(StorageError::Conflict(format!(
                "job {} already exists",
                job_id
            )));
        }
        arena.jobs.insert(job_id.clone(), staged.clone());
        arena.order.push(job_id);
        Ok(staged)
    }

    async fn get_job(&self, job_id: &JobId) -> StorageResult<JobRecord> {
        let arena = self.arena.lock().unwrap();
        arena
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| StorageError::JobNotFound {
                job_id: job_id.0.clone(),
            })
    }

    async fn list_jobs(&self) -> StorageResult<Vec<JobRecord>> {
        let arena = self.arena.lock().unwrap();
        Ok(arena
            .order
            .iter()
            .rev()
            .filter_map(|id| arena.jobs.get(id).cloned())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryMetricRepository
// ---------------------------------------------------------------------------

/// In-memory metric store backed by a `BTreeMap<code, MetricRecord>`.
#[derive(Debug, Default)]
pub struct MemoryMetricRepository {
    metrics: Mutex<BTreeMap<String, MetricRecord>>,
    unavailable: Mutex<bool>,
}

impl MemoryMetricRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

#[async_trait]
impl MetricRepository for MemoryMetricRepository {
    async fn put_metric(&self, metric: MetricRecord) -> StorageResult<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(StorageError::Backend("metric store unavailable".to_string()));
        }
        let mut metrics = self.metrics.lock().unwrap();
        metrics.insert(metric.code.clone(), metric);
        Ok(())
    }

    async fn get_metric(&self, code: &str) -> StorageResult<MetricRecord> {
        let metrics = self.metrics.lock().unwrap();
        metrics
            .get(code)
            .cloned()
            .ok_or_else(|| StorageError::MetricNotFound {
                code: code.to_string(),
            })
    }

    async fn list_metrics(&self) -> StorageResult<Vec<MetricRecord>> {
        let metrics = self.metrics.lock().unwrap();
        Ok(metrics.values().cloned().collect())
    }
}
