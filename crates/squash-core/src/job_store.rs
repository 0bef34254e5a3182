//! Job store.
//!
//! Accepts a [`JobReport`], validates it completely, resolves every
//! measurement's metric and records the package snapshots before handing a
//! single staged [`NewJob`] to the repository. Nothing reaches the repository
//! unless the whole report is valid, and the repository commits the job with
//! all of its children as one transaction.

use std::sync::Arc;

use squash_state::{JobId, JobRecord, JobRepository, MeasurementRecord, NewJob, PackageRecord};
use tracing::{debug, instrument};

use crate::domain::job::{MAX_BUILD_LEN, MAX_JOB_NAME_LEN};
use crate::domain::metric::check_len;
use crate::domain::{JobReport, ResolvedMeasurement, Result, ValidationError};
use crate::packages::{validate_url, PackageSnapshotRecorder};
use crate::registry::MetricRegistry;

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub job_id: JobId,
    /// Measurements in report order, with the metric snapshot each was
    /// resolved against
    pub measurements: Vec<ResolvedMeasurement>,
}

pub struct JobStore {
    registry: Arc<MetricRegistry>,
    repo: Arc<dyn JobRepository>,
    recorder: PackageSnapshotRecorder,
}

impl JobStore {
    pub fn new(registry: Arc<MetricRegistry>, repo: Arc<dyn JobRepository>) -> Self {
        Self {
            registry,
            repo,
            recorder: PackageSnapshotRecorder::new(),
        }
    }

    /// Validate and atomically persist a job report.
    ///
    /// Identical `(name, build)` pairs are never deduplicated; every call
    /// that succeeds creates a new job.
    #[instrument(skip(self, report), fields(name = %report.name, build = %report.build))]
    pub async fn submit(&self, report: JobReport) -> Result<CommitReceipt> {
        let name = required("job name", &report.name, MAX_JOB_NAME_LEN)?;
        let build = required("build", &report.build, MAX_BUILD_LEN)?;
        let url = report.url.trim().to_string();
        validate_url("job url", &url)?;
        let status = report.status.resolve()?;

        for (index, m) in report.measurements.iter().enumerate() {
            if !m.value.is_finite() {
                return Err(ValidationError::NonFiniteValue {
                    index,
                    metric: m.metric.clone(),
                    value: m.value,
                }
                .into());
            }
        }

        let mut measurements = Vec::with_capacity(report.measurements.len());
        for m in &report.measurements {
            let metric = self.registry.resolve(m.metric.trim()).await?;
            measurements.push(ResolvedMeasurement {
                metric,
                value: m.value,
            });
        }

        let job_id = JobId::new();
        let packages = self.recorder.record(&job_id, &report.packages)?;

        let staged = NewJob {
            job_id: job_id.clone(),
            name,
            build,
            url,
            status,
            packages: packages.into_iter().map(PackageRecord::from).collect(),
            measurements: measurements.iter().map(MeasurementRecord::from).collect(),
        };
        let committed = self.repo.commit_job(staged).await?;
        debug!(
            job_id = %committed.job_id,
            packages = committed.packages.len(),
            measurements = committed.measurements.len(),
            "job committed"
        );

        Ok(CommitReceipt {
            job_id,
            measurements,
        })
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<JobRecord> {
        Ok(self.repo.get_job(job_id).await?)
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.repo.list_jobs().await?)
    }
}

fn required(field: &str, value: &str, max: usize) -> std::result::Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    check_len(field, value, max)?;
    Ok(value.to_string())
}
