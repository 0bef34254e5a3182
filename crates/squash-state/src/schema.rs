//! Row definitions for the Squash SurrealDB tables
//!
//! Tables:
//! - metrics: metric definitions keyed by code
//! - jobs: one row per committed CI job
//! - packages: package snapshots owned by a job (`job_id` + `position`)
//! - measurements: measured values owned by a job (`job_id` + `position`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage_traits::{
    JobId, JobRecord, JobStatus, MeasurementRecord, MetricRecord, NewJob, PackageRecord,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Job row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRow {
    pub job_id: String,
    pub name: String,
    pub build: String,
    pub url: String,
    /// "OK" | "FAILED"
    pub status: String,
    #[serde(with = "surreal_datetime")]
    pub runtime: DateTime<Utc>,
}

/// Package snapshot row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRow {
    pub job_id: String,
    /// Index within the job's package list
    pub position: u32,
    pub name: String,
    pub git_url: String,
    pub git_commit: String,
    pub git_branch: String,
    pub build_version: String,
}

/// Measurement row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub job_id: String,
    /// Index within the job's measurement list
    pub position: u32,
    pub metric: String,
    pub value: f64,
}

/// Metric row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub code: String,
    pub description: String,
    pub units: String,
    pub condition: String,
    pub minimum: f64,
    pub design: f64,
    pub stretch: f64,
    pub user: f64,
}

/// All rows produced by one job commit.
#[derive(Debug, Clone)]
pub struct StagedJobRows {
    pub job: JobRow,
    pub packages: Vec<PackageRow>,
    pub measurements: Vec<MeasurementRow>,
}

impl StagedJobRows {
    /// Split a staged job into its table rows, stamping the commit time.
    pub fn from_new(job: &NewJob, runtime: DateTime<Utc>) -> Self {
        let job_id = job.job_id.0.clone();
        let packages = job
            .packages
            .iter()
            .enumerate()
            .map(|(position, p)| PackageRow {
                job_id: job_id.clone(),
                position: position as u32,
                name: p.name.clone(),
                git_url: p.git_url.clone(),
                git_commit: p.git_commit.clone(),
                git_branch: p.git_branch.clone(),
                build_version: p.build_version.clone(),
            })
            .collect();
        let measurements = job
            .measurements
            .iter()
            .enumerate()
            .map(|(position, m)| MeasurementRow {
                job_id: job_id.clone(),
                position: position as u32,
                metric: m.metric.clone(),
                value: m.value,
            })
            .collect();

        StagedJobRows {
            job: JobRow {
                job_id,
                name: job.name.clone(),
                build: job.build.clone(),
                url: job.url.clone(),
                status: job.status.as_str().to_string(),
                runtime,
            },
            packages,
            measurements,
        }
    }
}

/// Reassemble a job record from its rows. Children must already be sorted
/// by `position`.
pub fn assemble_job(
    row: JobRow,
    packages: Vec<PackageRow>,
    measurements: Vec<MeasurementRow>,
) -> Result<JobRecord, StorageError> {
    let status = match row.status.as_str() {
        "OK" => JobStatus::Ok,
        "FAILED" => JobStatus::Failed,
        other => {
            return Err(StorageError::Backend(format!(
                "unknown job status: {other}"
            )))
        }
    };

    Ok(JobRecord {
        job_id: JobId(row.job_id),
        name: row.name,
        build: row.build,
        url: row.url,
        status,
        runtime: row.runtime,
        packages: packages
            .into_iter()
            .map(|p| PackageRecord {
                name: p.name,
                git_url: p.git_url,
                git_commit: p.git_commit,
                git_branch: p.git_branch,
                build_version: p.build_version,
            })
            .collect(),
        measurements: measurements
            .into_iter()
            .map(|m| MeasurementRecord {
                metric: m.metric,
                value: m.value,
            })
            .collect(),
    })
}

impl From<MetricRecord> for MetricRow {
    fn from(m: MetricRecord) -> Self {
        MetricRow {
            code: m.code,
            description: m.description,
            units: m.units,
            condition: m.condition,
            minimum: m.minimum,
            design: m.design,
            stretch: m.stretch,
            user: m.user,
        }
    }
}

impl From<MetricRow> for MetricRecord {
    fn from(m: MetricRow) -> Self {
        MetricRecord {
            code: m.code,
            description: m.description,
            units: m.units,
            condition: m.condition,
            minimum: m.minimum,
            design: m.design,
            stretch: m.stretch,
            user: m.user,
        }
    }
}
