//! SurrealDB-backed repositories
//!
//! Uses the row types in `schema` for persistence, converting to/from
//! `storage_traits` types at the boundary. A job commit is a single
//! `BEGIN TRANSACTION ... COMMIT TRANSACTION` query so the job row and all
//! of its children land together or not at all.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::schema::{assemble_job, JobRow, MeasurementRow, MetricRow, PackageRow, StagedJobRows};
use crate::storage_traits::{
    JobId, JobRecord, JobRepository, MetricRecord, MetricRepository, NewJob, StorageResult,
};

const JOB_FIELDS: &str = "job_id, name, build, url, status, runtime";
const PACKAGE_FIELDS: &str =
    "job_id, position, name, git_url, git_commit, git_branch, build_version";
const MEASUREMENT_FIELDS: &str = "job_id, position, metric, value";
const METRIC_FIELDS: &str = "code, description, units, condition, minimum, design, stretch, user";

fn backend(e: surrealdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// Build the commit transaction for a staged job.
///
/// Empty child collections are skipped rather than inserted as empty arrays.
fn commit_query(rows: &StagedJobRows) -> String {
    let mut sql = String::from("BEGIN TRANSACTION;\nCREATE jobs CONTENT $job;\n");
    if !rows.packages.is_empty() {
        sql.push_str("INSERT INTO packages $packages;\n");
    }
    if !rows.measurements.is_empty() {
        sql.push_str("INSERT INTO measurements $measurements;\n");
    }
    sql.push_str("COMMIT TRANSACTION;");
    sql
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`JobRepository`].
#[derive(Clone)]
pub struct SurrealJobRepository {
    handle: Arc<SurrealHandle>,
}

impl SurrealJobRepository {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl JobRepository for SurrealJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.job_id, name = %job.name, build = %job.build))]
    async fn commit_job(&self, job: NewJob) -> StorageResult<JobRecord> {
        let runtime = Utc::now();
        let rows = StagedJobRows::from_new(&job, runtime);
        let sql = commit_query(&rows);

        debug!(
            packages = rows.packages.len(),
            measurements = rows.measurements.len(),
            "committing job"
        );

        let response = self
            .handle
            .db()
            .query(sql)
            .bind(("job", rows.job))
            .bind(("packages", rows.packages))
            .bind(("measurements", rows.measurements))
            .await
            .map_err(StorageError::from_surreal)?;

        response.check().map_err(|e| {
            warn!(error = %e, "job commit rolled back");
            StorageError::from_surreal(e)
        })?;

        Ok(JobRecord::from_new(job, runtime))
    }

    #[instrument(skip(self))]
    async fn get_job(&self, job_id: &JobId) -> StorageResult<JobRecord> {
        let sql = format!(
            "SELECT {JOB_FIELDS} FROM jobs WHERE job_id = $jid;\n\
             SELECT {PACKAGE_FIELDS} FROM packages WHERE job_id = $jid ORDER BY position ASC;\n\
             SELECT {MEASUREMENT_FIELDS} FROM measurements WHERE job_id = $jid ORDER BY position ASC;"
        );

        let mut res = self
            .handle
            .db()
            .query(sql)
            .bind(("jid", job_id.0.clone()))
            .await
            .map_err(backend)?;

        let jobs: Vec<JobRow> = res.take(0).map_err(backend)?;
        let packages: Vec<PackageRow> = res.take(1).map_err(backend)?;
        let measurements: Vec<MeasurementRow> = res.take(2).map_err(backend)?;

        let row = jobs
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::JobNotFound {
                job_id: job_id.0.clone(),
            })?;
        assemble_job(row, packages, measurements)
    }

    #[instrument(skip(self))]
    async fn list_jobs(&self) -> StorageResult<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {JOB_FIELDS} FROM jobs ORDER BY runtime DESC;\n\
             SELECT {PACKAGE_FIELDS} FROM packages ORDER BY job_id, position ASC;\n\
             SELECT {MEASUREMENT_FIELDS} FROM measurements ORDER BY job_id, position ASC;"
        );

        let mut res = self.handle.db().query(sql).await.map_err(backend)?;

        let jobs: Vec<JobRow> = res.take(0).map_err(backend)?;
        let packages: Vec<PackageRow> = res.take(1).map_err(backend)?;
        let measurements: Vec<MeasurementRow> = res.take(2).map_err(backend)?;

        let mut packages_by_job: HashMap<String, Vec<PackageRow>> = HashMap::new();
        for p in packages {
            packages_by_job.entry(p.job_id.clone()).or_default().push(p);
        }
        let mut measurements_by_job: HashMap<String, Vec<MeasurementRow>> = HashMap::new();
        for m in measurements {
            measurements_by_job
                .entry(m.job_id.clone())
                .or_default()
                .push(m);
        }

        jobs.into_iter()
            .map(|row| {
                let packages = packages_by_job.remove(&row.job_id).unwrap_or_default();
                let measurements = measurements_by_job.remove(&row.job_id).unwrap_or_default();
                assemble_job(row, packages, measurements)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`MetricRepository`].
#[derive(Clone)]
pub struct SurrealMetricRepository {
    handle: Arc<SurrealHandle>,
}

impl SurrealMetricRepository {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl MetricRepository for SurrealMetricRepository {
    #[instrument(skip(self, metric), fields(code = %metric.code))]
    async fn put_metric(&self, metric: MetricRecord) -> StorageResult<()> {
        let code = metric.code.clone();
        let row = MetricRow::from(metric);

        let response = self
            .handle
            .db()
            .query(
                "BEGIN TRANSACTION;\n\
                 DELETE metrics WHERE code = $code;\n\
                 CREATE metrics CONTENT $row;\n\
                 COMMIT TRANSACTION;",
            )
            .bind(("code", code))
            .bind(("row", row))
            .await
            .map_err(StorageError::from_surreal)?;
        response.check().map_err(StorageError::from_surreal)?;

        debug!("metric stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_metric(&self, code: &str) -> StorageResult<MetricRecord> {
        let mut res = self
            .handle
            .db()
            .query(format!(
                "SELECT {METRIC_FIELDS} FROM metrics WHERE code = $code"
            ))
            .bind(("code", code.to_string()))
            .await
            .map_err(backend)?;

        let rows: Vec<MetricRow> = res.take(0).map_err(backend)?;
        rows.into_iter()
            .next()
            .map(MetricRecord::from)
            .ok_or_else(|| StorageError::MetricNotFound {
                code: code.to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn list_metrics(&self) -> StorageResult<Vec<MetricRecord>> {
        let mut res = self
            .handle
            .db()
            .query(format!(
                "SELECT {METRIC_FIELDS} FROM metrics ORDER BY code ASC"
            ))
            .await
            .map_err(backend)?;

        let rows: Vec<MetricRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(MetricRecord::from).collect())
    }
}
