//! SurrealDB schema migrations and initialization
//!
//! Sets up the metric and job tables with the constraints and indexes the
//! repositories rely on.

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Squash tables in SurrealDB
///
/// Called once per connection. Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Squash SurrealDB schema");

    init_metrics_table(db).await?;
    init_jobs_table(db).await?;
    init_packages_table(db).await?;
    init_measurements_table(db).await?;

    info!("Squash schema initialization complete");
    Ok(())
}

async fn run(db: &Surreal<Any>, sql: &str) -> Result<()> {
    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

/// Initialize `metrics` table
///
/// Schema:
/// ```text
/// TABLE metrics {
///   code:         STRING (unique)
///   description:  STRING
///   units:        STRING
///   condition:    STRING ("<" | "<=" | ">" | ">=")
///   minimum:      FLOAT
///   design:       FLOAT
///   stretch:      FLOAT
///   user:         FLOAT
/// }
/// ```
async fn init_metrics_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing metrics table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS metrics SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_metric_code ON TABLE metrics COLUMNS code UNIQUE;
    "#;

    run(db, sql).await?;
    info!("metrics table initialized");
    Ok(())
}

/// Initialize `jobs` table
///
/// Schema:
/// ```text
/// TABLE jobs {
///   job_id:   STRING (unique)
///   name:     STRING (indexed)
///   build:    STRING
///   url:      STRING
///   status:   STRING ("OK" | "FAILED")
///   runtime:  DATETIME (indexed)
/// }
/// ```
///
/// `(name, build)` is deliberately not unique: resubmissions are recorded
/// as separate jobs.
async fn init_jobs_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing jobs table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS jobs AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_job_id ON TABLE jobs COLUMNS job_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_job_name ON TABLE jobs COLUMNS name;
        DEFINE INDEX IF NOT EXISTS idx_job_runtime ON TABLE jobs COLUMNS runtime;
    "#;

    run(db, sql).await?;
    info!("jobs table initialized");
    Ok(())
}

/// Initialize `packages` table
///
/// Rows are owned by a job: `(job_id, position)` is unique and rows are
/// only written inside the job's commit transaction.
async fn init_packages_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing packages table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS packages AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE FIELD IF NOT EXISTS git_commit ON TABLE packages TYPE string
            ASSERT string::len($value) = 40;

        DEFINE INDEX IF NOT EXISTS idx_package_job_position ON TABLE packages COLUMNS job_id, position UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_package_name ON TABLE packages COLUMNS name;
    "#;

    run(db, sql).await?;
    info!("packages table initialized");
    Ok(())
}

/// Initialize `measurements` table
///
/// Rows are owned by a job: `(job_id, position)` is unique. `metric` holds
/// the metric code; the domain layer resolves it before commit.
async fn init_measurements_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing measurements table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS measurements AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_measurement_job_position ON TABLE measurements COLUMNS job_id, position UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_measurement_metric ON TABLE measurements COLUMNS metric;
    "#;

    run(db, sql).await?;
    info!("measurements table initialized");
    Ok(())
}
