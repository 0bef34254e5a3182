//! Squash-State: SurrealDB Backend for Squash
//!
//! This crate provides the persistence layer for CI job ingestion. It handles
//! all I/O with SurrealDB behind two repository traits so the domain layer
//! never sees a query.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: per-job atomicity and metric definition storage.
//!
//! ## Key Components
//!
//! - `SurrealHandle`: Manages the connection and schema
//! - `JobRepository`: Commits a job with its packages and measurements as one transaction
//! - `MetricRepository`: Stores metric definitions keyed by code
//! - `fakes`: In-memory implementations with fault injection for tests

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{Credentials, StoreConfig, SurrealHandle};
pub use storage_traits::{
    JobId, JobRecord, JobRepository, JobStatus, MeasurementRecord, MetricRecord,
    MetricRepository, NewJob, PackageRecord, StorageResult,
};
pub use surreal_store::{SurrealJobRepository, SurrealMetricRepository};

/// Result type for squash-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
