//! Squash Core Library
//!
//! CI job ingestion and evaluation: jobs are validated and committed
//! atomically with their package snapshots and measurements, each measurement
//! is scored against its metric's thresholds, and live dashboard viewers are
//! refreshed through a debounced, coalescing notifier.
//!
//! ## Layer 1 - Domain
//!
//! Persistence lives in `squash-state`; this crate only talks to it through
//! the `JobRepository` and `MetricRepository` traits.

pub mod config;
pub mod domain;
pub mod evaluator;
pub mod job_store;
pub mod notifier;
pub mod obs;
pub mod packages;
pub mod registry;
pub mod service;
pub mod telemetry;

pub use config::{ConfigError, NotifierConfig};
pub use domain::{
    Condition, JobCommitted, JobReport, MeasurementSpec, Metric, MetricDefinition,
    PackageSnapshot, PackageSpec, ReportedStatus, ResolvedMeasurement, Result, SquashError,
    ThresholdTier, ValidationError, Verdict, VerdictLevel,
};
pub use evaluator::{evaluate, evaluate_job};
pub use job_store::{CommitReceipt, JobStore};
pub use notifier::{
    ChangeNotifier, HttpPushTransport, MetricFilter, PushError, PushTransport, RefreshPayload,
    ViewerSession, ViewerSessionRegistry,
};
pub use packages::PackageSnapshotRecorder;
pub use registry::MetricRegistry;
pub use service::SquashCore;

pub use squash_state::{JobId, JobRecord, JobStatus, StorageError};
