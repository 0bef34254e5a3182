//! Squash domain model.
//!
//! - [`Metric`] / [`MetricDefinition`]: threshold policy for a measured quantity
//! - [`JobReport`]: what a CI pipeline submits
//! - [`PackageSnapshot`] / [`ResolvedMeasurement`]: validated children of a job
//! - [`Verdict`] / [`JobCommitted`]: evaluation results and change events

pub mod error;
pub mod job;
pub mod metric;
pub mod verdict;

pub use error::{Result, SquashError, ValidationError};
pub use job::{
    JobReport, MeasurementSpec, PackageSnapshot, PackageSpec, ReportedStatus, ResolvedMeasurement,
};
pub use metric::{Condition, Metric, MetricDefinition};
pub use verdict::{JobCommitted, ThresholdTier, Verdict, VerdictLevel};
