//! Job reports as submitted by CI pipelines, and the validated pieces the
//! store builds from them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use squash_state::{JobId, JobStatus, MeasurementRecord, PackageRecord};

use super::error::ValidationError;
use super::metric::Metric;

pub const MAX_JOB_NAME_LEN: usize = 32;
pub const MAX_BUILD_LEN: usize = 16;
pub const MAX_PACKAGE_NAME_LEN: usize = 64;
pub const MAX_GIT_URL_LEN: usize = 128;

/// Job status as it appears on the wire: a label (`"OK"`, `"FAILED"`) or
/// the legacy numeric code (`0`, `1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedStatus {
    Code(i64),
    Label(String),
}

impl ReportedStatus {
    pub fn resolve(&self) -> Result<JobStatus, ValidationError> {
        match self {
            ReportedStatus::Code(0) => Ok(JobStatus::Ok),
            ReportedStatus::Code(1) => Ok(JobStatus::Failed),
            ReportedStatus::Label(label) if label.eq_ignore_ascii_case("ok") => Ok(JobStatus::Ok),
            ReportedStatus::Label(label) if label.eq_ignore_ascii_case("failed") => {
                Ok(JobStatus::Failed)
            }
            ReportedStatus::Code(code) => Err(ValidationError::InvalidStatus {
                status: code.to_string(),
            }),
            ReportedStatus::Label(label) => Err(ValidationError::InvalidStatus {
                status: label.clone(),
            }),
        }
    }
}

impl From<JobStatus> for ReportedStatus {
    fn from(status: JobStatus) -> Self {
        ReportedStatus::Label(status.as_str().to_string())
    }
}

/// Raw dependency version entry of a job report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub git_url: String,
    pub git_commit: String,
    #[serde(default)]
    pub git_branch: String,
    #[serde(default)]
    pub build_version: String,
}

/// Raw measurement entry of a job report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSpec {
    #[serde(alias = "metricCode")]
    pub metric: String,
    pub value: f64,
}

/// A CI job report.
///
/// Accepts the legacy `ci_name`/`ci_id`/`ci_url` field names as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    #[serde(alias = "ci_name")]
    pub name: String,
    #[serde(alias = "ci_id")]
    pub build: String,
    #[serde(alias = "ci_url")]
    pub url: String,
    pub status: ReportedStatus,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    #[serde(default)]
    pub measurements: Vec<MeasurementSpec>,
}

/// One dependency's exact state at job time, bound to its owning job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    pub job_id: JobId,
    pub name: String,
    pub git_url: String,
    /// 40 lowercase hex characters
    pub git_commit: String,
    pub git_branch: String,
    pub build_version: String,
}

impl From<PackageSnapshot> for PackageRecord {
    fn from(s: PackageSnapshot) -> Self {
        PackageRecord {
            name: s.name,
            git_url: s.git_url,
            git_commit: s.git_commit,
            git_branch: s.git_branch,
            build_version: s.build_version,
        }
    }
}

/// A measurement whose metric has been resolved against the registry.
///
/// Holds the metric snapshot that was current when the job was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMeasurement {
    pub metric: Arc<Metric>,
    pub value: f64,
}

impl From<&ResolvedMeasurement> for MeasurementRecord {
    fn from(m: &ResolvedMeasurement) -> Self {
        MeasurementRecord {
            metric: m.metric.code.clone(),
            value: m.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_labels_and_codes() {
        assert_eq!(
            ReportedStatus::Label("OK".to_string()).resolve().unwrap(),
            JobStatus::Ok
        );
        assert_eq!(
            ReportedStatus::Label("failed".to_string()).resolve().unwrap(),
            JobStatus::Failed
        );
        assert_eq!(ReportedStatus::Code(0).resolve().unwrap(), JobStatus::Ok);
        assert_eq!(ReportedStatus::Code(1).resolve().unwrap(), JobStatus::Failed);
    }

    #[test]
    fn status_rejects_anything_else() {
        for status in [
            ReportedStatus::Code(2),
            ReportedStatus::Code(-1),
            ReportedStatus::Label("PASSED".to_string()),
            ReportedStatus::Label(String::new()),
        ] {
            assert!(matches!(
                status.resolve(),
                Err(ValidationError::InvalidStatus { .. })
            ));
        }
    }

    #[test]
    fn report_parses_legacy_field_names() {
        let report: JobReport = serde_json::from_value(serde_json::json!({
            "ci_name": "ci_cfht",
            "ci_id": "1",
            "ci_url": "https://ci.lsst.codes/job/ci_cfht/1/",
            "status": 0,
            "packages": [{
                "name": "afw",
                "git_url": "https://github.com/lsst/afw.git",
                "git_commit": "fc355a99abe3425003b0e5fbe1e13a39644b1e95",
                "git_branch": "master",
                "build_version": "b2000"
            }],
            "measurements": [{"metric": "test1", "value": 3.0}]
        }))
        .unwrap();

        assert_eq!(report.name, "ci_cfht");
        assert_eq!(report.build, "1");
        assert_eq!(report.status, ReportedStatus::Code(0));
        assert_eq!(report.packages[0].build_version, "b2000");
        assert_eq!(report.measurements[0].metric, "test1");
    }

    #[test]
    fn report_parses_metric_code_alias() {
        let report: JobReport = serde_json::from_value(serde_json::json!({
            "name": "validate_drp",
            "build": "88",
            "url": "https://ci.lsst.codes/job/validate_drp/88/",
            "status": "FAILED",
            "measurements": [{"metricCode": "AM1", "value": 4}]
        }))
        .unwrap();

        assert!(report.packages.is_empty());
        assert_eq!(report.measurements[0].metric, "AM1");
        assert_eq!(report.measurements[0].value, 4.0);
        assert_eq!(report.status.resolve().unwrap(), JobStatus::Failed);
    }
}
