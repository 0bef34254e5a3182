//! Package snapshot recorder.
//!
//! Turns the raw dependency list of a job report into validated
//! [`PackageSnapshot`]s bound to the owning job. Input order is preserved and
//! nothing is persisted here.

use squash_state::JobId;

use crate::domain::job::{MAX_GIT_URL_LEN, MAX_PACKAGE_NAME_LEN};
use crate::domain::metric::check_len;
use crate::domain::{PackageSnapshot, PackageSpec, ValidationError};

const COMMIT_HASH_LEN: usize = 40;

#[derive(Debug, Clone, Copy, Default)]
pub struct PackageSnapshotRecorder;

impl PackageSnapshotRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Validate `specs` and bind each one to `job_id`.
    ///
    /// Fails on the first invalid entry; errors carry its index.
    pub fn record(
        &self,
        job_id: &JobId,
        specs: &[PackageSpec],
    ) -> Result<Vec<PackageSnapshot>, ValidationError> {
        specs
            .iter()
            .enumerate()
            .map(|(index, spec)| snapshot(job_id, index, spec))
            .collect()
    }
}

fn snapshot(
    job_id: &JobId,
    index: usize,
    spec: &PackageSpec,
) -> Result<PackageSnapshot, ValidationError> {
    let name = spec.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyField {
            field: format!("package {index} name"),
        });
    }
    if !is_slug(name) {
        return Err(ValidationError::InvalidPackageName {
            index,
            name: name.to_string(),
        });
    }
    check_len(&format!("package {index} name"), name, MAX_PACKAGE_NAME_LEN)?;

    let git_url = spec.git_url.trim();
    check_len(&format!("package {index} git_url"), git_url, MAX_GIT_URL_LEN)?;
    validate_url(&format!("package {index} git_url"), git_url)?;

    let git_commit = normalize_commit(index, &spec.git_commit)?;

    Ok(PackageSnapshot {
        job_id: job_id.clone(),
        name: name.to_string(),
        git_url: git_url.to_string(),
        git_commit,
        git_branch: spec.git_branch.clone(),
        build_version: spec.build_version.clone(),
    })
}

fn is_slug(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Accept exactly 40 hex digits in either case, returned lowercase.
fn normalize_commit(index: usize, commit: &str) -> Result<String, ValidationError> {
    let commit = commit.trim();
    if commit.len() != COMMIT_HASH_LEN || hex::decode(commit).is_err() {
        return Err(ValidationError::InvalidCommitHash {
            index,
            commit: commit.to_string(),
        });
    }
    Ok(commit.to_ascii_lowercase())
}

/// Check that `value` parses as an absolute URL.
pub(crate) fn validate_url(field: &str, value: &str) -> Result<(), ValidationError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidUrl {
            field: field.to_string(),
            reason: e.to_string(),
        })
}
