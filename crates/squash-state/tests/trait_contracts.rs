//! Trait contract tests for JobRepository and MetricRepository.
//!
//! Each contract runs against the in-memory fakes and the SurrealDB
//! (`mem://`) backend. Any conforming implementation must pass these.

use std::sync::Arc;

use squash_state::fakes::{FaultPoint, MemoryJobRepository, MemoryMetricRepository};
use squash_state::storage_traits::*;
use squash_state::{StorageError, SurrealHandle, SurrealJobRepository, SurrealMetricRepository};

fn sample_package(name: &str) -> PackageRecord {
    PackageRecord {
        name: name.to_string(),
        git_url: format!("https://github.com/lsst/{name}.git"),
        git_commit: "fc355a99abe3425003b0e5fbe1e13a39644b1e95".to_string(),
        git_branch: "master".to_string(),
        build_version: "b2000".to_string(),
    }
}

fn sample_job(build: &str) -> NewJob {
    NewJob {
        job_id: JobId::new(),
        name: "ci_cfht".to_string(),
        build: build.to_string(),
        url: format!("https://ci.lsst.codes/job/ci_cfht/{build}/"),
        status: JobStatus::Ok,
        packages: vec![sample_package("afw"), sample_package("meas_base")],
        measurements: vec![
            MeasurementRecord {
                metric: "AM1".to_string(),
                value: 4.0,
            },
            MeasurementRecord {
                metric: "PA1".to_string(),
                value: 17.25,
            },
        ],
    }
}

fn sample_metric(code: &str, design: f64) -> MetricRecord {
    MetricRecord {
        code: code.to_string(),
        description: "Astrometric repeatability".to_string(),
        units: "milliarcsec".to_string(),
        condition: "<".to_string(),
        minimum: 10.0,
        design,
        stretch: 2.0,
        user: 1.0,
    }
}

async fn surreal_repos() -> (Arc<SurrealHandle>, SurrealJobRepository, SurrealMetricRepository) {
    let handle = Arc::new(SurrealHandle::setup_db().await.unwrap());
    (
        handle.clone(),
        SurrealJobRepository::new(handle.clone()),
        SurrealMetricRepository::new(handle),
    )
}

// ===========================================================================
// JobRepository contracts
// ===========================================================================

async fn contract_commit_then_get<R: JobRepository>(repo: &R) {
    let job = sample_job("1");
    let job_id = job.job_id.clone();
    let committed = repo.commit_job(job.clone()).await.unwrap();

    let fetched = repo.get_job(&job_id).await.unwrap();
    assert_eq!(fetched.job_id, job_id);
    assert_eq!(fetched.status, JobStatus::Ok);
    assert_eq!(fetched.packages, job.packages);
    assert_eq!(fetched.measurements, job.measurements);
    assert_eq!(fetched.measurements[0].value, 4.0);
    assert_eq!(committed.packages, fetched.packages);
}

async fn contract_get_missing_job<R: JobRepository>(repo: &R) {
    let err = repo
        .get_job(&JobId("no-such-job".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::JobNotFound { .. }));
}

async fn contract_resubmission_is_not_deduplicated<R: JobRepository>(repo: &R) {
    let first = repo.commit_job(sample_job("42")).await.unwrap();
    let second = repo.commit_job(sample_job("42")).await.unwrap();
    assert_ne!(first.job_id, second.job_id);

    let jobs = repo.list_jobs().await.unwrap();
    assert_eq!(jobs.iter().filter(|j| j.build == "42").count(), 2);
}

async fn contract_duplicate_id_conflicts<R: JobRepository>(repo: &R) {
    let job = sample_job("3");
    repo.commit_job(job.clone()).await.unwrap();

    let mut clash = sample_job("4");
    clash.job_id = job.job_id.clone();
    let err = repo.commit_job(clash).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)), "got {err:?}");

    let kept = repo.get_job(&job.job_id).await.unwrap();
    assert_eq!(kept.build, "3");
}

async fn contract_job_without_children<R: JobRepository>(repo: &R) {
    let mut job = sample_job("5");
    job.packages.clear();
    job.measurements.clear();
    job.status = JobStatus::Failed;
    let job_id = job.job_id.clone();

    repo.commit_job(job).await.unwrap();
    let fetched = repo.get_job(&job_id).await.unwrap();
    assert!(fetched.packages.is_empty());
    assert!(fetched.measurements.is_empty());
    assert_eq!(fetched.status, JobStatus::Failed);
}

#[tokio::test]
async fn memory_job_repository_contracts() {
    contract_commit_then_get(&MemoryJobRepository::new()).await;
    contract_get_missing_job(&MemoryJobRepository::new()).await;
    contract_resubmission_is_not_deduplicated(&MemoryJobRepository::new()).await;
    contract_duplicate_id_conflicts(&MemoryJobRepository::new()).await;
    contract_job_without_children(&MemoryJobRepository::new()).await;
}

#[tokio::test]
async fn surreal_job_repository_contracts() {
    let (_, repo, _) = surreal_repos().await;
    contract_commit_then_get(&repo).await;
    contract_get_missing_job(&repo).await;
    contract_resubmission_is_not_deduplicated(&repo).await;
    contract_duplicate_id_conflicts(&repo).await;
    contract_job_without_children(&repo).await;
}

#[tokio::test]
async fn memory_list_jobs_is_newest_first() {
    let repo = MemoryJobRepository::new();
    for build in ["1", "2", "3"] {
        repo.commit_job(sample_job(build)).await.unwrap();
    }
    let builds: Vec<String> = repo
        .list_jobs()
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.build)
        .collect();
    assert_eq!(builds, vec!["3", "2", "1"]);
}

#[tokio::test]
async fn memory_fault_at_any_step_leaves_no_rows() {
    for point in [
        FaultPoint::Job,
        FaultPoint::Packages,
        FaultPoint::Measurements,
        FaultPoint::Commit,
    ] {
        let repo = MemoryJobRepository::new();
        repo.inject_fault(point, StorageError::Backend("disk full".to_string()));

        let job = sample_job("9");
        let job_id = job.job_id.clone();
        let err = repo.commit_job(job).await.unwrap_err();
        assert_eq!(err, StorageError::Backend("disk full".to_string()));
        assert_eq!(repo.row_counts(), (0, 0, 0), "fault at {point:?}");
        assert!(repo.get_job(&job_id).await.is_err());

        // The fault is one-shot.
        repo.commit_job(sample_job("10")).await.unwrap();
        assert_eq!(repo.row_counts(), (1, 2, 2));
    }
}

#[tokio::test]
async fn surreal_failed_child_insert_rolls_back_job_row() {
    let (handle, repo, _) = surreal_repos().await;

    let mut job = sample_job("11");
    job.packages[1].git_commit = "deadbeef".to_string();
    let job_id = job.job_id.clone();

    let err = repo.commit_job(job).await.unwrap_err();
    assert!(!matches!(err, StorageError::JobNotFound { .. }));

    assert_eq!(handle.count_rows("jobs").await.unwrap(), 0);
    assert_eq!(handle.count_rows("packages").await.unwrap(), 0);
    assert_eq!(handle.count_rows("measurements").await.unwrap(), 0);
    assert!(matches!(
        repo.get_job(&job_id).await.unwrap_err(),
        StorageError::JobNotFound { .. }
    ));
}

#[tokio::test]
async fn surreal_concurrent_commits_keep_children_with_their_job() {
    let (_, repo, _) = surreal_repos().await;
    let repo = Arc::new(repo);

    let commits = (0..8).map(|i| {
        let repo = repo.clone();
        async move {
            let mut job = sample_job(&i.to_string());
            job.measurements[0].value = i as f64;
            repo.commit_job(job).await
        }
    });
    let results = futures::future::join_all(commits).await;
    // Optimistic engines may reject a racing transaction; that must be a
    // clean conflict, never a partial job.
    assert!(results
        .iter()
        .all(|r| matches!(r, Ok(_) | Err(StorageError::Conflict(_)))));
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert!(committed > 0);

    let jobs = repo.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), committed);
    for job in jobs {
        let build: f64 = job.build.parse().unwrap();
        assert_eq!(job.packages.len(), 2);
        assert_eq!(job.measurements.len(), 2);
        assert_eq!(job.measurements[0].value, build);
    }
}

// ===========================================================================
// MetricRepository contracts
// ===========================================================================

async fn contract_metric_put_get_replace<R: MetricRepository>(repo: &R) {
    repo.put_metric(sample_metric("AM1", 5.0)).await.unwrap();
    assert_eq!(repo.get_metric("AM1").await.unwrap().design, 5.0);

    repo.put_metric(sample_metric("AM1", 4.0)).await.unwrap();
    assert_eq!(repo.get_metric("AM1").await.unwrap().design, 4.0);
    assert_eq!(repo.list_metrics().await.unwrap().len(), 1);
}

async fn contract_metric_missing<R: MetricRepository>(repo: &R) {
    let err = repo.get_metric("nope").await.unwrap_err();
    assert!(matches!(err, StorageError::MetricNotFound { code } if code == "nope"));
}

async fn contract_metric_list_sorted<R: MetricRepository>(repo: &R) {
    for code in ["PA1", "AM2", "AM1"] {
        repo.put_metric(sample_metric(code, 5.0)).await.unwrap();
    }
    let codes: Vec<String> = repo
        .list_metrics()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.code)
        .collect();
    assert_eq!(codes, vec!["AM1", "AM2", "PA1"]);
}

#[tokio::test]
async fn memory_metric_repository_contracts() {
    contract_metric_put_get_replace(&MemoryMetricRepository::new()).await;
    contract_metric_missing(&MemoryMetricRepository::new()).await;
    contract_metric_list_sorted(&MemoryMetricRepository::new()).await;
}

#[tokio::test]
async fn surreal_metric_repository_contracts() {
    let (_, _, repo) = surreal_repos().await;
    contract_metric_put_get_replace(&repo).await;

    let (_, _, repo) = surreal_repos().await;
    contract_metric_missing(&repo).await;

    let (_, _, repo) = surreal_repos().await;
    contract_metric_list_sorted(&repo).await;
}

#[tokio::test]
async fn memory_metric_repository_unavailable() {
    let repo = MemoryMetricRepository::new();
    repo.set_unavailable(true);
    let err = repo.put_metric(sample_metric("AM1", 5.0)).await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
    assert!(repo.list_metrics().await.unwrap().is_empty());
}
