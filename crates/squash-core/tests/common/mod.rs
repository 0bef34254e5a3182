//! Shared fixtures for squash-core integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use squash_core::{
    JobReport, MeasurementSpec, MetricDefinition, NotifierConfig, PackageSpec, PushError,
    PushTransport, RefreshPayload, ReportedStatus, SquashCore,
};
use squash_state::fakes::{MemoryJobRepository, MemoryMetricRepository};

pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Push transport that records every attempt.
#[derive(Default)]
pub struct RecordingTransport {
    attempts: Mutex<Vec<RefreshPayload>>,
    delivered: Mutex<Vec<RefreshPayload>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every push to `session` fails.
    pub fn fail_session(&self, session: &str) {
        self.failing.lock().unwrap().insert(session.to_string());
    }

    /// Pushes to `session` never complete.
    pub fn hang_session(&self, session: &str) {
        self.hanging.lock().unwrap().insert(session.to_string());
    }

    /// Every push takes `delay` before completing.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn attempts(&self) -> Vec<RefreshPayload> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<RefreshPayload> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_to(&self, session: &str) -> Vec<RefreshPayload> {
        self.delivered()
            .into_iter()
            .filter(|p| p.session == session)
            .collect()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn push(&self, payload: &RefreshPayload) -> Result<(), PushError> {
        self.attempts.lock().unwrap().push(payload.clone());

        if self.hanging.lock().unwrap().contains(&payload.session) {
            std::future::pending::<()>().await;
        }

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&payload.session) {
            return Err(PushError::Http("connection refused".to_string()));
        }
        self.delivered.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

pub struct Harness {
    pub core: Arc<SquashCore>,
    pub jobs: Arc<MemoryJobRepository>,
    pub metrics: Arc<MemoryMetricRepository>,
    pub transport: Arc<RecordingTransport>,
}

/// A core over in-memory stores with AM1, PA1 and PF1 registered.
pub async fn harness() -> Harness {
    harness_with(NotifierConfig::default().with_debounce(DEBOUNCE)).await
}

pub async fn harness_with(config: NotifierConfig) -> Harness {
    let jobs = Arc::new(MemoryJobRepository::new());
    let metrics = Arc::new(MemoryMetricRepository::new());
    let transport = RecordingTransport::new();

    let core = SquashCore::open(metrics.clone(), jobs.clone(), transport.clone(), config)
        .await
        .unwrap();
    for definition in [am1(), pa1(), pf1()] {
        core.register_metric(definition).await.unwrap();
    }

    Harness {
        core: Arc::new(core),
        jobs,
        metrics,
        transport,
    }
}

/// Astrometric repeatability: lower is better.
pub fn am1() -> MetricDefinition {
    MetricDefinition {
        code: "AM1".to_string(),
        description: "Median RMS of astrometric distance".to_string(),
        units: "milliarcsec".to_string(),
        condition: Some("<".to_string()),
        minimum: 10.0,
        design: 5.0,
        stretch: 2.0,
        user: 1.0,
    }
}

/// Photometric repeatability: lower is better.
pub fn pa1() -> MetricDefinition {
    MetricDefinition {
        code: "PA1".to_string(),
        description: "Photometric repeatability".to_string(),
        units: "mmag".to_string(),
        condition: Some("<=".to_string()),
        minimum: 8.0,
        design: 5.0,
        stretch: 3.0,
        user: 4.0,
    }
}

/// Fraction of outliers: higher is better.
pub fn pf1() -> MetricDefinition {
    MetricDefinition {
        code: "PF1".to_string(),
        description: "Fraction within PA2".to_string(),
        units: "percent".to_string(),
        condition: Some(">=".to_string()),
        minimum: 80.0,
        design: 90.0,
        stretch: 95.0,
        user: 90.0,
    }
}

pub fn package(name: &str) -> PackageSpec {
    PackageSpec {
        name: name.to_string(),
        git_url: format!("https://github.com/lsst/{name}.git"),
        git_commit: "fc355a99abe3425003b0e5fbe1e13a39644b1e95".to_string(),
        git_branch: "master".to_string(),
        build_version: "b2000".to_string(),
    }
}

pub fn measurement(metric: &str, value: f64) -> MeasurementSpec {
    MeasurementSpec {
        metric: metric.to_string(),
        value,
    }
}

pub fn report(build: &str, measurements: Vec<MeasurementSpec>) -> JobReport {
    JobReport {
        name: "validate_drp".to_string(),
        build: build.to_string(),
        url: format!("https://ci.lsst.codes/job/validate_drp/{build}/"),
        status: ReportedStatus::Label("OK".to_string()),
        packages: vec![package("afw"), package("meas_base")],
        measurements,
    }
}
