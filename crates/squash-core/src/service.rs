//! `SquashCore`: the external interface of the ingestion pipeline.
//!
//! Wires the metric registry, job store, evaluator and change notifier
//! together. A submission commits, evaluates and enqueues its change event,
//! then returns; it never waits for viewers and notifier failures never reach
//! the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use squash_state::{JobId, JobRecord, JobRepository, MetricRepository};
use tracing::Instrument;

use crate::config::NotifierConfig;
use crate::domain::{JobCommitted, JobReport, Metric, MetricDefinition, Result, Verdict};
use crate::evaluator;
use crate::job_store::JobStore;
use crate::notifier::{ChangeNotifier, MetricFilter, PushTransport, ViewerSessionRegistry};
use crate::obs;
use crate::registry::MetricRegistry;

pub struct SquashCore {
    registry: Arc<MetricRegistry>,
    jobs: JobStore,
    sessions: Arc<ViewerSessionRegistry>,
    notifier: ChangeNotifier,
}

impl SquashCore {
    /// Assemble the pipeline around an existing registry.
    ///
    /// Must be called inside a tokio runtime; the notifier worker is spawned
    /// immediately.
    pub fn new(
        registry: Arc<MetricRegistry>,
        job_repo: Arc<dyn JobRepository>,
        transport: Arc<dyn PushTransport>,
        config: NotifierConfig,
    ) -> Self {
        let sessions = Arc::new(ViewerSessionRegistry::new());
        let notifier = ChangeNotifier::spawn(sessions.clone(), transport, config);
        Self {
            jobs: JobStore::new(registry.clone(), job_repo),
            registry,
            sessions,
            notifier,
        }
    }

    /// Seed the registry from `metric_repo` and assemble the pipeline.
    pub async fn open(
        metric_repo: Arc<dyn MetricRepository>,
        job_repo: Arc<dyn JobRepository>,
        transport: Arc<dyn PushTransport>,
        config: NotifierConfig,
    ) -> Result<Self> {
        let registry = Arc::new(MetricRegistry::load(metric_repo).await?);
        Ok(Self::new(registry, job_repo, transport, config))
    }

    /// Validate, persist and evaluate a job report.
    pub async fn submit_job(&self, report: JobReport) -> Result<JobId> {
        let span = obs::job_span(&report.name, &report.build);
        let job_name = report.name.clone();

        async move {
            let receipt = match self.jobs.submit(report).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    obs::emit_job_rejected(&job_name, &e);
                    return Err(e);
                }
            };

            let verdicts = evaluator::evaluate_job(&receipt);
            let metric_codes: BTreeSet<String> = verdicts.keys().cloned().collect();
            obs::emit_job_committed(
                receipt.job_id.as_str(),
                receipt.measurements.len(),
                metric_codes.len(),
            );

            if !metric_codes.is_empty() {
                self.notifier.on_job_committed(JobCommitted {
                    job_id: receipt.job_id.clone(),
                    metric_codes,
                    verdicts,
                });
            }
            Ok(receipt.job_id)
        }
        .instrument(span)
        .await
    }

    pub async fn get_metric(&self, code: &str) -> Result<Arc<Metric>> {
        self.registry.resolve(code).await
    }

    /// Register or replace a metric definition.
    pub async fn register_metric(&self, definition: MetricDefinition) -> Result<Arc<Metric>> {
        let metric = self.registry.register(definition).await?;
        obs::emit_metric_registered(&metric.code, metric.condition.symbol());
        Ok(metric)
    }

    pub async fn list_metrics(&self) -> Vec<Arc<Metric>> {
        self.registry.list().await
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<JobRecord> {
        self.jobs.get_job(job_id).await
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        self.jobs.list_jobs().await
    }

    /// Verdicts of a stored job under the current metric definitions, keyed
    /// by metric code. The last measurement of each metric wins.
    pub async fn job_verdicts(&self, job_id: &JobId) -> Result<BTreeMap<String, Verdict>> {
        let job = self.jobs.get_job(job_id).await?;
        let mut verdicts = BTreeMap::new();
        for m in &job.measurements {
            let metric = self.registry.resolve(&m.metric).await?;
            verdicts.insert(m.metric.clone(), evaluator::evaluate(m.value, &metric));
        }
        Ok(verdicts)
    }

    /// Score an ad-hoc value against the current definition of `code`.
    pub async fn evaluate_value(&self, code: &str, value: f64) -> Result<Verdict> {
        let metric = self.registry.resolve(code).await?;
        Ok(evaluator::evaluate(value, &metric))
    }

    pub async fn subscribe_viewer(
        &self,
        handle: impl Into<String>,
        user: impl Into<String>,
        filter: MetricFilter,
    ) {
        self.sessions.subscribe(handle, user, filter).await;
    }

    /// Returns `true` if the session was subscribed. Refreshes still pending
    /// for it are dropped at flush time.
    pub async fn unsubscribe_viewer(&self, handle: &str) -> bool {
        self.sessions.unsubscribe(handle).await
    }

    pub fn sessions(&self) -> &Arc<ViewerSessionRegistry> {
        &self.sessions
    }

    /// Drain pending refreshes and stop the notifier.
    pub async fn shutdown(&self) {
        self.notifier.shutdown().await;
    }
}
