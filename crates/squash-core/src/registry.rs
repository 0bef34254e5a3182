//! Metric registry.
//!
//! The authoritative in-process view of metric definitions. Readers take a
//! shared lock and clone an `Arc<Metric>` out, so a submission always holds a
//! complete definition even if the metric is replaced concurrently. Writers
//! serialize on a separate mutex, persist first, then swap the entry.

use std::collections::HashMap;
use std::sync::Arc;

use squash_state::{MetricRecord, MetricRepository};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::domain::{Metric, MetricDefinition, Result, SquashError};

pub struct MetricRegistry {
    repo: Arc<dyn MetricRepository>,
    metrics: RwLock<HashMap<String, Arc<Metric>>>,
    writer: Mutex<()>,
}

impl MetricRegistry {
    /// Create an empty registry over `repo`.
    pub fn new(repo: Arc<dyn MetricRepository>) -> Self {
        Self {
            repo,
            metrics: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    /// Create a registry seeded from every definition persisted in `repo`.
    ///
    /// Rows that no longer validate are skipped with a warning.
    #[instrument(skip(repo))]
    pub async fn load(repo: Arc<dyn MetricRepository>) -> Result<Self> {
        let records = repo.list_metrics().await?;
        let mut metrics = HashMap::with_capacity(records.len());
        for record in records {
            let code = record.code.clone();
            match Metric::try_from(record) {
                Ok(metric) => {
                    metrics.insert(metric.code.clone(), Arc::new(metric));
                }
                Err(e) => warn!(code = %code, error = %e, "skipping invalid persisted metric"),
            }
        }
        debug!(count = metrics.len(), "metric registry loaded");

        Ok(Self {
            repo,
            metrics: RwLock::new(metrics),
            writer: Mutex::new(()),
        })
    }

    /// Look up the current definition of `code`.
    pub async fn resolve(&self, code: &str) -> Result<Arc<Metric>> {
        self.metrics
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| SquashError::metric_not_found(code))
    }

    /// Validate, persist and publish a definition, replacing any existing
    /// metric with the same code.
    #[instrument(skip(self, definition), fields(code = %definition.code))]
    pub async fn register(&self, definition: MetricDefinition) -> Result<Arc<Metric>> {
        let metric = Arc::new(definition.validate()?);

        let _writer = self.writer.lock().await;
        self.repo.put_metric(MetricRecord::from(metric.as_ref())).await?;
        self.metrics
            .write()
            .await
            .insert(metric.code.clone(), metric.clone());

        Ok(metric)
    }

    /// All registered metrics, sorted by code.
    pub async fn list(&self) -> Vec<Arc<Metric>> {
        let mut metrics: Vec<Arc<Metric>> = self.metrics.read().await.values().cloned().collect();
        metrics.sort_by(|a, b| a.code.cmp(&b.code));
        metrics
    }

    pub async fn len(&self) -> usize {
        self.metrics.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.metrics.read().await.is_empty()
    }
}
