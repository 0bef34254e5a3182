//! Structured observability hooks for job ingestion and viewer refresh.
//!
//! This module provides:
//! - A job-scoped tracing span via `job_span`
//! - Emission functions for commit, rejection, registration and delivery events
//!
//! Events are emitted at `info!` level, failures at `warn!`. Filter with
//! `RUST_LOG`; the CLI's `--json` flag switches to JSON lines.

use tracing::{info, warn};

/// Span tagging everything logged during one job submission.
///
/// Attach it with [`tracing::Instrument`] rather than entering it, so the
/// submission future stays `Send`.
///
/// # Example
///
/// ```ignore
/// store.submit(report).instrument(job_span("validate_drp", "42")).await
/// ```
pub fn job_span(job_name: &str, build: &str) -> tracing::Span {
    tracing::info_span!("squash.job", job_name = %job_name, build = %build)
}

/// Emit event: job committed with its children.
pub fn emit_job_committed(job_id: &str, measurements: usize, metrics: usize) {
    info!(
        event = "job.committed",
        job_id = %job_id,
        measurements = measurements,
        metrics = metrics,
    );
}

/// Emit event: job report rejected before or during commit.
pub fn emit_job_rejected(job_name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "job.rejected", job_name = %job_name, error = %error);
}

/// Emit event: metric definition registered or replaced.
pub fn emit_metric_registered(code: &str, condition: &str) {
    info!(event = "metric.registered", code = %code, condition = %condition);
}

/// Emit event: coalesced refresh delivered to a session.
pub fn emit_refresh_delivered(session: &str, metrics: usize, jobs: usize) {
    info!(
        event = "refresh.delivered",
        session = %session,
        metrics = metrics,
        jobs = jobs,
    );
}

/// Emit event: pending refresh discarded because its session went away.
pub fn emit_refresh_dropped(session: &str) {
    info!(event = "refresh.dropped", session = %session);
}

/// Emit event: delivery failed; the refresh is not retried.
pub fn emit_refresh_failed(session: &str, error: &dyn std::fmt::Display) {
    warn!(event = "refresh.failed", session = %session, error = %error);
}
