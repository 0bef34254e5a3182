//! Change notifier.
//!
//! Fans committed jobs out to live viewers. `on_job_committed` only enqueues;
//! a single background worker owns all pending state, so submissions never
//! wait on viewers.
//!
//! Every event is merged into one pending refresh per affected session. A
//! pending refresh is flushed `debounce` after the first event that created
//! it, so bursts coalesce while a steady stream still drains. Each due
//! refresh is pushed on its own task, chained behind the previous push to the
//! same session, so sessions never wait on each other and each session still
//! sees its refreshes in commit order. Delivery is at most once.
//!
//! A refresh belongs to one subscription: if its handle unsubscribed before
//! the flush, even when the handle has subscribed again, it is dropped.

pub mod sessions;
pub mod transport;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use squash_state::JobId;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::NotifierConfig;
use crate::domain::{JobCommitted, Verdict};
use crate::obs;

pub use sessions::{MetricFilter, ViewerSession, ViewerSessionRegistry};
pub use transport::{HttpPushTransport, PushError, PushTransport, RefreshPayload};

enum Message {
    Committed(JobCommitted),
    Shutdown,
}

/// Handle to the notifier worker.
pub struct ChangeNotifier {
    tx: mpsc::UnboundedSender<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeNotifier {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(
        sessions: Arc<ViewerSessionRegistry>,
        transport: Arc<dyn PushTransport>,
        config: NotifierConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            sessions,
            transport,
            config,
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            next_seq: 0,
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            tx,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue a commit event. Never blocks and never fails the caller.
    pub fn on_job_committed(&self, event: JobCommitted) {
        if event.metric_codes.is_empty() {
            return;
        }
        if self.tx.send(Message::Committed(event)).is_err() {
            debug!("notifier stopped, commit event discarded");
        }
    }

    /// Flush everything pending immediately and wait for the worker to exit.
    ///
    /// Events enqueued after this call are discarded.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "notifier worker terminated abnormally");
            }
        }
    }
}

struct PendingRefresh {
    /// Creation order, used to deliver oldest first
    seq: u64,
    /// Subscription the refresh was built for
    generation: u64,
    deadline: Instant,
    touched: BTreeSet<String>,
    verdicts: BTreeMap<String, Verdict>,
    jobs: Vec<JobId>,
}

struct Worker {
    sessions: Arc<ViewerSessionRegistry>,
    transport: Arc<dyn PushTransport>,
    config: NotifierConfig,
    pending: HashMap<String, PendingRefresh>,
    /// Latest push task per session
    in_flight: HashMap<String, JoinHandle<()>>,
    next_seq: u64,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        loop {
            let next_deadline = self.pending.values().map(|p| p.deadline).min();
            tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Committed(event)) => self.merge(event).await,
                    Some(Message::Shutdown) | None => break,
                },
                _ = sleep_until(next_deadline) => self.flush(Some(Instant::now())).await,
            }
        }

        // Events that raced with shutdown still get merged and flushed.
        rx.close();
        while let Ok(message) = rx.try_recv() {
            if let Message::Committed(event) = message {
                self.merge(event).await;
            }
        }
        self.flush(None).await;
        for (session, task) in self.in_flight.drain() {
            if let Err(e) = task.await {
                warn!(session = %session, error = %e, "push task terminated abnormally");
            }
        }
        debug!("notifier worker stopped");
    }

    async fn merge(&mut self, event: JobCommitted) {
        let affected = self.sessions.affected(&event.metric_codes).await;
        if affected.is_empty() {
            debug!(job_id = %event.job_id, "no viewer interested in commit");
            return;
        }

        let now = Instant::now();
        for session in affected {
            let touched = session.filter.narrow(&event.metric_codes);
            if touched.is_empty() {
                continue;
            }

            let stale = self
                .pending
                .get(&session.handle)
                .is_some_and(|p| p.generation != session.generation);
            if stale {
                self.pending.remove(&session.handle);
                obs::emit_refresh_dropped(&session.handle);
            }

            let pending = match self.pending.entry(session.handle) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    entry.insert(PendingRefresh {
                        seq,
                        generation: session.generation,
                        deadline: now + self.config.debounce,
                        touched: BTreeSet::new(),
                        verdicts: BTreeMap::new(),
                        jobs: Vec::new(),
                    })
                }
            };

            for code in &touched {
                if let Some(verdict) = event.verdicts.get(code) {
                    pending.verdicts.insert(code.clone(), *verdict);
                }
            }
            pending.touched.extend(touched);
            pending.jobs.push(event.job_id.clone());
        }
    }

    /// Dispatch refreshes due at `now`, or all of them when `now` is `None`.
    async fn flush(&mut self, now: Option<Instant>) {
        self.in_flight.retain(|_, task| !task.is_finished());
        let mut due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| now.map_or(true, |now| p.deadline <= now))
            .map(|(handle, _)| handle.clone())
            .collect();
        due.sort_by_key(|handle| self.pending.get(handle).map(|p| p.seq));

        for handle in due {
            let Some(refresh) = self.pending.remove(&handle) else {
                continue;
            };
            if self.sessions.generation(&handle).await != Some(refresh.generation) {
                obs::emit_refresh_dropped(&handle);
                continue;
            }

            let payload = RefreshPayload {
                session: handle,
                touched_metrics: refresh.touched,
                verdicts: refresh.verdicts,
                jobs: refresh.jobs,
            };
            self.dispatch(payload);
        }
    }

    /// Push `payload` on its own task, after any earlier push to the same
    /// session has finished.
    fn dispatch(&mut self, payload: RefreshPayload) {
        let previous = self.in_flight.remove(&payload.session);
        let transport = self.transport.clone();
        let timeout = self.config.push_timeout;
        let session = payload.session.clone();

        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            deliver(transport.as_ref(), timeout, &payload).await;
        });
        self.in_flight.insert(session, task);
    }
}

async fn deliver(transport: &dyn PushTransport, timeout: Duration, payload: &RefreshPayload) {
    let outcome = match tokio::time::timeout(timeout, transport.push(payload)).await {
        Ok(result) => result,
        Err(_) => Err(PushError::Timeout(timeout)),
    };

    match outcome {
        Ok(()) => obs::emit_refresh_delivered(
            &payload.session,
            payload.touched_metrics.len(),
            payload.jobs.len(),
        ),
        Err(e) => obs::emit_refresh_failed(&payload.session, &e),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
