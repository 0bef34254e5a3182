//! Live viewer sessions.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Which metrics a viewer is looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFilter {
    #[default]
    All,
    Metrics(BTreeSet<String>),
}

impl MetricFilter {
    pub fn only<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetricFilter::Metrics(codes.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, code: &str) -> bool {
        match self {
            MetricFilter::All => true,
            MetricFilter::Metrics(codes) => codes.contains(code),
        }
    }

    /// The subset of `codes` this filter is interested in.
    pub fn narrow(&self, codes: &BTreeSet<String>) -> BTreeSet<String> {
        match self {
            MetricFilter::All => codes.clone(),
            MetricFilter::Metrics(wanted) => wanted.intersection(codes).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerSession {
    /// Opaque handle addressing the viewer on the push channel
    pub handle: String,
    pub user: String,
    pub filter: MetricFilter,
    /// Changes when the handle is unsubscribed and subscribed again
    pub generation: u64,
}

impl ViewerSession {
    pub fn is_affected_by(&self, codes: &BTreeSet<String>) -> bool {
        codes.iter().any(|code| self.filter.matches(code))
    }
}

/// The set of currently connected viewers.
///
/// Session lifecycle is owned by whatever serves the dashboard; the notifier
/// only reads the active set when it flushes.
#[derive(Debug, Default)]
pub struct ViewerSessionRegistry {
    sessions: RwLock<HashMap<String, ViewerSession>>,
    next_generation: AtomicU64,
}

impl ViewerSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the session for `handle`.
    ///
    /// Replacing a live session only updates its user and filter; it keeps
    /// the generation, so refreshes already pending for it still arrive.
    pub async fn subscribe(
        &self,
        handle: impl Into<String>,
        user: impl Into<String>,
        filter: MetricFilter,
    ) {
        let handle = handle.into();
        let mut sessions = self.sessions.write().await;
        let generation = match sessions.get(&handle) {
            Some(existing) => existing.generation,
            None => self.next_generation.fetch_add(1, Ordering::Relaxed),
        };
        let session = ViewerSession {
            handle: handle.clone(),
            user: user.into(),
            filter,
            generation,
        };
        sessions.insert(handle, session);
    }

    /// Returns `true` if the session existed.
    pub async fn unsubscribe(&self, handle: &str) -> bool {
        self.sessions.write().await.remove(handle).is_some()
    }

    pub async fn get(&self, handle: &str) -> Option<ViewerSession> {
        self.sessions.read().await.get(handle).cloned()
    }

    pub async fn contains(&self, handle: &str) -> bool {
        self.sessions.read().await.contains_key(handle)
    }

    /// Generation of the live session behind `handle`, if any.
    pub async fn generation(&self, handle: &str) -> Option<u64> {
        self.sessions.read().await.get(handle).map(|s| s.generation)
    }

    /// Sessions interested in at least one of `codes`, sorted by handle.
    pub async fn affected(&self, codes: &BTreeSet<String>) -> Vec<ViewerSession> {
        let mut affected: Vec<ViewerSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_affected_by(codes))
            .cloned()
            .collect();
        affected.sort_by(|a, b| a.handle.cmp(&b.handle));
        affected
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn filter_narrows_to_interest() {
        let touched = codes(&["AM1", "PA1"]);
        assert_eq!(MetricFilter::All.narrow(&touched), touched);
        assert_eq!(
            MetricFilter::only(["PA1", "PF1"]).narrow(&touched),
            codes(&["PA1"])
        );
        assert!(MetricFilter::only(["PF1"]).narrow(&touched).is_empty());
    }

    #[tokio::test]
    async fn affected_respects_filters() {
        let sessions = ViewerSessionRegistry::new();
        sessions.subscribe("s-all", "alice", MetricFilter::All).await;
        sessions
            .subscribe("s-am1", "bob", MetricFilter::only(["AM1"]))
            .await;
        sessions
            .subscribe("s-pf1", "carol", MetricFilter::only(["PF1"]))
            .await;

        let handles: Vec<String> = sessions
            .affected(&codes(&["AM1"]))
            .await
            .into_iter()
            .map(|s| s.handle)
            .collect();
        assert_eq!(handles, vec!["s-all", "s-am1"]);

        assert!(sessions.affected(&BTreeSet::new()).await.is_empty());
    }

    #[tokio::test]
    async fn subscribe_replaces_and_unsubscribe_removes() {
        let sessions = ViewerSessionRegistry::new();
        sessions.subscribe("s1", "alice", MetricFilter::All).await;
        sessions
            .subscribe("s1", "alice", MetricFilter::only(["AM1"]))
            .await;
        assert_eq!(sessions.len().await, 1);
        assert_eq!(
            sessions.get("s1").await.unwrap().filter,
            MetricFilter::only(["AM1"])
        );

        assert!(sessions.unsubscribe("s1").await);
        assert!(!sessions.unsubscribe("s1").await);
        assert!(!sessions.contains("s1").await);
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn resubscribing_starts_a_new_generation() {
        let sessions = ViewerSessionRegistry::new();
        sessions.subscribe("s1", "alice", MetricFilter::All).await;
        let first = sessions.generation("s1").await.unwrap();

        sessions
            .subscribe("s1", "alice", MetricFilter::only(["AM1"]))
            .await;
        assert_eq!(sessions.generation("s1").await, Some(first));

        sessions.unsubscribe("s1").await;
        assert_eq!(sessions.generation("s1").await, None);
        sessions.subscribe("s1", "alice", MetricFilter::All).await;
        assert_ne!(sessions.generation("s1").await, Some(first));
    }
}
