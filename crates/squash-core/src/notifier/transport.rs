//! Push channel to live viewers.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use squash_state::JobId;
use thiserror::Error;
use tracing::debug;

use crate::domain::Verdict;

/// One coalesced refresh for one viewer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub session: String,
    /// Touched metrics the session is interested in
    pub touched_metrics: BTreeSet<String>,
    /// Latest verdict per touched metric
    pub verdicts: BTreeMap<String, Verdict>,
    /// Contributing jobs in commit order
    pub jobs: Vec<JobId>,
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("viewer endpoint returned status {status} for session {session}")]
    Rejected { session: String, status: u16 },

    #[error("push timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<reqwest::Error> for PushError {
    fn from(err: reqwest::Error) -> Self {
        PushError::Http(err.to_string())
    }
}

/// Delivers refreshes to viewers.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, payload: &RefreshPayload) -> Result<(), PushError>;
}

/// POSTs each refresh as JSON to `{base_url}/sessions/{handle}/refresh`.
pub struct HttpPushTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpPushTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PushError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("squash/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpPushTransport {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn endpoint(&self, session: &str) -> String {
        format!("{}/sessions/{}/refresh", self.base_url, session)
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn push(&self, payload: &RefreshPayload) -> Result<(), PushError> {
        let url = self.endpoint(&payload.session);
        let response = self.http_client.post(&url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Rejected {
                session: payload.session.clone(),
                status: status.as_u16(),
            });
        }
        debug!(url = %url, "refresh pushed");
        Ok(())
    }
}
