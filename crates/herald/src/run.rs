//! Run envelopes shared by the agent services and their callers, plus the per-call
//! [`RunContext`] an agent unit honours while it works.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::agent_message::AgentMessage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Answer once the unit has finished, with every yielded message
    #[default]
    Sync,
    /// Answer with server-sent events as the unit yields
    Stream,
}

/// Body of `POST /runs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub agent_name: String,
    #[serde(default)]
    pub input: Vec<AgentMessage>,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl RunRequest {
    pub fn new(agent_name: impl Into<String>, input: Vec<AgentMessage>) -> Self {
        Self {
            agent_name: agent_name.into(),
            input,
            mode: RunMode::Sync,
            run_id: None,
            deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// A finished run as reported by an agent service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub agent_name: String,
    pub status: RunStatus,
    #[serde(default)]
    pub output: Vec<AgentMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Why a guarded future did not finish
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("timed out after {0:?}")]
    DeadlineExceeded(Duration),
    #[error("run was cancelled")]
    Cancelled,
}

/// Per-call context: correlation id, optional deadline and a cancellation handle.
///
/// The workflow logic never interprets it; units use [`RunContext::guard`] to stop delegating
/// when the caller gives up.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Tie this context to an outer token; cancelling the parent cancels the run
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` unless the deadline elapses or the run is cancelled first
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout(deadline, fut)
                    .await
                    .map_err(|_| Interrupted::DeadlineExceeded(deadline)),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            result = bounded => result,
        }
    }
}
