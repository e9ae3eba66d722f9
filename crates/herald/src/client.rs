//! Callers the workflow coordinator uses to reach agent units, over HTTP or in process.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::agent_message::AgentMessage;
use crate::run::{Interrupted, Run, RunContext, RunRequest, RunStatus};
use crate::units::{AgentManifest, UnitRegistry};

/// Extra time a caller waits past the unit's deadline, so the unit can report the timeout itself
pub const RESPONSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum CallError {
    #[error("failed to reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("agent service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("run {run_id} {status}: {message}")]
    RunFailed {
        run_id: Uuid,
        status: RunStatus,
        message: String,
    },

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Invoke a named agent and collect everything it yields
#[async_trait]
pub trait AgentCaller: Send + Sync {
    async fn call(
        &self,
        agent_name: &str,
        input: Vec<AgentMessage>,
        ctx: &RunContext,
    ) -> Result<Vec<AgentMessage>, CallError>;
}

fn with_grace(ctx: &RunContext) -> RunContext {
    ctx.clone()
        .with_deadline(ctx.deadline.map(|deadline| deadline.saturating_add(RESPONSE_GRACE)))
}

/// Deadline on the wire, clamped to what fits in `deadline_ms`
fn deadline_millis(deadline: Duration) -> u64 {
    u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Deserialize)]
struct AgentList {
    agents: Vec<AgentManifest>,
}

/// Reaches units hosted by a `heraldd` service
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    base_url: String,
    client: Client,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport(&self, url: &str) -> impl FnOnce(reqwest::Error) -> CallError {
        let url = url.to_string();
        move |source| CallError::Transport { url, source }
    }

    /// Manifests of every unit the service hosts
    pub async fn list_agents(&self) -> Result<Vec<AgentManifest>, CallError> {
        let url = format!("{}/agents", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(self.transport(&url))?;

        if !response.status().is_success() {
            return Err(CallError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let list: AgentList = response.json().await.map_err(self.transport(&url))?;
        Ok(list.agents)
    }

    async fn run_sync(
        &self,
        agent_name: &str,
        input: Vec<AgentMessage>,
        ctx: &RunContext,
    ) -> Result<Run, CallError> {
        let url = format!("{}/runs", self.base_url);
        let mut request = RunRequest::new(agent_name, input);
        request.run_id = Some(ctx.run_id);
        request.deadline_ms = ctx.deadline.map(deadline_millis);

        let mut builder = self.client.post(&url).json(&request);
        if let Some(deadline) = ctx.deadline {
            builder = builder.timeout(deadline.saturating_add(RESPONSE_GRACE));
        }

        debug!(%url, agent = agent_name, run_id = %ctx.run_id, "posting run");
        let response = builder.send().await.map_err(self.transport(&url))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CallError::UnknownAgent(agent_name.to_string())),
            status if !status.is_success() => Err(CallError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
            _ => response.json().await.map_err(self.transport(&url)),
        }
    }
}

#[async_trait]
impl AgentCaller for HttpAgentClient {
    async fn call(
        &self,
        agent_name: &str,
        input: Vec<AgentMessage>,
        ctx: &RunContext,
    ) -> Result<Vec<AgentMessage>, CallError> {
        let run = with_grace(ctx)
            .guard(self.run_sync(agent_name, input, ctx))
            .await??;

        match run.status {
            RunStatus::Completed => Ok(run.output),
            status => Err(CallError::RunFailed {
                run_id: run.run_id,
                status,
                message: run.error.unwrap_or_default(),
            }),
        }
    }
}

/// Reaches units registered in the same process
#[derive(Clone)]
pub struct LocalAgentCaller {
    registry: Arc<UnitRegistry>,
}

impl LocalAgentCaller {
    pub fn new(registry: Arc<UnitRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl AgentCaller for LocalAgentCaller {
    async fn call(
        &self,
        agent_name: &str,
        input: Vec<AgentMessage>,
        ctx: &RunContext,
    ) -> Result<Vec<AgentMessage>, CallError> {
        let unit = self
            .registry
            .get(agent_name)
            .ok_or_else(|| CallError::UnknownAgent(agent_name.to_string()))?;

        let output = with_grace(ctx)
            .guard(unit.invoke(input, ctx.clone()).collect::<Vec<_>>())
            .await?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::research::research_unit;
    use crate::units::tests::ScriptedBackend;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_deadline_millis_clamps_huge_deadlines() {
        assert_eq!(deadline_millis(Duration::from_secs(30)), 30_000);
        assert_eq!(deadline_millis(Duration::MAX), u64::MAX);
        assert_eq!(
            with_grace(&RunContext::new().with_deadline(Some(Duration::MAX))).deadline,
            Some(Duration::MAX)
        );
    }

    fn run_body(status: &str, output: serde_json::Value) -> serde_json::Value {
        json!({
            "run_id": Uuid::new_v4(),
            "agent_name": "research_agent",
            "status": status,
            "output": output,
            "created_at": "2025-01-01T00:00:00Z",
            "finished_at": "2025-01-01T00:00:01Z"
        })
    }

    #[tokio::test]
    async fn test_http_call_returns_run_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/runs"))
            .and(body_partial_json(json!({
                "agent_name": "research_agent",
                "mode": "sync",
                "deadline_ms": 30000,
                "input": [{"parts": [{"content": "topic", "content_type": "text/plain"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(run_body(
                "completed",
                json!([{"parts": [{"content": "trend A", "content_type": "text/plain"}]}]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAgentClient::new(format!("{}/", server.uri()));
        let ctx = RunContext::new().with_deadline(Some(Duration::from_secs(30)));
        let output = client
            .call("research_agent", vec![AgentMessage::text("topic")], &ctx)
            .await
            .unwrap();

        assert_eq!(output, vec![AgentMessage::text("trend A")]);
    }

    #[tokio::test]
    async fn test_http_call_error_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"agent_name": "missing"})))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"agent_name": "broken"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"agent_name": "failed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(run_body("failed", json!([]))))
            .mount(&server)
            .await;

        let client = HttpAgentClient::new(server.uri());
        let ctx = RunContext::new();

        assert!(matches!(
            client.call("missing", vec![], &ctx).await,
            Err(CallError::UnknownAgent(name)) if name == "missing"
        ));
        assert!(matches!(
            client.call("broken", vec![], &ctx).await,
            Err(CallError::Status { status: 500, body }) if body == "boom"
        ));
        assert!(matches!(
            client.call("failed", vec![], &ctx).await,
            Err(CallError::RunFailed { status: RunStatus::Failed, .. })
        ));
    }

    #[tokio::test]
    async fn test_http_call_unreachable() {
        // Nothing listens on the discard port
        let client = HttpAgentClient::new("http://127.0.0.1:9");
        let err = client
            .call("research_agent", vec![], &RunContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Transport { .. }));
        assert!(err.to_string().starts_with("failed to reach http://127.0.0.1:9/runs"));
    }

    #[tokio::test]
    async fn test_http_call_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(run_body("completed", json!([])))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let ctx = RunContext::new().with_parent(&token);
        token.cancel();

        let err = HttpAgentClient::new(server.uri())
            .call("research_agent", vec![], &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "run was cancelled");
    }

    #[tokio::test]
    async fn test_list_agents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "agents": [{"name": "content_agent", "description": "writes"}]
            })))
            .mount(&server)
            .await;

        let agents = HttpAgentClient::new(server.uri()).list_agents().await.unwrap();
        assert_eq!(agents, vec![AgentManifest::new("content_agent", "writes")]);
    }

    #[tokio::test]
    async fn test_local_caller() {
        let registry = UnitRegistry::new()
            .with_unit(Arc::new(research_unit(Box::new(ScriptedBackend::ok("findings")))));
        let caller = LocalAgentCaller::new(Arc::new(registry));
        let ctx = RunContext::new();

        let output = caller
            .call("research_agent", vec![AgentMessage::text("topic")], &ctx)
            .await
            .unwrap();
        assert_eq!(output, vec![AgentMessage::text("findings")]);

        assert!(matches!(
            caller.call("content_agent", vec![], &ctx).await,
            Err(CallError::UnknownAgent(_))
        ));
    }
}
