//! The two-step marketing workflow: research a topic, then generate content from the findings.
//!
//! A research failure degrades the run; the content step still runs with a fallback in place of
//! the findings. A content failure is terminal and the run reports it instead of any content.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::AgentCaller;
use crate::models::agent_message::AgentMessage;
use crate::run::RunContext;
use crate::units::content::CONTENT_AGENT;
use crate::units::research::RESEARCH_AGENT;

pub const DEFAULT_TOPIC: &str =
    "Marketing strategies for launching a new plant-based food delivery service in 2025";
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

pub const NO_RESEARCH_RESULTS: &str = "No research results found.";
pub const CONTENT_EMPTY_FAILURE: &str = "Content generation failed or returned no output.";

/// Why a step produced no usable text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// The call returned nothing, or its last message had no parts
    Empty,
    /// The call itself failed
    Call(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok(String),
    Failed(StepFailure),
}

impl StepOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            StepOutcome::Ok(text) => Some(text),
            StepOutcome::Failed(_) => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok(_))
    }
}

/// Where a step sends its request
#[derive(Clone)]
pub struct AgentEndpoint {
    pub caller: Arc<dyn AgentCaller>,
    pub agent_name: String,
}

impl AgentEndpoint {
    pub fn new(caller: Arc<dyn AgentCaller>, agent_name: impl Into<String>) -> Self {
        Self {
            caller,
            agent_name: agent_name.into(),
        }
    }

    pub fn research(caller: Arc<dyn AgentCaller>) -> Self {
        Self::new(caller, RESEARCH_AGENT)
    }

    pub fn content(caller: Arc<dyn AgentCaller>) -> Self {
        Self::new(caller, CONTENT_AGENT)
    }
}

/// Everything one run observed, from topic to final content
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub topic: String,
    pub research: StepOutcome,
    /// The findings handed to the content step, a fallback when research failed
    pub research_output: String,
    pub content_request: String,
    pub content: StepOutcome,
}

impl WorkflowReport {
    pub fn final_content(&self) -> Option<&str> {
        self.content.text()
    }

    /// Description of the terminal failure, if the content step failed
    pub fn failure(&self) -> Option<String> {
        match &self.content {
            StepOutcome::Ok(_) => None,
            StepOutcome::Failed(StepFailure::Empty) => Some(CONTENT_EMPTY_FAILURE.to_string()),
            StepOutcome::Failed(StepFailure::Call(details)) => {
                Some(format!("An error occurred: {}", details))
            }
        }
    }

    pub fn into_output(self) -> Result<String, String> {
        match self.content {
            StepOutcome::Ok(content) => Ok(content),
            _ => Err(self.failure().unwrap_or_default()),
        }
    }
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.content, self.failure()) {
            (StepOutcome::Ok(content), _) => write!(f, "{}", content),
            (_, Some(failure)) => write!(f, "{}", failure),
            _ => Ok(()),
        }
    }
}

/// Build the content request from the topic and the research findings, both verbatim
pub fn compose_content_request(topic: &str, research_output: &str) -> String {
    format!(
        "Original Marketing Request: {topic}\n\n\
         Research Findings:\n---\n{research_output}\n---\n\n\
         Based on the above, generate the requested marketing content (blog outline or social media ideas)."
    )
}

/// The first part of the last message, which is the authoritative result of a call
pub fn authoritative_text(output: &[AgentMessage]) -> Option<&str> {
    output.last()?.first_text()
}

pub struct MarketingWorkflow {
    research: AgentEndpoint,
    content: AgentEndpoint,
    step_timeout: Option<Duration>,
}

impl MarketingWorkflow {
    pub fn new(research: AgentEndpoint, content: AgentEndpoint) -> Self {
        Self {
            research,
            content,
            step_timeout: Some(Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS)),
        }
    }

    /// Deadline applied to each step; `None` waits indefinitely
    pub fn with_step_timeout(mut self, step_timeout: Option<Duration>) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub async fn run(&self, topic: &str) -> WorkflowReport {
        self.run_with_cancel(topic, &CancellationToken::new()).await
    }

    /// Run both steps; cancelling `cancel` interrupts whichever step is in flight
    pub async fn run_with_cancel(&self, topic: &str, cancel: &CancellationToken) -> WorkflowReport {
        info!(topic, "starting marketing workflow");

        let (research, research_output) = self.research(topic, cancel).await;
        let (content_request, content) = self.content(topic, &research_output, cancel).await;

        WorkflowReport {
            topic: topic.to_string(),
            research,
            research_output,
            content_request,
            content,
        }
    }

    /// Research `topic`, returning the outcome and the findings to hand on.
    ///
    /// The findings are never empty: a failed or empty step yields a fallback description.
    pub async fn research(&self, topic: &str, cancel: &CancellationToken) -> (StepOutcome, String) {
        let research = self.step(&self.research, topic, cancel).await;
        let research_output = match &research {
            StepOutcome::Ok(text) => {
                info!(chars = text.len(), "research step finished");
                text.clone()
            }
            StepOutcome::Failed(StepFailure::Empty) => {
                warn!("research returned no output, continuing with fallback");
                NO_RESEARCH_RESULTS.to_string()
            }
            StepOutcome::Failed(StepFailure::Call(details)) => {
                warn!(error = %details, "research step failed, continuing with fallback");
                format!("Error occurred during research: {}", details)
            }
        };
        (research, research_output)
    }

    /// Generate content from `topic` and the findings, returning the request sent and the outcome
    pub async fn content(
        &self,
        topic: &str,
        research_output: &str,
        cancel: &CancellationToken,
    ) -> (String, StepOutcome) {
        let content_request = compose_content_request(topic, research_output);
        let content = self.step(&self.content, &content_request, cancel).await;
        match &content {
            StepOutcome::Ok(text) => info!(chars = text.len(), "content step finished"),
            StepOutcome::Failed(failure) => warn!(?failure, "content step failed"),
        }
        (content_request, content)
    }

    async fn step(
        &self,
        endpoint: &AgentEndpoint,
        request: &str,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let ctx = RunContext::new()
            .with_deadline(self.step_timeout)
            .with_parent(cancel);
        info!(agent = %endpoint.agent_name, run_id = %ctx.run_id, "calling agent");

        match endpoint
            .caller
            .call(&endpoint.agent_name, vec![AgentMessage::text(request)], &ctx)
            .await
        {
            Ok(output) => match authoritative_text(&output) {
                Some(text) => StepOutcome::Ok(text.to_string()),
                None => StepOutcome::Failed(StepFailure::Empty),
            },
            Err(e) => StepOutcome::Failed(StepFailure::Call(e.to_string())),
        }
    }
}
