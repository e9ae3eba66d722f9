//! Agent units: named services that turn a textual request into a textual result.
//!
//! Every unit answers with messages, never with an error. Malformed input and backend
//! failures are reported as message text so callers see one uniform result shape.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agent::DEFAULT_MAX_TURNS;
use crate::models::agent_message::{first_input_text, AgentMessage};
use crate::prompt_template::load_prompt_file;
use crate::providers::configs::ProviderConfig;
use crate::run::RunContext;
use crate::systems::search::SearchConfig;

pub mod content;
pub mod research;

pub const NO_INPUT_MESSAGE: &str = "Error: No input received.";

/// Name and description a unit is discovered by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentManifest {
    pub name: String,
    pub description: String,
}

impl AgentManifest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// The backend a unit hands its rendered task to
#[async_trait]
pub trait Delegate: Send + Sync {
    async fn delegate(&self, task: &str) -> Result<String>;
}

/// A named, independently addressable agent
pub trait AgentUnit: Send + Sync {
    fn manifest(&self) -> &AgentManifest;

    /// Start a fresh run over `input`.
    ///
    /// The stream is finite and yields at least one message; the last one is the result.
    fn invoke(&self, input: Vec<AgentMessage>, ctx: RunContext) -> BoxStream<'_, AgentMessage>;
}

/// Everything needed to build a unit's backend
#[derive(Debug, Clone)]
pub struct UnitConfig {
    pub provider: ProviderConfig,
    pub search: Option<SearchConfig>,
    pub max_turns: usize,
}

impl UnitConfig {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            search: None,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_search(mut self, search: Option<SearchConfig>) -> Self {
        self.search = search;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

/// A unit that renders one task template and delegates it to a backend
pub struct TaskUnit {
    manifest: AgentManifest,
    phase: &'static str,
    task_template: &'static str,
    backend: Box<dyn Delegate>,
}

impl TaskUnit {
    pub fn new(
        manifest: AgentManifest,
        phase: &'static str,
        task_template: &'static str,
        backend: Box<dyn Delegate>,
    ) -> Self {
        Self {
            manifest,
            phase,
            task_template,
            backend,
        }
    }

    fn degraded(&self, details: impl std::fmt::Display) -> AgentMessage {
        AgentMessage::text(format!("An error occurred during {}: {}", self.phase, details))
    }

    async fn run(&self, input: &str, ctx: &RunContext) -> AgentMessage {
        let task = match load_prompt_file(self.task_template, &json!({ "input": input })) {
            Ok(task) => task,
            Err(e) => {
                error!(agent = %self.manifest.name, error = %e, "failed to render task");
                return self.degraded(e);
            }
        };

        info!(agent = %self.manifest.name, run_id = %ctx.run_id, "delegating to backend");
        match ctx.guard(self.backend.delegate(&task)).await {
            Ok(Ok(output)) => {
                info!(
                    agent = %self.manifest.name,
                    run_id = %ctx.run_id,
                    chars = output.len(),
                    "backend finished"
                );
                AgentMessage::text(output)
            }
            Ok(Err(e)) => {
                error!(agent = %self.manifest.name, run_id = %ctx.run_id, error = %e, "backend failed");
                self.degraded(e)
            }
            Err(interrupted) => {
                warn!(agent = %self.manifest.name, run_id = %ctx.run_id, %interrupted, "run interrupted");
                self.degraded(interrupted)
            }
        }
    }
}

impl AgentUnit for TaskUnit {
    fn manifest(&self) -> &AgentManifest {
        &self.manifest
    }

    fn invoke(&self, input: Vec<AgentMessage>, ctx: RunContext) -> BoxStream<'_, AgentMessage> {
        Box::pin(async_stream::stream! {
            info!(agent = %self.manifest.name, run_id = %ctx.run_id, "received input");

            match first_input_text(&input) {
                Some(text) => {
                    info!(
                        agent = %self.manifest.name,
                        preview = %text.chars().take(500).collect::<String>(),
                        "input content"
                    );
                    yield self.run(text, &ctx).await;
                }
                None => {
                    warn!(agent = %self.manifest.name, run_id = %ctx.run_id, "received empty input");
                    yield AgentMessage::text(NO_INPUT_MESSAGE);
                }
            }
        })
    }
}

/// Drain a unit's stream, keeping the authoritative (last) message
pub async fn last_message(mut stream: BoxStream<'_, AgentMessage>) -> Option<AgentMessage> {
    let mut last = None;
    while let Some(message) = stream.next().await {
        last = Some(message);
    }
    last
}

/// Units hosted by one process, keyed by name
#[derive(Default, Clone)]
pub struct UnitRegistry {
    units: HashMap<String, Arc<dyn AgentUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit under its manifest name, replacing any previous unit of that name
    pub fn register(&mut self, unit: Arc<dyn AgentUnit>) {
        self.units.insert(unit.manifest().name.clone(), unit);
    }

    pub fn with_unit(mut self, unit: Arc<dyn AgentUnit>) -> Self {
        self.register(unit);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentUnit>> {
        self.units.get(name).cloned()
    }

    pub fn manifests(&self) -> Vec<AgentManifest> {
        let mut manifests: Vec<AgentManifest> = self
            .units
            .values()
            .map(|unit| unit.manifest().clone())
            .collect();
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        manifests
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Backend that records its task and answers from a script
    pub(crate) struct ScriptedBackend {
        pub(crate) reply: std::result::Result<String, String>,
        pub(crate) delay: Option<Duration>,
        pub(crate) tasks: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedBackend {
        pub(crate) fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: None,
                tasks: Arc::default(),
            }
        }

        pub(crate) fn failing(error: &str) -> Self {
            Self {
                reply: Err(error.to_string()),
                delay: None,
                tasks: Arc::default(),
            }
        }

        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::ok("too late")
            }
        }
    }

    #[async_trait]
    impl Delegate for ScriptedBackend {
        async fn delegate(&self, task: &str) -> Result<String> {
            self.tasks.lock().unwrap().push(task.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    /// Backend that answers with the task it was given, after a pause so calls overlap
    pub(crate) struct EchoBackend;

    #[async_trait]
    impl Delegate for EchoBackend {
        async fn delegate(&self, task: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(format!("echo: {}", task))
        }
    }

    fn unit(backend: ScriptedBackend) -> TaskUnit {
        TaskUnit::new(
            AgentManifest::new("test_agent", "test"),
            "research",
            "research_task.md",
            Box::new(backend),
        )
    }

    async fn invoke_all(unit: &TaskUnit, input: Vec<AgentMessage>, ctx: RunContext) -> Vec<AgentMessage> {
        unit.invoke(input, ctx).collect().await
    }

    #[tokio::test]
    async fn test_empty_input_yields_single_error_message() {
        let unit = unit(ScriptedBackend::ok("unused"));

        for input in [vec![], vec![AgentMessage::default()]] {
            let output = invoke_all(&unit, input, RunContext::new()).await;
            assert_eq!(output, vec![AgentMessage::text(NO_INPUT_MESSAGE)]);
        }
    }

    #[tokio::test]
    async fn test_success_yields_backend_output_with_rendered_task() {
        let backend = ScriptedBackend::ok("trend A, trend B");
        let tasks = backend.tasks.clone();
        let unit = unit(backend);

        let output = invoke_all(&unit, vec![AgentMessage::text("oat milk")], RunContext::new()).await;

        assert_eq!(output, vec![AgentMessage::text("trend A, trend B")]);
        let tasks = tasks.lock().unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].contains("Topic: oat milk"));
    }

    #[tokio::test]
    async fn test_backend_failure_is_contained() {
        let unit = unit(ScriptedBackend::failing("model unavailable"));

        let output = invoke_all(&unit, vec![AgentMessage::text("topic")], RunContext::new()).await;

        assert_eq!(
            output,
            vec![AgentMessage::text("An error occurred during research: model unavailable")]
        );
    }

    #[tokio::test]
    async fn test_deadline_degrades_run() {
        let unit = unit(ScriptedBackend::slow(Duration::from_secs(5)));
        let ctx = RunContext::new().with_deadline(Some(Duration::from_millis(20)));

        let output = invoke_all(&unit, vec![AgentMessage::text("topic")], ctx).await;

        assert_eq!(
            output,
            vec![AgentMessage::text("An error occurred during research: timed out after 20ms")]
        );
    }

    #[tokio::test]
    async fn test_cancellation_degrades_run() {
        let unit = unit(ScriptedBackend::slow(Duration::from_secs(5)));
        let token = CancellationToken::new();
        let ctx = RunContext::new().with_parent(&token);
        token.cancel();

        let output = invoke_all(&unit, vec![AgentMessage::text("topic")], ctx).await;

        assert_eq!(
            output,
            vec![AgentMessage::text("An error occurred during research: run was cancelled")]
        );
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let unit = TaskUnit::new(
            AgentManifest::new("test_agent", "test"),
            "research",
            "research_task.md",
            Box::new(EchoBackend),
        );

        let (first, second) = futures::future::join(
            invoke_all(&unit, vec![AgentMessage::text("alpha")], RunContext::new()),
            invoke_all(&unit, vec![AgentMessage::text("beta")], RunContext::new()),
        )
        .await;

        let first = first[0].first_text().unwrap();
        let second = second[0].first_text().unwrap();
        assert!(first.contains("Topic: alpha") && !first.contains("beta"));
        assert!(second.contains("Topic: beta") && !second.contains("alpha"));
    }

    #[tokio::test]
    async fn test_registry_lookup_and_manifests() {
        let registry = UnitRegistry::new()
            .with_unit(Arc::new(TaskUnit::new(
                AgentManifest::new("b_agent", "second"),
                "content generation",
                "content_task.md",
                Box::new(ScriptedBackend::ok("b")),
            )))
            .with_unit(Arc::new(unit(ScriptedBackend::ok("a"))));

        let names: Vec<String> = registry.manifests().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["b_agent", "test_agent"]);
        assert!(registry.get("missing").is_none());

        let unit = registry.get("b_agent").unwrap();
        let last = last_message(unit.invoke(vec![AgentMessage::text("x")], RunContext::new())).await;
        assert_eq!(last, Some(AgentMessage::text("b")));
    }
}
