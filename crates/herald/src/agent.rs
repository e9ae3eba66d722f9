use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::message::{Message, ToolRequest};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::prompt_template::load_prompt_file;
use crate::providers::base::Provider;
use crate::systems::System;
use crate::units::Delegate;

pub const DEFAULT_MAX_TURNS: usize = 10;

#[derive(Clone, Debug, Serialize)]
struct SystemInfo {
    name: String,
    description: String,
    instructions: String,
}

impl SystemInfo {
    fn new(name: &str, description: &str, instructions: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instructions: instructions.to_string(),
        }
    }
}

/// Agent integrates a foundational LLM with the systems it needs to pilot
pub struct Agent {
    systems: Vec<Box<dyn System>>,
    provider: Box<dyn Provider>,
    prompt_file: String,
    max_turns: usize,
}

impl Agent {
    /// Create a new Agent that renders `prompt_file` as its system prompt
    pub fn new(provider: Box<dyn Provider>, prompt_file: impl Into<String>) -> Self {
        Self {
            systems: Vec::new(),
            provider,
            prompt_file: prompt_file.into(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Add a system to the agent
    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Get all tools from all systems with proper system prefixing
    fn get_prefixed_tools(&self) -> Vec<Tool> {
        self.systems
            .iter()
            .flat_map(|system| {
                system.tools().iter().map(|tool| {
                    Tool::new(
                        format!("{}__{}", system.name(), tool.name),
                        &tool.description,
                        tool.input_schema.clone(),
                    )
                })
            })
            .collect()
    }

    /// Dispatch a single tool call to the system named by its prefix
    async fn dispatch_tool_call(
        &self,
        tool_call: AgentResult<ToolCall>,
    ) -> AgentResult<Vec<Content>> {
        let call = tool_call?;
        let (system_name, tool_name) = call
            .name
            .split_once("__")
            .ok_or_else(|| AgentError::InvalidToolName(call.name.clone()))?;
        let system = self
            .systems
            .iter()
            .find(|sys| sys.name() == system_name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        debug!(system = system_name, tool = tool_name, "dispatching tool call");
        system
            .call(ToolCall::new(tool_name, call.arguments.clone()))
            .await
    }

    fn get_system_prompt(&self) -> AgentResult<String> {
        let systems: Vec<SystemInfo> = self
            .systems
            .iter()
            .map(|system| {
                SystemInfo::new(system.name(), system.description(), system.instructions())
            })
            .collect();

        load_prompt_file(&self.prompt_file, &json!({ "systems": systems }))
            .map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Create a stream that yields each message as it's generated by the agent.
    /// This includes both the assistant's responses and any tool responses.
    pub fn reply(&self, messages: &[Message]) -> BoxStream<'_, Result<Message>> {
        let mut messages = messages.to_vec();

        Box::pin(async_stream::try_stream! {
            let system_prompt = self.get_system_prompt()?;
            let tools = self.get_prefixed_tools();
            let mut turns = 0;

            loop {
                if turns == self.max_turns {
                    Err::<(), _>(anyhow!(
                        "the agent used {} turns without producing a final answer",
                        self.max_turns
                    ))?;
                }
                turns += 1;

                let (response, usage) = self.provider.complete(
                    &system_prompt,
                    &messages,
                    &tools,
                ).await?;
                debug!(turn = turns, total_tokens = ?usage.total_tokens, "completion received");

                yield response.clone();

                // Let the message above reach the consumer before the tools start running
                tokio::task::yield_now().await;

                let tool_requests: Vec<&ToolRequest> = response.content
                    .iter()
                    .filter_map(|content| content.as_tool_request())
                    .collect();

                if tool_requests.is_empty() {
                    break;
                }

                // Run every requested tool at once, answering in request order
                let outputs = futures::future::join_all(
                    tool_requests
                        .iter()
                        .map(|request| self.dispatch_tool_call(request.tool_call.clone())),
                )
                .await;

                let mut message_tool_response = Message::user();
                for (request, output) in tool_requests.iter().zip(outputs.into_iter()) {
                    message_tool_response = message_tool_response.with_tool_response(
                        request.id.clone(),
                        output,
                    );
                }

                yield message_tool_response.clone();

                messages.push(response.clone());
                messages.push(message_tool_response);
            }
        })
    }
}

#[async_trait]
impl Delegate for Agent {
    /// Run the tool loop to completion on `task` and return the final assistant text
    async fn delegate(&self, task: &str) -> Result<String> {
        let messages = vec![Message::user().with_text(task)];
        let mut stream = self.reply(&messages);

        // Only the final assistant turn answers
        let mut answer = String::new();
        while let Some(message) = stream.try_next().await? {
            if message.role == Role::Assistant {
                answer = message.text();
            }
        }

        if answer.trim().is_empty() {
            return Err(anyhow!("the model returned no text"));
        }
        Ok(answer)
    }
}
