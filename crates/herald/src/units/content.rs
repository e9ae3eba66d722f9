use anyhow::Result;

use super::{AgentManifest, TaskUnit, UnitConfig};
use crate::agent::Agent;
use crate::providers::factory::get_provider;
use crate::units::Delegate;

pub const CONTENT_AGENT: &str = "content_agent";

/// Wrap `backend` as the content unit
pub fn content_unit(backend: Box<dyn Delegate>) -> TaskUnit {
    TaskUnit::new(
        AgentManifest::new(
            CONTENT_AGENT,
            "Generates marketing content such as blog outlines or social media ideas from a marketing request and its research findings.",
        ),
        "content generation",
        "content_task.md",
        backend,
    )
}

/// Build the content unit: an agent with no tools
pub fn build(config: &UnitConfig) -> Result<TaskUnit> {
    let provider = get_provider(config.provider.clone())?;
    let agent = Agent::new(provider, "content_system.md").with_max_turns(config.max_turns);
    Ok(content_unit(Box::new(agent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent_message::AgentMessage;
    use crate::run::RunContext;
    use crate::units::tests::ScriptedBackend;
    use crate::units::{last_message, AgentUnit};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_content_task_embeds_request_verbatim() {
        let backend = ScriptedBackend::ok("Outline: ...");
        let tasks = backend.tasks.clone();
        let unit = content_unit(Box::new(backend));

        let request = "Original Marketing Request: oat milk\n\nResearch Findings:\n---\n<b>trend</b> & co\n---";
        let output = last_message(unit.invoke(vec![AgentMessage::text(request)], RunContext::new())).await;

        assert_eq!(output, Some(AgentMessage::text("Outline: ...")));
        assert!(tasks.lock().unwrap()[0].contains(request));
    }

    #[tokio::test]
    async fn test_content_failure_names_phase() {
        let unit = content_unit(Box::new(ScriptedBackend::failing("llm down")));
        let output: Vec<AgentMessage> = unit
            .invoke(vec![AgentMessage::text("request")], RunContext::new())
            .collect()
            .await;

        assert_eq!(
            output,
            vec![AgentMessage::text(
                "An error occurred during content generation: llm down"
            )]
        );
    }
}
