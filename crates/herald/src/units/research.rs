use anyhow::Result;
use tracing::warn;

use super::{AgentManifest, TaskUnit, UnitConfig};
use crate::agent::Agent;
use crate::providers::factory::get_provider;
use crate::systems::search::SearchSystem;
use crate::units::Delegate;

pub const RESEARCH_AGENT: &str = "research_agent";

/// Wrap `backend` as the research unit
pub fn research_unit(backend: Box<dyn Delegate>) -> TaskUnit {
    TaskUnit::new(
        AgentManifest::new(
            RESEARCH_AGENT,
            "Performs market research using web search to find trends, competitors, and keywords for a marketing topic.",
        ),
        "research",
        "research_task.md",
        backend,
    )
}

/// Build the research unit: an agent with web search, when a search key is configured
pub fn build(config: &UnitConfig) -> Result<TaskUnit> {
    let provider = get_provider(config.provider.clone())?;
    let mut agent = Agent::new(provider, "research_system.md").with_max_turns(config.max_turns);

    match &config.search {
        Some(search) => agent.add_system(Box::new(SearchSystem::new(search.clone())?)),
        None => warn!("no search api key configured, research will rely on the model alone"),
    }

    Ok(research_unit(Box::new(agent)))
}
