use anyhow::Result;
use console::style;
use herald::client::HttpAgentClient;

pub async fn execute(url: &str) -> Result<()> {
    let client = HttpAgentClient::new(url);
    let agents = client.list_agents().await?;

    println!("{} {}", style("Agents at").dim(), style(client.base_url()).cyan());
    if agents.is_empty() {
        println!("  {}", style("none").dim());
    }
    for agent in agents {
        println!("  {}  {}", style(&agent.name).bold(), style(&agent.description).dim());
    }
    Ok(())
}
