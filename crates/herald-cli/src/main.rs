use anyhow::Result;
use clap::{Parser, Subcommand};
use herald::workflow::{DEFAULT_STEP_TIMEOUT_SECS, DEFAULT_TOPIC};

mod commands;

const RESEARCH_URL: &str = "http://localhost:8003";
const CONTENT_URL: &str = "http://localhost:8001";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Research a topic, then generate marketing content from the findings
    Run {
        /// The marketing request to research and write for
        #[arg(default_value = DEFAULT_TOPIC)]
        topic: String,

        /// Base URL of the service hosting research_agent
        #[arg(long, env = "HERALD_RESEARCH_URL", default_value = RESEARCH_URL)]
        research_url: String,

        /// Base URL of the service hosting content_agent
        #[arg(long, env = "HERALD_CONTENT_URL", default_value = CONTENT_URL)]
        content_url: String,

        /// Per-step deadline in seconds, 0 waits indefinitely
        #[arg(long, env = "HERALD_STEP_TIMEOUT_SECS", default_value_t = DEFAULT_STEP_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// List the agents hosted by a service
    Agents {
        #[arg(long, default_value = RESEARCH_URL)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            topic,
            research_url,
            content_url,
            timeout,
        } => commands::run::execute(&topic, &research_url, &content_url, timeout).await,
        Command::Agents { url } => commands::agents::execute(&url).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["herald", "run", "--timeout", "30"]).unwrap();
        match cli.command {
            Command::Run { topic, timeout, .. } => {
                assert_eq!(topic, DEFAULT_TOPIC);
                assert_eq!(timeout, 30);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_with_topic_and_urls() {
        let cli = Cli::try_parse_from([
            "herald",
            "run",
            "oat milk launch",
            "--research-url",
            "http://research:8003",
            "--content-url",
            "http://content:8001",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                topic,
                research_url,
                content_url,
                ..
            } => {
                assert_eq!(topic, "oat milk launch");
                assert_eq!(research_url, "http://research:8003");
                assert_eq!(content_url, "http://content:8001");
            }
            _ => panic!("expected run"),
        }
    }
}
