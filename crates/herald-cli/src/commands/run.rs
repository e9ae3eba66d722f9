use anyhow::{anyhow, Result};
use bat::PrettyPrinter;
use cliclack::spinner;
use console::style;
use herald::client::{AgentCaller, HttpAgentClient};
use herald::workflow::{AgentEndpoint, MarketingWorkflow, StepOutcome, WorkflowReport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PREVIEW_CHARS: usize = 500;

pub async fn execute(topic: &str, research_url: &str, content_url: &str, timeout: u64) -> Result<()> {
    let research: Arc<dyn AgentCaller> = Arc::new(HttpAgentClient::new(research_url));
    let content: Arc<dyn AgentCaller> = Arc::new(HttpAgentClient::new(content_url));
    let step_timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
    let workflow = MarketingWorkflow::new(
        AgentEndpoint::research(research),
        AgentEndpoint::content(content),
    )
    .with_step_timeout(step_timeout);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!("{}", style("Marketing workflow").bold());
    println!("{} {}", style("Topic:").dim(), topic);

    println!("\n{}", style("Step 1: research").cyan().bold());
    let spin = spinner();
    spin.start(format!("researching at {}", research_url));
    let (research, research_output) = workflow.research(topic, &cancel).await;
    spin.stop("research finished");
    print_research(&research, &research_output);

    println!("\n{}", style("Step 2: content generation").cyan().bold());
    let spin = spinner();
    spin.start(format!("writing at {}", content_url));
    let (content_request, content) = workflow.content(topic, &research_output, &cancel).await;
    spin.stop("content generation finished");

    finish(&WorkflowReport {
        topic: topic.to_string(),
        research,
        research_output,
        content_request,
        content,
    })
}

/// Render the final content, or surface the terminal failure as an error so the exit code reflects it
fn finish(report: &WorkflowReport) -> Result<()> {
    match (report.final_content(), report.failure()) {
        (Some(content), _) => render(content),
        (None, failure) => Err(anyhow!(failure.unwrap_or_default())),
    }
}

fn print_research(research: &StepOutcome, research_output: &str) {
    match research {
        StepOutcome::Ok(_) => println!("{}", preview(research_output)),
        StepOutcome::Failed(_) => println!("{}", style(research_output).yellow()),
    }
}

/// The first few hundred characters of `text`, marked when truncated
fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn render(content: &str) -> Result<()> {
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()
        .map_err(|e| anyhow!("failed to render output: {}", e))?;
    println!();
    Ok(())
}
